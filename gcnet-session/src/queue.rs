//! Transfer queue and request/response correlator
//!
//! The queue owns every pending request from `push` until exactly one of:
//! resolution against a matching response, rejection with a device or
//! library error, queue timeout (expired before dispatch), send timeout
//! (dispatched, no correlated response), or a queue clear.
//!
//! The queue performs no I/O itself. Dispatching returns the raw bytes the
//! caller must write to the stream, and timer expiries arrive back through
//! the [`QueueEvent`] channel handed to the constructor. This keeps all
//! mutation on the single task that owns the queue.
//!
//! # Correlation
//!
//! The protocol carries almost no correlation identifiers, so matching is
//! positional: at most one request is on the wire at a time, responses are
//! matched by expected prefix in insertion order, device errors reject the
//! oldest pending request, and `busyIR` replies are mapped onto a queued
//! `sendir` heuristically.

use crate::classify::{classify, Classified};
use crate::expect::{expected_prefix, is_connector};
use crate::timer::TimerHandle;
use gcnet_core::{GcError, GcResult};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// Margin added to one retry interval when deciding whether a busy `sendir`
/// still fits inside its send timeout.
const BUSY_SAFETY_MARGIN: Duration = Duration::from_millis(100);

/// Timer and scheduling events emitted by the queue
///
/// The owner of the queue receives these on the channel passed to
/// [`TransferQueue::new`] and routes them back into the matching `on_*`
/// method. `Tick` asks for a [`TransferQueue::dispatch`] call; the
/// indirection keeps dispatching cooperative instead of re-entrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    /// Run the dispatcher
    Tick,
    /// The queue timer of the identified request expired
    QueueTimeout(u64),
    /// The send timer of the identified request expired
    SendTimeout(u64),
    /// The busy-retry delay of the identified request elapsed
    BusyRetry(u64),
}

/// Per-push settings, owned by the facade's options record
#[derive(Debug, Clone, Copy)]
pub struct PushOptions {
    /// Budget between dispatch and a correlated response; zero means the
    /// write itself completes the request
    pub send_timeout: Duration,
    /// Budget a request may sit unsent; zero disables the queue timer
    pub queue_timeout: Duration,
    /// Insert at the head instead of the tail (reserved for `stopir`)
    pub priority: bool,
}

/// One dispatched write the owner must put on the wire
///
/// After a successful write the owner reports back with
/// [`TransferQueue::on_write_ok`]. For a request without an on-wire budget
/// (`await_response` false) that report is the outcome: the request resolves
/// with the result of the write itself, not with a device response. A failed
/// write goes through the owner's disconnect path, which rejects whatever is
/// in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub id: u64,
    pub bytes: Vec<u8>,
    /// Whether a correlated response is expected on the wire
    pub await_response: bool,
}

struct QueuedRequest {
    id: u64,
    /// Raw request including the trailing carriage return
    data: String,
    /// First three comma-separated fields, safe to log
    log_prefix: String,
    expected: Option<String>,
    send_timeout: Duration,
    enqueued_at: Instant,
    dispatched_at: Option<Instant>,
    processed: bool,
    queue_timer: Option<TimerHandle>,
    send_timer: Option<TimerHandle>,
    retry_timer: Option<TimerHandle>,
    reply: Option<oneshot::Sender<GcResult<String>>>,
}

impl QueuedRequest {
    /// Deliver the outcome and cancel every armed timer
    fn complete(&mut self, result: GcResult<String>) {
        if let Some(t) = self.queue_timer.take() {
            t.cancel();
        }
        if let Some(t) = self.send_timer.take() {
            t.cancel();
        }
        if let Some(t) = self.retry_timer.take() {
            t.cancel();
        }
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(result);
        }
    }

    /// `command,connector` of the raw request, or just the command when the
    /// second field is not a connector
    fn command_connector_prefix(&self) -> String {
        let trimmed = self.data.trim_end_matches('\r');
        let mut fields = trimmed.split(',');
        let command = fields.next().unwrap_or("");
        match fields.next() {
            Some(c) if is_connector(c) => format!("{},{}", command, c),
            _ => command.to_string(),
        }
    }

    fn connector(&self) -> Option<&str> {
        self.data
            .trim_end_matches('\r')
            .split(',')
            .nth(1)
            .filter(|f| is_connector(f))
    }

    /// The ID field of a `sendir` request
    fn sendir_id(&self) -> Option<&str> {
        self.data.trim_end_matches('\r').split(',').nth(2)
    }
}

/// Ordered queue of pending requests with single-flight dispatch
pub struct TransferQueue {
    items: Vec<QueuedRequest>,
    paused: bool,
    next_id: u64,
    events: mpsc::UnboundedSender<QueueEvent>,
    retry_interval: Duration,
}

impl TransferQueue {
    /// Create an empty queue
    ///
    /// The queue starts paused; the connection supervisor resumes it once the
    /// stream is open. `retry_interval` is the delay before a `sendir` is
    /// retransmitted after a busy signal.
    pub fn new(events: mpsc::UnboundedSender<QueueEvent>, retry_interval: Duration) -> Self {
        Self {
            items: Vec::new(),
            paused: true,
            next_id: 0,
            events,
            retry_interval,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_retry_interval(&mut self, retry_interval: Duration) {
        self.retry_interval = retry_interval;
    }

    /// Enqueue a request; returns any bytes the dispatcher wants written
    ///
    /// `data` must be a non-empty, `\r`-terminated line (the facade appends
    /// the terminator). The outcome is delivered once on `reply`.
    ///
    /// A `sendir` identical to one already sitting unsent collapses: the new
    /// call resolves immediately with the synthesized response `repeatir`
    /// and nothing is enqueued, since the device treats a retransmission of
    /// an identical `sendir` as a continuation of the running one.
    pub fn push(
        &mut self,
        data: String,
        opts: PushOptions,
        reply: oneshot::Sender<GcResult<String>>,
    ) -> Vec<WriteOp> {
        debug_assert!(data.len() > 1 && data.ends_with('\r'));

        if data.starts_with("sendir")
            && self.items.iter().any(|r| !r.processed && r.data == data)
        {
            tracing::debug!("identical sendir already queued, answering repeatir");
            let _ = reply.send(Ok("repeatir".to_string()));
            return Vec::new();
        }

        let id = self.next_id;
        self.next_id += 1;

        let trimmed = data.trim_end_matches('\r');
        let log_prefix = trimmed.split(',').take(3).collect::<Vec<_>>().join(",");
        let expected = expected_prefix(&data);

        let queue_timer = if opts.queue_timeout > Duration::ZERO {
            let events = self.events.clone();
            Some(TimerHandle::spawn(opts.queue_timeout, move || {
                let _ = events.send(QueueEvent::QueueTimeout(id));
            }))
        } else {
            None
        };

        let item = QueuedRequest {
            id,
            data,
            log_prefix,
            expected,
            send_timeout: opts.send_timeout,
            enqueued_at: Instant::now(),
            dispatched_at: None,
            processed: false,
            queue_timer,
            send_timer: None,
            retry_timer: None,
            reply: Some(reply),
        };

        if opts.priority {
            self.items.insert(0, item);
        } else {
            self.items.push(item);
        }

        self.dispatch()
    }

    /// Reject every pending request with `QUEUE_CLEARED`
    pub fn clear(&mut self) {
        for mut item in self.items.drain(..) {
            item.complete(Err(GcError::QueueCleared));
        }
    }

    /// Stop dispatching; pending requests stay queued
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Allow dispatching again
    ///
    /// Schedules a dispatcher tick through the event channel rather than
    /// dispatching synchronously, so a resume inside a response handler
    /// cannot re-enter the queue.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.tick();
        }
    }

    /// Reject any in-flight request, leaving unsent requests queued
    ///
    /// Used when the transport drops while a request is on the wire.
    pub fn fail_in_flight(&mut self, mut make_error: impl FnMut() -> GcError) {
        let mut i = 0;
        while i < self.items.len() {
            if self.items[i].processed {
                let mut item = self.items.remove(i);
                tracing::debug!(id = item.id, request = %item.log_prefix, "in-flight request lost");
                item.complete(Err(make_error()));
            } else {
                i += 1;
            }
        }
    }

    /// Run the dispatcher: send the head unprocessed request if the wire is free
    ///
    /// Returns the writes to perform, in order. At most one request is in
    /// flight; the next dispatch happens on the `Tick` that follows the
    /// current request's outcome. A request without an on-wire budget stays
    /// in flight until [`Self::on_write_ok`] reports the write back.
    pub fn dispatch(&mut self) -> Vec<WriteOp> {
        let mut writes = Vec::new();

        if self.paused || self.in_flight() {
            return writes;
        }
        let Some(idx) = self.items.iter().position(|r| !r.processed) else {
            return writes;
        };

        let item = &mut self.items[idx];
        item.processed = true;
        if let Some(t) = item.queue_timer.take() {
            t.cancel();
        }
        item.dispatched_at = Some(Instant::now());
        tracing::debug!(id = item.id, request = %item.log_prefix, "dispatching");

        let await_response = item.send_timeout > Duration::ZERO;
        writes.push(WriteOp {
            id: item.id,
            bytes: item.data.clone().into_bytes(),
            await_response,
        });

        if await_response {
            let id = item.id;
            let events = self.events.clone();
            item.send_timer = Some(TimerHandle::spawn(item.send_timeout, move || {
                let _ = events.send(QueueEvent::SendTimeout(id));
            }));
        }

        writes
    }

    /// The write for `id` reached the stream
    ///
    /// For a request dispatched without an on-wire budget this is its
    /// outcome: the write succeeded, so the request resolves. Requests that
    /// await a correlated response are untouched; their outcome comes from
    /// the wire or their send timer. A failed write never gets here — the
    /// owner's disconnect path rejects the in-flight request instead.
    pub fn on_write_ok(&mut self, id: u64) {
        if let Some(idx) = self
            .items
            .iter()
            .position(|r| r.id == id && r.processed && r.send_timeout == Duration::ZERO)
        {
            let mut item = self.items.remove(idx);
            item.complete(Ok(String::new()));
            self.tick();
        }
    }

    /// Handle one complete response line from the framer
    pub fn handle_response(&mut self, line: &str) {
        match classify(line) {
            Classified::DeviceError(err) => self.handle_error_response(line, err),
            Classified::Busy { connector, id } => {
                self.handle_busy(connector.as_deref(), id.as_deref())
            }
            Classified::StopAck { connector } => self.handle_stop_ack(&connector, line),
            Classified::Ok => self.resolve_ordinary(line),
        }
    }

    /// The queue timer of `id` expired before dispatch
    pub fn on_queue_timeout(&mut self, id: u64) {
        // A fire can race its own cancellation; a processed or already
        // completed request makes this a no-op.
        if let Some(idx) = self.items.iter().position(|r| r.id == id && !r.processed) {
            let mut item = self.items.remove(idx);
            let waited_ms = item.enqueued_at.elapsed().as_millis() as u64;
            tracing::debug!(id, request = %item.log_prefix, waited_ms, "queue timeout");
            item.complete(Err(GcError::QueueTimeout { waited_ms }));
        }
    }

    /// The send timer of `id` expired without a correlated response
    pub fn on_send_timeout(&mut self, id: u64) {
        if let Some(idx) = self.items.iter().position(|r| r.id == id && r.processed) {
            let mut item = self.items.remove(idx);
            let timeout_ms = item.send_timeout.as_millis() as u64;
            tracing::debug!(id, request = %item.log_prefix, timeout_ms, "send timeout");
            item.complete(Err(GcError::SendTimeout { timeout_ms }));
            self.tick();
        }
    }

    /// The busy-retry delay of `id` elapsed; returns the write to retransmit
    pub fn on_busy_retry(&mut self, id: u64) -> Option<WriteOp> {
        let item = self.items.iter_mut().find(|r| r.id == id && r.processed)?;
        item.retry_timer = None;
        tracing::debug!(id, request = %item.log_prefix, "retransmitting after busy signal");
        Some(WriteOp {
            id: item.id,
            bytes: item.data.clone().into_bytes(),
            await_response: true,
        })
    }

    fn in_flight(&self) -> bool {
        self.items.iter().any(|r| r.processed)
    }

    fn tick(&mut self) {
        let _ = self.events.send(QueueEvent::Tick);
    }

    /// Device errors carry no reliable correlation: reject the oldest
    /// pending request (best effort, refined policies can hook in here).
    fn handle_error_response(&mut self, line: &str, err: gcnet_core::ResponseError) {
        let oldest = self
            .items
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| r.id)
            .map(|(i, _)| i);
        let Some(idx) = oldest else {
            tracing::warn!(response = %line, "device error with no pending request");
            return;
        };
        let mut item = self.items.remove(idx);
        tracing::debug!(id = item.id, request = %item.log_prefix, response = %line, "device error");
        let was_in_flight = item.processed;
        item.complete(Err(GcError::Response(err)));
        if was_in_flight {
            self.tick();
        }
    }

    /// Map a busy signal onto a queued `sendir` and retry or reject it
    fn handle_busy(&mut self, connector: Option<&str>, busy_id: Option<&str>) {
        let Some(idx) = self.find_busy_target(connector, busy_id) else {
            tracing::debug!(?connector, "busy signal with no matching sendir");
            return;
        };

        let retry_interval = self.retry_interval;
        let item = &mut self.items[idx];
        let elapsed = item
            .dispatched_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);

        if elapsed + retry_interval + BUSY_SAFETY_MARGIN < item.send_timeout {
            let id = item.id;
            let events = self.events.clone();
            tracing::debug!(id, request = %item.log_prefix, delay_ms = retry_interval.as_millis() as u64, "connector busy, retry scheduled");
            item.retry_timer = Some(TimerHandle::spawn(retry_interval, move || {
                let _ = events.send(QueueEvent::BusyRetry(id));
            }));
        } else {
            let mut item = self.items.remove(idx);
            let connector = connector
                .map(str::to_string)
                .or_else(|| item.connector().map(str::to_string))
                .unwrap_or_default();
            tracing::debug!(id = item.id, request = %item.log_prefix, "connector busy, send budget exhausted");
            item.complete(Err(GcError::BusyIr { connector }));
            self.tick();
        }
    }

    /// Locate the queued `sendir` a busy signal is about
    ///
    /// With a `connector,id` tail: the first matching `sendir` whose own ID
    /// differs from the reported one, since a busy reply naming a different
    /// ID is about a transmission that is no longer in the queue. Falling
    /// back to the first matching `sendir` covers firmware that echoes the
    /// request's own ID back. Without a tail the oldest `sendir` is assumed
    /// active and the second-oldest is returned.
    fn find_busy_target(&self, connector: Option<&str>, busy_id: Option<&str>) -> Option<usize> {
        let matches: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, r)| match connector {
                Some(c) => r.data.starts_with(&format!("sendir,{},", c)),
                None => r.data.starts_with("sendir,"),
            })
            .map(|(i, _)| i)
            .collect();

        match busy_id {
            Some(id) => matches
                .iter()
                .copied()
                .find(|&i| self.items[i].sendir_id() != Some(id))
                .or_else(|| matches.first().copied()),
            None => matches.get(1).copied().or_else(|| matches.first().copied()),
        }
    }

    /// A stop acknowledgement terminates every pending `sendir` on the
    /// connector, then resolves the `stopir` request itself
    fn handle_stop_ack(&mut self, connector: &str, line: &str) {
        let prefix = format!("sendir,{},", connector);
        let mut resolved_any = false;
        let mut i = 0;
        while i < self.items.len() {
            if self.items[i].data.starts_with(&prefix) {
                let mut item = self.items.remove(i);
                tracing::debug!(id = item.id, request = %item.log_prefix, "sendir cancelled by stop");
                item.complete(Ok(line.to_string()));
                resolved_any = true;
            } else {
                i += 1;
            }
        }
        self.resolve_ordinary(line);
        if resolved_any {
            self.tick();
        }
    }

    /// First-prefix-match resolution with superseded-request purge and the
    /// bare-version fallback
    fn resolve_ordinary(&mut self, line: &str) {
        let matched = self.items.iter().position(|r| {
            r.expected
                .as_deref()
                .map_or(false, |p| line.starts_with(p))
        });

        if let Some(idx) = matched {
            let mut resolved = self.items.remove(idx);
            let prefix = resolved.command_connector_prefix();
            let resolved_id = resolved.id;

            // Older requests for the same command and connector were
            // superseded by the one that just resolved and will never get a
            // response of their own.
            let mut i = 0;
            while i < self.items.len() {
                if self.items[i].id < resolved_id
                    && self.items[i].command_connector_prefix() == prefix
                {
                    let mut stale = self.items.remove(i);
                    tracing::debug!(id = stale.id, request = %stale.log_prefix, "superseded request dropped");
                    stale.complete(Ok(line.to_string()));
                } else {
                    i += 1;
                }
            }

            tracing::trace!(id = resolved_id, request = %resolved.log_prefix, "resolved");
            resolved.complete(Ok(line.to_string()));
            self.tick();
            return;
        }

        // Some firmware answers getversion with the bare version string.
        if gcnet_core::model::looks_like_version(line) {
            if let Some(idx) = self
                .items
                .iter()
                .position(|r| r.data.starts_with("getversion"))
            {
                let mut item = self.items.remove(idx);
                item.complete(Ok(line.to_string()));
                self.tick();
                return;
            }
        }

        tracing::debug!(response = %line, "unmatched response dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(send_ms: u64, queue_ms: u64, priority: bool) -> PushOptions {
        PushOptions {
            send_timeout: Duration::from_millis(send_ms),
            queue_timeout: Duration::from_millis(queue_ms),
            priority,
        }
    }

    fn new_queue() -> (TransferQueue, mpsc::UnboundedReceiver<QueueEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TransferQueue::new(tx, Duration::from_millis(99)), rx)
    }

    #[tokio::test]
    async fn test_fifo_single_flight() {
        let (mut q, _rx) = new_queue();
        q.resume();

        let (atx, arx) = oneshot::channel();
        let writes = q.push("getstate,1:1\r".into(), opts(500, 500, false), atx);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].bytes, b"getstate,1:1\r".to_vec());
        assert!(writes[0].await_response);

        let (btx, mut brx) = oneshot::channel();
        let writes = q.push("get_IR,1:2\r".into(), opts(500, 500, false), btx);
        // One request already on the wire.
        assert!(writes.is_empty());

        q.handle_response("state,1:1,1");
        assert_eq!(arx.await.unwrap().unwrap(), "state,1:1,1");
        assert!(brx.try_recv().is_err());

        // The outcome scheduled a tick; dispatching now sends the second.
        let writes = q.dispatch();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].bytes, b"get_IR,1:2\r".to_vec());
    }

    #[tokio::test]
    async fn test_paused_queue_never_dispatches() {
        let (mut q, _rx) = new_queue();
        let (tx, _arx) = oneshot::channel();
        assert!(q.push("getdevices\r".into(), opts(500, 500, false), tx).is_empty());
        assert!(q.dispatch().is_empty());
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_rejects_everything() {
        let (mut q, _rx) = new_queue();
        let (atx, arx) = oneshot::channel();
        let (btx, brx) = oneshot::channel();
        q.push("getdevices\r".into(), opts(500, 500, false), atx);
        q.push("getversion\r".into(), opts(500, 500, false), btx);

        q.clear();
        assert!(q.is_empty());
        assert!(matches!(arx.await.unwrap(), Err(GcError::QueueCleared)));
        assert!(matches!(brx.await.unwrap(), Err(GcError::QueueCleared)));
    }

    #[tokio::test]
    async fn test_identical_sendir_collapses() {
        let (mut q, _rx) = new_queue();
        let (atx, _arx) = oneshot::channel();
        q.push("sendir,1:1,1,38000,1,1,342,171\r".into(), opts(500, 500, false), atx);

        let (btx, brx) = oneshot::channel();
        q.push("sendir,1:1,1,38000,1,1,342,171\r".into(), opts(500, 500, false), btx);
        assert_eq!(brx.await.unwrap().unwrap(), "repeatir");
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn test_priority_inserts_at_head() {
        let (mut q, mut rx) = new_queue();
        let (atx, _arx) = oneshot::channel();
        let (btx, _brx) = oneshot::channel();
        q.push("getdevices\r".into(), opts(500, 500, false), atx);
        q.push("stopir,1:1\r".into(), opts(500, 500, true), btx);

        q.resume();
        assert_eq!(rx.recv().await, Some(QueueEvent::Tick));
        let writes = q.dispatch();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].bytes, b"stopir,1:1\r".to_vec());
    }

    #[tokio::test]
    async fn test_stop_ack_resolves_pending_sendirs_in_order() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, arx) = oneshot::channel();
        let (btx, brx) = oneshot::channel();
        let (ctx, mut crx) = oneshot::channel();
        q.push("sendir,1:1,1,38000,1,1,342\r".into(), opts(500, 500, false), atx);
        q.push("sendir,1:1,2,38000,1,1,342\r".into(), opts(500, 500, false), btx);
        q.push("sendir,1:2,9,38000,1,1,342\r".into(), opts(500, 500, false), ctx);

        q.handle_response("stopir,1:1");
        assert_eq!(arx.await.unwrap().unwrap(), "stopir,1:1");
        assert_eq!(brx.await.unwrap().unwrap(), "stopir,1:1");
        // The other connector is untouched.
        assert!(crx.try_recv().is_err());
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn test_device_error_rejects_oldest() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, arx) = oneshot::channel();
        let (btx, mut brx) = oneshot::channel();
        q.push("getstate,1:1\r".into(), opts(500, 500, false), atx);
        q.push("get_IR,1:2\r".into(), opts(500, 500, false), btx);

        q.handle_response("ERR_1:1,014");
        match arx.await.unwrap() {
            Err(GcError::Response(e)) => {
                assert_eq!(e.code, "014");
                assert_eq!(e.message, "Blaster command sent to non-blaster connector.");
            }
            other => panic!("wrong outcome: {:?}", other),
        }
        assert!(brx.try_recv().is_err());
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn test_busy_schedules_retry_within_budget() {
        let (mut q, mut rx) = new_queue();
        q.resume();
        let (atx, _arx) = oneshot::channel();
        q.push("sendir,1:1,1,38000,1,1,342\r".into(), opts(500, 500, false), atx);

        q.handle_response("busyIR,1:1,1");
        assert_eq!(q.len(), 1);

        // Retry timer fires after the retry interval.
        let event = tokio::time::timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("retry event")
            .unwrap();
        assert_eq!(event, QueueEvent::BusyRetry(0));
        let retry = q.on_busy_retry(0).expect("retransmission");
        assert_eq!(retry.bytes, b"sendir,1:1,1,38000,1,1,342\r".to_vec());
    }

    #[tokio::test]
    async fn test_busy_rejects_when_budget_exhausted() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, arx) = oneshot::channel();
        q.push("sendir,1:1,1,38000,1,1,342\r".into(), opts(150, 500, false), atx);

        // 80 ms after dispatch: 80 + 99 + 100 > 150, no retry fits.
        tokio::time::sleep(Duration::from_millis(80)).await;
        q.handle_response("busyIR,1:1,1");

        match arx.await.unwrap() {
            Err(GcError::BusyIr { connector }) => assert_eq!(connector, "1:1"),
            other => panic!("wrong outcome: {:?}", other),
        }
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_busy_prefers_sendir_with_other_id() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, _arx) = oneshot::channel();
        let (btx, _brx) = oneshot::channel();
        q.push("sendir,1:1,1,38000,1,1,342\r".into(), opts(500, 500, false), atx);
        q.push("sendir,1:1,2,38000,1,1,342\r".into(), opts(500, 500, false), btx);

        // The busy reply names an ID that is not ours: the in-flight sendir
        // (ID 1) is the one to retry.
        q.handle_response("busyIR,1:1,9");
        let retry = q.on_busy_retry(0).expect("retransmission");
        assert_eq!(retry.bytes, b"sendir,1:1,1,38000,1,1,342\r".to_vec());
    }

    #[tokio::test]
    async fn test_queue_timeout_rejects_unsent_request() {
        let (mut q, mut rx) = new_queue();
        // Paused: the request can never dispatch.
        let (atx, arx) = oneshot::channel();
        q.push("getdevices\r".into(), opts(500, 30, false), atx);

        let event = tokio::time::timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("queue timeout event")
            .unwrap();
        assert_eq!(event, QueueEvent::QueueTimeout(0));
        q.on_queue_timeout(0);

        assert!(matches!(arx.await.unwrap(), Err(GcError::QueueTimeout { .. })));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_send_timeout_rejects_in_flight_request() {
        let (mut q, mut rx) = new_queue();
        q.resume();
        let (atx, arx) = oneshot::channel();
        let writes = q.push("getdevices\r".into(), opts(30, 500, false), atx);
        assert_eq!(writes.len(), 1);

        let event = tokio::time::timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("send timeout event")
            .unwrap();
        assert_eq!(event, QueueEvent::SendTimeout(0));
        q.on_send_timeout(0);

        assert!(matches!(arx.await.unwrap(), Err(GcError::SendTimeout { .. })));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_zero_send_timeout_completes_only_after_write_reported() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, mut arx) = oneshot::channel();
        let writes = q.push("blink,1\r".into(), opts(0, 500, false), atx);
        assert_eq!(writes.len(), 1);
        assert!(!writes[0].await_response);

        // The caller is not told anything until the write actually happened.
        assert!(arx.try_recv().is_err());
        assert_eq!(q.len(), 1);
        // Single flight holds while the write is outstanding.
        assert!(q.dispatch().is_empty());

        q.on_write_ok(writes[0].id);
        assert_eq!(arx.await.unwrap().unwrap(), "");
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_zero_send_timeout_write_failure_rejects() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, arx) = oneshot::channel();
        let writes = q.push("blink,1\r".into(), opts(0, 500, false), atx);
        assert_eq!(writes.len(), 1);

        // The stream died before the write went out: the owner's disconnect
        // path rejects the in-flight request instead of reporting the write.
        q.pause();
        q.fail_in_flight(|| {
            GcError::Connection(gcnet_core::ConnectionError::lost("10.0.0.2", 4998, None))
        });

        match arx.await.unwrap() {
            Err(GcError::Connection(e)) => assert_eq!(e.code.as_str(), "ECONNLOST"),
            other => panic!("wrong outcome: {:?}", other),
        }
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_bare_version_string_resolves_getversion() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, arx) = oneshot::channel();
        q.push("getversion\r".into(), opts(500, 500, false), atx);

        q.handle_response("710-1005-05");
        assert_eq!(arx.await.unwrap().unwrap(), "710-1005-05");
    }

    #[tokio::test]
    async fn test_resolution_purges_superseded_older_requests() {
        let (mut q, _rx) = new_queue();
        let (atx, arx) = oneshot::channel();
        let (btx, brx) = oneshot::channel();
        q.push("set_IR,1:2,SENSOR\r".into(), opts(500, 500, false), atx);
        // Head insertion puts the newer write in front of the older one.
        q.push("set_IR,1:2,BLASTER\r".into(), opts(500, 500, true), btx);
        q.resume();
        let writes = q.dispatch();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].bytes, b"set_IR,1:2,BLASTER\r".to_vec());

        q.handle_response("IR,1:2,BLASTER");
        assert_eq!(brx.await.unwrap().unwrap(), "IR,1:2,BLASTER");
        // The superseded older write collapses onto the same response.
        assert_eq!(arx.await.unwrap().unwrap(), "IR,1:2,BLASTER");
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_fail_in_flight_keeps_unsent_requests() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, arx) = oneshot::channel();
        let (btx, mut brx) = oneshot::channel();
        q.push("getstate,1:1\r".into(), opts(500, 500, false), atx);
        q.push("getdevices\r".into(), opts(500, 500, false), btx);

        q.pause();
        q.fail_in_flight(|| {
            GcError::Connection(gcnet_core::ConnectionError::lost("10.0.0.2", 4998, None))
        });

        match arx.await.unwrap() {
            Err(GcError::Connection(e)) => assert_eq!(e.code.as_str(), "ECONNLOST"),
            other => panic!("wrong outcome: {:?}", other),
        }
        assert!(brx.try_recv().is_err());
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_response_is_dropped() {
        let (mut q, _rx) = new_queue();
        q.resume();
        let (atx, mut arx) = oneshot::channel();
        q.push("sendir,1:1,7,38000,1,1,342\r".into(), opts(500, 500, false), atx);

        // A completeir for an ID nobody is waiting on.
        q.handle_response("completeir,1:1,3");
        assert!(arx.try_recv().is_err());
        assert_eq!(q.len(), 1);
    }
}
