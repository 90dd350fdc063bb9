//! Client facade and its event-loop task
//!
//! [`GcClient`] is a cheap cloneable handle. All mutable state — options,
//! transfer queue, framer, supervisor — lives in a single spawned task and
//! is only touched from there, in reaction to commands from the facade,
//! queue timer events and connection events. No locks, no shared mutation.
//!
//! `send` is the only suspending call: it parks on a oneshot until the queue
//! delivers exactly one outcome. `connect` and `close` return promptly;
//! readiness is signalled through the state stream and events.

use crate::backoff::Backoff;
use crate::events::ClientEvent;
use crate::options::{Options, OptionsPatch};
use crate::supervisor::{ConnEvent, ConnectionState, Supervisor};
use gcnet_core::{ConnectionError, ConnectionErrorCode, GcError, GcResult};
use gcnet_session::{Framer, PushOptions, QueueEvent, TransferQueue, WriteOp};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Commands from the facade to the client task
enum Command {
    Connect(OptionsPatch),
    Close(OptionsPatch),
    SetOptions(OptionsPatch),
    Send {
        data: String,
        reply: oneshot::Sender<GcResult<String>>,
    },
}

/// Handle to a GC family device client
///
/// Clones share the same underlying connection and queue. Dropping the last
/// clone shuts the client task down, clearing any pending requests.
#[derive(Clone)]
pub struct GcClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    events_tx: broadcast::Sender<ClientEvent>,
}

impl GcClient {
    /// Create a client for the device described by `options`
    ///
    /// Must be called from within a tokio runtime; the client task is
    /// spawned immediately but nothing touches the network until
    /// [`connect`](Self::connect).
    pub fn new(options: Options) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Stopped);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let retry_interval = options.retry_interval;
        let backoff = Backoff::new(options.backoff.clone());

        let task = ClientTask {
            options,
            queue: TransferQueue::new(queue_tx, retry_interval),
            framer: Framer::new(),
            supervisor: Supervisor::new(conn_tx, backoff),
            cmd_rx,
            queue_rx,
            conn_rx,
            events: events_tx.clone(),
            state_tx,
            published: ConnectionState::Stopped,
        };
        tokio::spawn(task.run());

        Self {
            cmd_tx,
            state_rx,
            events_tx,
        }
    }

    /// Shorthand for a client with default options for `host`
    pub fn with_host(host: impl Into<String>) -> Self {
        Self::new(Options::new(host))
    }

    /// Start connecting to the device
    pub fn connect(&self) {
        self.connect_with(OptionsPatch::default());
    }

    /// Overlay options, then start connecting
    pub fn connect_with(&self, patch: OptionsPatch) {
        let _ = self.cmd_tx.send(Command::Connect(patch));
    }

    /// Close the connection and clear the queue
    ///
    /// If the `reconnect` option remains true after the overlay, a fresh
    /// connect is scheduled after `reconnect_delay`.
    pub fn close(&self) {
        self.close_with(OptionsPatch::default());
    }

    /// Overlay options, then close
    pub fn close_with(&self, patch: OptionsPatch) {
        let _ = self.cmd_tx.send(Command::Close(patch));
    }

    /// Overlay options; takes effect on subsequent operations
    pub fn set_options(&self, patch: OptionsPatch) {
        let _ = self.cmd_tx.send(Command::SetOptions(patch));
    }

    /// Send one request and await its correlated response
    ///
    /// The record separator `\r` is appended when missing. A `stopir`
    /// request is admitted at the head of the queue, everything else at the
    /// tail. Resolves with the matched response line, or rejects with
    /// exactly one `GcError`.
    pub async fn send(&self, data: impl Into<String>) -> GcResult<String> {
        let mut data = data.into();
        if !data.ends_with('\r') {
            data.push('\r');
        }
        let (reply, outcome) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send { data, reply })
            .map_err(|_| GcError::QueueCleared)?;
        outcome.await.map_err(|_| GcError::QueueCleared)?
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch stream of connection states
    pub fn state_stream(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribe to the event stream
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }
}

/// The single task owning all client state
struct ClientTask {
    options: Options,
    queue: TransferQueue,
    framer: Framer,
    supervisor: Supervisor,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    queue_rx: mpsc::UnboundedReceiver<QueueEvent>,
    conn_rx: mpsc::UnboundedReceiver<ConnEvent>,
    events: broadcast::Sender<ClientEvent>,
    state_tx: watch::Sender<ConnectionState>,
    published: ConnectionState,
}

impl ClientTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    // Every facade handle dropped: shut down.
                    None => break,
                },
                Some(event) = self.queue_rx.recv() => self.handle_queue_event(event).await,
                Some(event) = self.conn_rx.recv() => self.handle_conn_event(event).await,
            }
        }
        self.queue.clear();
        self.supervisor.detach();
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect(patch) => {
                self.options.apply(&patch);
                self.queue.set_retry_interval(self.options.retry_interval);
                self.supervisor
                    .set_backoff(Backoff::new(self.options.backoff.clone()));
                self.start_connect();
            }
            Command::Close(patch) => {
                self.options.apply(&patch);
                self.do_close();
            }
            Command::SetOptions(patch) => {
                self.options.apply(&patch);
                self.queue.set_retry_interval(self.options.retry_interval);
            }
            Command::Send { data, reply } => {
                let priority = data.starts_with("stopir");
                let push = PushOptions {
                    send_timeout: self.options.send_timeout,
                    queue_timeout: self.options.queue_timeout,
                    priority,
                };
                let writes = self.queue.push(data, push, reply);
                self.flush_writes(writes).await;
            }
        }
    }

    async fn handle_queue_event(&mut self, event: QueueEvent) {
        match event {
            QueueEvent::Tick => {
                let writes = self.queue.dispatch();
                self.flush_writes(writes).await;
            }
            QueueEvent::QueueTimeout(id) => self.queue.on_queue_timeout(id),
            QueueEvent::SendTimeout(id) => self.queue.on_send_timeout(id),
            QueueEvent::BusyRetry(id) => {
                if let Some(write) = self.queue.on_busy_retry(id) {
                    self.flush_writes(vec![write]).await;
                }
            }
        }
    }

    async fn handle_conn_event(&mut self, event: ConnEvent) {
        match event {
            ConnEvent::Connected { generation, stream } => {
                if generation != self.supervisor.generation() {
                    tracing::debug!("dropping stale connect result");
                    return;
                }
                self.supervisor.attach(stream);
                self.sync_state();
                self.framer.reset();
                self.queue.resume();
                self.emit(ClientEvent::Connect);
            }
            ConnEvent::ConnectFailed { generation, error } => {
                if generation != self.supervisor.generation() {
                    return;
                }
                tracing::warn!(error = %error, "connect failed");
                let timed_out = error.code == ConnectionErrorCode::Etimedout;
                self.emit(ClientEvent::Error(Arc::new(error.into())));
                if timed_out {
                    self.supervisor
                        .transition(ConnectionState::ConnectionTimeout);
                    self.sync_state();
                }
                match self.supervisor.backoff_mut().next_delay() {
                    Some(delay) => {
                        self.supervisor.transition(ConnectionState::Reopening);
                        self.sync_state();
                        self.supervisor.schedule_reconnect(delay);
                    }
                    None => {
                        tracing::warn!("giving up after repeated connect failures");
                        self.supervisor.transition(ConnectionState::Failed);
                        self.sync_state();
                    }
                }
            }
            ConnEvent::Data { generation, bytes } => {
                if generation != self.supervisor.generation() {
                    return;
                }
                for line in self.framer.push(&bytes) {
                    self.queue.handle_response(&line);
                }
            }
            ConnEvent::Disconnected { generation, error } => {
                if generation != self.supervisor.generation() {
                    return;
                }
                self.on_disconnected(error);
            }
            ConnEvent::ReconnectDue { generation } => {
                if generation != self.supervisor.generation() {
                    return;
                }
                self.start_connect();
            }
        }
    }

    fn start_connect(&mut self) {
        if matches!(
            self.supervisor.state(),
            ConnectionState::Opening | ConnectionState::Opened | ConnectionState::Closing
        ) {
            tracing::debug!(state = %self.supervisor.state(), "connect ignored");
            return;
        }
        self.supervisor.start(&self.options);
        self.sync_state();
    }

    /// The stream dropped while opened: reject the in-flight request, pause
    /// the rest, and either schedule a reconnect or settle in closed.
    fn on_disconnected(&mut self, error: Option<std::io::Error>) {
        if !self.supervisor.state().is_opened() {
            return;
        }
        self.supervisor.detach();
        self.queue.pause();

        let host = self.options.host.clone();
        let port = self.options.port;
        self.queue
            .fail_in_flight(|| ConnectionError::lost(host.clone(), port, None).into());

        let lost = ConnectionError::lost(self.options.host.clone(), self.options.port, error);
        tracing::warn!(error = %lost, "connection lost");
        self.emit(ClientEvent::Error(Arc::new(lost.into())));
        self.emit(ClientEvent::Close);

        if self.options.reconnect {
            // Unsent requests stay queued and go out after the reconnect,
            // unless their queue timers fire first.
            self.supervisor.transition(ConnectionState::Reopening);
            self.sync_state();
            self.supervisor.schedule_reconnect(self.options.reconnect_delay);
        } else {
            self.queue.clear();
            self.supervisor.transition(ConnectionState::Closed);
            self.sync_state();
        }
    }

    fn do_close(&mut self) {
        self.queue.pause();
        self.queue.clear();

        if !matches!(
            self.supervisor.state(),
            ConnectionState::Stopped | ConnectionState::Closed | ConnectionState::Failed
        ) {
            self.supervisor.transition(ConnectionState::Closing);
            self.sync_state();
            self.supervisor.detach();
            self.supervisor.transition(ConnectionState::Closed);
            self.sync_state();
        } else {
            self.supervisor.detach();
        }
        self.emit(ClientEvent::Close);

        if self.options.reconnect {
            self.supervisor.schedule_reconnect(self.options.reconnect_delay);
        }
    }

    async fn flush_writes(&mut self, writes: Vec<WriteOp>) {
        for write in writes {
            if !self.supervisor.has_stream() {
                tracing::warn!("dropping write, no stream attached");
                continue;
            }
            match self.supervisor.write(&write.bytes).await {
                Ok(()) => {
                    // A request without an on-wire budget resolves with the
                    // write result itself.
                    self.queue.on_write_ok(write.id);
                }
                Err(e) => {
                    self.on_disconnected(Some(e));
                    break;
                }
            }
        }
    }

    fn sync_state(&mut self) {
        let state = self.supervisor.state();
        if state != self.published {
            self.published = state;
            let _ = self.state_tx.send(state);
            self.emit(ClientEvent::State(state));
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
