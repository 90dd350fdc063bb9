//! Connection supervisor
//!
//! Owns the TCP stream and the background tasks around it: the connect
//! attempt bounded by the connection timeout, and the reader that pumps
//! inbound bytes into the client task. State transitions happen only here.
//!
//! Every spawned task is tagged with the generation current when it was
//! started; events from a previous generation are stale and must be ignored
//! by the receiver. Detaching bumps the generation, which is how pending
//! connects, reads and scheduled reconnects are invalidated without racing
//! their tasks.

use crate::backoff::Backoff;
use crate::options::Options;
use gcnet_core::ConnectionError;
use gcnet_transport::tcp::{connect_stream, KeepAlive};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Connection state published to the facade
///
/// `ConnectionTimeout` is transient: it is entered when the connect attempt
/// exceeds its budget and left for `Reopening` or `Failed` immediately after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected (initial state)
    Stopped,
    /// TCP connect in progress
    Opening,
    /// Stream is up, queue is running
    Opened,
    /// Tear-down in progress
    Closing,
    /// Cleanly closed
    Closed,
    /// Waiting out a backoff or reconnect delay
    Reopening,
    /// Gave up after `fail_after` connect attempts
    Failed,
    /// The connect attempt hit the connection timeout
    ConnectionTimeout,
}

impl ConnectionState {
    /// Event-stream name of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Stopped => "stopped",
            ConnectionState::Opening => "opening",
            ConnectionState::Opened => "opened",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Reopening => "reopening",
            ConnectionState::Failed => "failed",
            ConnectionState::ConnectionTimeout => "connectionTimeout",
        }
    }

    /// Whether the wire is usable in this state
    pub fn is_opened(&self) -> bool {
        matches!(self, ConnectionState::Opened)
    }

    /// Validate a state transition
    ///
    /// Self-transitions are allowed so repeated events stay idempotent.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        if *self == next {
            return true;
        }
        matches!(
            (*self, next),
            (Stopped, Opening)
                | (Closed, Opening)
                | (Failed, Opening)
                | (Reopening, Opening)
                | (Opening, Opened)
                | (Opening, ConnectionTimeout)
                | (Opening, Reopening)
                | (Opening, Failed)
                | (Opening, Closing)
                | (ConnectionTimeout, Reopening)
                | (ConnectionTimeout, Failed)
                | (ConnectionTimeout, Closing)
                | (Opened, Closing)
                | (Opened, Closed)
                | (Opened, Reopening)
                | (Reopening, Failed)
                | (Reopening, Closing)
                | (Closing, Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal connection events, consumed by the client task
#[derive(Debug)]
pub enum ConnEvent {
    /// TCP connect finished inside its budget
    Connected { generation: u64, stream: TcpStream },
    /// TCP connect failed or timed out
    ConnectFailed {
        generation: u64,
        error: ConnectionError,
    },
    /// Bytes arrived from the device
    Data { generation: u64, bytes: Vec<u8> },
    /// EOF or read error on the stream
    Disconnected {
        generation: u64,
        error: Option<std::io::Error>,
    },
    /// A scheduled reconnect delay elapsed
    ReconnectDue { generation: u64 },
}

/// Owns the stream, its background tasks and the connection state machine
pub struct Supervisor {
    state: ConnectionState,
    generation: u64,
    backoff: Backoff,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
    connector: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<ConnEvent>,
}

impl Supervisor {
    pub fn new(events: mpsc::UnboundedSender<ConnEvent>, backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Stopped,
            generation: 0,
            backoff,
            writer: None,
            reader: None,
            connector: None,
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn backoff_mut(&mut self) -> &mut Backoff {
        &mut self.backoff
    }

    pub fn set_backoff(&mut self, backoff: Backoff) {
        self.backoff = backoff;
    }

    /// Move to `next`, which must be reachable from the current state
    pub fn transition(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "unexpected state transition");
        }
        tracing::debug!(from = %self.state, to = %next, "connection state");
        self.state = next;
    }

    /// Begin a connect attempt under the connection timeout
    ///
    /// Transitions to `Opening` and spawns the connect task; the outcome
    /// arrives as a `Connected` or `ConnectFailed` event.
    pub fn start(&mut self, options: &Options) {
        self.detach();
        self.transition(ConnectionState::Opening);

        let generation = self.generation;
        let events = self.events.clone();
        let host = options.host.clone();
        let port = options.port;
        let timeout = options.connection_timeout;
        let keep_alive = options.tcp_keep_alive.then(|| KeepAlive {
            initial_delay: options.tcp_keep_alive_initial_delay,
        });

        self.connector = Some(tokio::spawn(async move {
            match connect_stream(&host, port, timeout, keep_alive).await {
                Ok(stream) => {
                    let _ = events.send(ConnEvent::Connected { generation, stream });
                }
                Err(error) => {
                    let _ = events.send(ConnEvent::ConnectFailed { generation, error });
                }
            }
        }));
    }

    /// Adopt a freshly connected stream: split it and start the reader
    pub fn attach(&mut self, stream: TcpStream) {
        let (mut read_half, write_half) = stream.into_split();
        self.writer = Some(write_half);

        let generation = self.generation;
        let events = self.events.clone();
        self.reader = Some(tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) => {
                        let _ = events.send(ConnEvent::Disconnected {
                            generation,
                            error: None,
                        });
                        break;
                    }
                    Ok(n) => {
                        let data = ConnEvent::Data {
                            generation,
                            bytes: buf[..n].to_vec(),
                        };
                        if events.send(data).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = events.send(ConnEvent::Disconnected {
                            generation,
                            error: Some(e),
                        });
                        break;
                    }
                }
            }
        }));

        self.transition(ConnectionState::Opened);
        self.backoff.reset();
    }

    /// Write raw request bytes to the stream
    pub async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_all(bytes).await,
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no stream attached",
            )),
        }
    }

    pub fn has_stream(&self) -> bool {
        self.writer.is_some()
    }

    /// Destroy the stream and invalidate every outstanding task and event
    pub fn detach(&mut self) {
        if let Some(task) = self.connector.take() {
            task.abort();
        }
        if let Some(task) = self.reader.take() {
            task.abort();
        }
        self.writer = None;
        self.generation += 1;
    }

    /// Arrange a `ReconnectDue` event after `delay`
    ///
    /// The event carries the current generation, so a close or a new connect
    /// in the meantime makes it a no-op.
    pub fn schedule_reconnect(&self, delay: Duration) {
        let generation = self.generation;
        let events = self.events.clone();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ConnEvent::ReconnectDue { generation });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::Opening.as_str(), "opening");
        assert_eq!(ConnectionState::ConnectionTimeout.as_str(), "connectionTimeout");
    }

    #[test]
    fn test_normal_lifecycle_transitions() {
        use ConnectionState::*;
        assert!(Stopped.can_transition_to(Opening));
        assert!(Opening.can_transition_to(Opened));
        assert!(Opened.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Opening));
    }

    #[test]
    fn test_reconnect_transitions() {
        use ConnectionState::*;
        assert!(Opening.can_transition_to(ConnectionTimeout));
        assert!(ConnectionTimeout.can_transition_to(Reopening));
        assert!(Reopening.can_transition_to(Opening));
        assert!(Opened.can_transition_to(Reopening));
        assert!(Reopening.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Opening));
    }

    #[test]
    fn test_invalid_transitions() {
        use ConnectionState::*;
        assert!(!Stopped.can_transition_to(Opened));
        assert!(!Closed.can_transition_to(Opened));
        assert!(!Failed.can_transition_to(Opened));
        // Idempotent self-transition is fine.
        assert!(Opened.can_transition_to(Opened));
    }
}
