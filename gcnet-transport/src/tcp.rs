//! TCP transport implementation
//!
//! GC family devices listen on TCP port 4998. Connection establishment runs
//! under its own timeout, separate from the per-request budgets the session
//! layer enforces.

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use gcnet_core::{ConnectionError, GcResult};
use socket2::{SockRef, TcpKeepalive};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Control port of the Unified TCP API
pub const DEFAULT_PORT: u16 = 4998;

/// Kernel keep-alive configuration
#[derive(Debug, Clone, Copy)]
pub struct KeepAlive {
    /// Idle time before the first keep-alive probe
    pub initial_delay: Duration,
}

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Option<Duration>,
    pub keep_alive: Option<KeepAlive>,
}

impl TcpSettings {
    /// Create new TCP settings with a 30 second timeout
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Some(Duration::from_secs(30)),
            keep_alive: None,
        }
    }

    /// Create TCP settings with an explicit timeout
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Some(timeout),
            keep_alive: None,
        }
    }
}

/// Open a TCP stream to a device, bounded by `timeout`
///
/// The connect attempt is abandoned (and the socket destroyed) when the
/// timeout elapses, yielding an `ETIMEDOUT` connection error. Keep-alive is
/// applied to the socket before it is handed back.
pub async fn connect_stream(
    host: &str,
    port: u16,
    timeout: Duration,
    keep_alive: Option<KeepAlive>,
) -> Result<TcpStream, ConnectionError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ConnectionError::timed_out(host, port))?
        .map_err(|e| ConnectionError::from_io(host, port, e))?;

    if let Some(ka) = keep_alive {
        let sock = SockRef::from(&stream);
        let config = TcpKeepalive::new().with_time(ka.initial_delay);
        sock.set_tcp_keepalive(&config)
            .map_err(|e| ConnectionError::from_io(host, port, e))?;
    }

    Ok(stream)
}

/// TCP transport layer implementation
///
/// Used by the device-info probe; the connection supervisor drives its own
/// stream through [`connect_stream`] so it can split read and write halves.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    fn not_connected(&self) -> ConnectionError {
        ConnectionError::from_io(
            &self.settings.host,
            self.settings.port,
            std::io::Error::new(std::io::ErrorKind::NotConnected, "TCP stream not connected"),
        )
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> GcResult<()> {
        if !self.closed {
            let io = std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "connection has already been opened",
            );
            return Err(
                ConnectionError::from_io(&self.settings.host, self.settings.port, io).into(),
            );
        }

        let timeout = self.settings.timeout.unwrap_or(Duration::from_secs(30));
        let stream = connect_stream(
            &self.settings.host,
            self.settings.port,
            timeout,
            self.settings.keep_alive,
        )
        .await?;

        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    fn peer(&self) -> (&str, u16) {
        (&self.settings.host, self.settings.port)
    }

    async fn set_timeout(&mut self, timeout: Option<Duration>) -> GcResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> GcResult<usize> {
        let (host, port) = (self.settings.host.clone(), self.settings.port);
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Err(self.not_connected().into()),
        };

        let result = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| ConnectionError::timed_out(&host, port))?
                .map_err(|e| ConnectionError::from_io(&host, port, e))
        } else {
            stream
                .read(buf)
                .await
                .map_err(|e| ConnectionError::from_io(&host, port, e))
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e.into())
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> GcResult<usize> {
        let (host, port) = (self.settings.host.clone(), self.settings.port);
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Err(self.not_connected().into()),
        };

        let n = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, stream.write(buf))
                .await
                .map_err(|_| ConnectionError::timed_out(&host, port))?
                .map_err(|e| ConnectionError::from_io(&host, port, e))?
        } else {
            stream
                .write(buf)
                .await
                .map_err(|e| ConnectionError::from_io(&host, port, e))?
        };
        Ok(n)
    }

    async fn flush(&mut self) -> GcResult<()> {
        let (host, port) = (self.settings.host.clone(), self.settings.port);
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Err(self.not_connected().into()),
        };
        stream
            .flush()
            .await
            .map_err(|e| ConnectionError::from_io(&host, port, e).into())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> GcResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_settings() {
        let settings = TcpSettings::new("192.168.1.70", DEFAULT_PORT);
        assert_eq!(settings.host, "192.168.1.70");
        assert_eq!(settings.port, 4998);
        assert!(settings.timeout.is_some());
    }

    #[tokio::test]
    async fn test_connect_refused_maps_code() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect_stream("127.0.0.1", port, Duration::from_secs(1), None)
            .await
            .unwrap_err();
        assert_eq!(err.code.as_str(), "ECONNREFUSED");
    }

    #[tokio::test]
    async fn test_transport_round_trip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            sock.write_all(&buf[..n]).await.unwrap();
        });

        let mut transport = TcpTransport::new(TcpSettings::with_timeout(
            "127.0.0.1",
            addr.port(),
            Duration::from_secs(1),
        ));
        transport.open().await.unwrap();
        transport.write_all(b"getversion\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = transport.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"getversion\r");
        transport.close().await.unwrap();
        assert!(transport.is_closed());
    }
}
