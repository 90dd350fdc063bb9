//! Stream accessor trait for the transport layer

use async_trait::async_trait;
use gcnet_core::{ConnectionError, GcResult};
use std::time::Duration;

/// Byte-stream interface to a remote device
///
/// The device-info probe and test doubles talk through this seam rather than
/// a concrete socket type.
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// The peer this stream talks to, for error context
    fn peer(&self) -> (&str, u16);

    /// Set the read/write timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> GcResult<()>;

    /// Read data from the stream
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> GcResult<usize>;

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> GcResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> GcResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                let (address, port) = self.peer();
                let io = std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write all data",
                );
                return Err(ConnectionError::from_io(address, port, io).into());
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> GcResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> GcResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical layer connection
    async fn open(&mut self) -> GcResult<()>;
}
