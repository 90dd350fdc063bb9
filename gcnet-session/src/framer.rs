//! Inbound stream framer
//!
//! Devices delimit responses with a bare carriage return (0x0D). The one
//! exception is the `getdevices` listing: a run of `device,` lines terminated
//! by the literal `endlistdevices`, which forms a single logical response
//! spanning several `\r`-separated lines.

use bytes::{BufMut, BytesMut};

/// Accumulates raw bytes and yields complete protocol responses
///
/// Emitted frames have the trailing `\r` stripped, interior `\r` replaced by
/// `\n` (only the device listing has any), and surrounding whitespace trimmed.
#[derive(Debug, Default)]
pub struct Framer {
    buf: BytesMut,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Feed inbound bytes, returning every response completed by this chunk
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        for &b in bytes {
            self.buf.put_u8(b);
            if b == b'\r' && self.frame_complete() {
                frames.push(self.take_frame());
            }
        }
        frames
    }

    /// Drop any partially accumulated input
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    fn frame_complete(&self) -> bool {
        // A device listing buffers until its terminator line arrives.
        if self.buf.starts_with(b"device,") {
            self.buf.ends_with(b"endlistdevices\r")
        } else {
            true
        }
    }

    fn take_frame(&mut self) -> String {
        let raw = self.buf.split();
        let text = String::from_utf8_lossy(&raw);
        let text = text.strip_suffix('\r').unwrap_or(&text);
        text.replace('\r', "\n").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut framer = Framer::new();
        assert_eq!(framer.push(b"completeir,1:1,1\r"), vec!["completeir,1:1,1"]);
    }

    #[test]
    fn test_split_across_chunks() {
        let mut framer = Framer::new();
        assert!(framer.push(b"710-10").is_empty());
        assert_eq!(framer.push(b"05-05\r"), vec!["710-1005-05"]);
    }

    #[test]
    fn test_two_lines_in_one_chunk() {
        let mut framer = Framer::new();
        let frames = framer.push(b"completeir,1:1,1\rcompleteir,1:1,2\r");
        assert_eq!(frames, vec!["completeir,1:1,1", "completeir,1:1,2"]);
    }

    #[test]
    fn test_device_listing_held_until_terminator() {
        let mut framer = Framer::new();
        // Byte-by-byte delivery must not emit on intermediate carriage returns.
        let listing = b"device,1,1 SERIAL\rdevice,2,1 SERIAL\rdevice,3,3 RELAY\rdevice,4,3 IR\rdevice,5,3 IR\rendlistdevices\r";
        let mut frames = Vec::new();
        for &b in listing.iter() {
            frames.extend(framer.push(&[b]));
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0],
            "device,1,1 SERIAL\ndevice,2,1 SERIAL\ndevice,3,3 RELAY\ndevice,4,3 IR\ndevice,5,3 IR\nendlistdevices"
        );
    }

    #[test]
    fn test_reset_discards_partial_input() {
        let mut framer = Framer::new();
        framer.push(b"device,1");
        framer.reset();
        assert_eq!(framer.push(b"completeir,1:1,1\r"), vec!["completeir,1:1,1"]);
    }
}
