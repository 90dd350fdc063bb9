//! Device discovery over UDP multicast
//!
//! GC family devices announce themselves with AMX-style beacons on multicast
//! group 239.255.250.250, port 9131. Each beacon is an ASCII frame beginning
//! `AMXB` followed by `<-key=value>` tuples, e.g.
//!
//! ```text
//! AMXB<-UUID=GlobalCache_000C1E024239><-SDKClass=Utility><-Make=GlobalCache><-Model=iTachWF2IR>
//! ```
//!
//! GC-100 units omit the leading dash inside the tuples; both shapes are
//! accepted. Values may contain spaces.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;
use tokio::net::UdpSocket;

/// Multicast group GC devices announce on
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 250, 250);

/// Multicast port GC devices announce on
pub const MULTICAST_PORT: u16 = 9131;

/// A frame that is not an AMXB beacon
#[derive(Debug, Error, PartialEq, Eq)]
#[error("frame does not start with AMXB")]
pub struct InvalidBeacon;

/// Parsed discovery beacon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    fields: HashMap<String, String>,
}

impl Beacon {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.get("UUID")
    }

    pub fn model(&self) -> Option<&str> {
        self.get("Model")
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }
}

/// Parse one beacon frame into a key→value mapping
pub fn parse_beacon(frame: &str) -> Result<Beacon, InvalidBeacon> {
    let rest = frame.strip_prefix("AMXB").ok_or(InvalidBeacon)?;

    let mut fields = HashMap::new();
    for segment in rest.split('<') {
        let segment = segment.trim_end().trim_end_matches('>');
        if segment.is_empty() {
            continue;
        }
        // GC-100 beacons omit the leading dash.
        let segment = segment.strip_prefix('-').unwrap_or(segment);
        if let Some((key, value)) = segment.split_once('=') {
            fields.insert(key.to_string(), value.to_string());
        }
    }

    Ok(Beacon { fields })
}

/// Listener yielding discovery beacons from the local network
pub struct DiscoveryListener {
    socket: UdpSocket,
}

impl DiscoveryListener {
    /// Join the discovery multicast group
    pub async fn bind() -> std::io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, MULTICAST_PORT)).await?;
        socket.join_multicast_v4(MULTICAST_GROUP, Ipv4Addr::UNSPECIFIED)?;
        Ok(Self { socket })
    }

    /// Receive the next valid beacon, skipping frames that fail to parse
    pub async fn recv_beacon(&self) -> std::io::Result<(SocketAddr, Beacon)> {
        let mut buf = [0u8; 2048];
        loop {
            let (len, addr) = self.socket.recv_from(&mut buf).await?;
            let frame = String::from_utf8_lossy(&buf[..len]);
            match parse_beacon(frame.trim()) {
                Ok(beacon) => return Ok((addr, beacon)),
                Err(_) => {
                    tracing::debug!(%addr, "ignoring non-AMXB datagram");
                }
            }
        }
    }
}
