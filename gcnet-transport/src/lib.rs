//! Transport layer for GC family devices
//!
//! This crate provides the network plumbing under the session layer:
//!
//! - `stream`: the `StreamAccessor`/`TransportLayer` traits
//! - `tcp`: TCP transport with connection timeout and keep-alive handling
//! - `discovery`: UDP multicast beacon listener and AMXB parser

pub mod discovery;
pub mod stream;
pub mod tcp;

pub use discovery::{parse_beacon, Beacon, DiscoveryListener};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{connect_stream, KeepAlive, TcpSettings, TcpTransport};
