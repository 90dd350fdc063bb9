//! gcnet - Rust client for the GC family Unified TCP API
//!
//! Talks to networked infrared/serial/relay control devices of the GC line
//! (GC-100, iTach, Flex, Global Connect) over TCP port 4998.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `gcnet-core`: error taxonomy, error-code dictionary, product tables
//! - `gcnet-transport`: TCP transport and UDP multicast discovery
//! - `gcnet-session`: response classification, framing, the transfer queue
//! - `gcnet-client`: client facade, connection supervision, device probe
//!
//! # Usage
//!
//! ```rust,no_run
//! use gcnet::client::{GcClient, Options};
//!
//! # async fn example() -> gcnet::GcResult<()> {
//! let client = GcClient::new(Options::new("192.168.1.70"));
//! client.connect();
//! let version = client.send("getversion").await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use gcnet_core::{ConnectionError, GcError, GcResult, ProductFamily, ResponseError};

// Re-export client API
pub mod client {
    pub use gcnet_client::*;
}

// Re-export session internals for advanced use
pub mod session {
    pub use gcnet_session::*;
}

// Re-export transport and discovery
pub mod transport {
    pub use gcnet_transport::*;
}
