//! Client for GC family devices speaking the Unified TCP API
//!
//! The facade queues requests, serialises them onto the single TCP stream,
//! correlates responses back to their requests, retries on busy signals and
//! supervises the connection with timeout and backoff-based reconnection.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use gcnet_client::{GcClient, Options};
//!
//! # async fn example() -> gcnet_core::GcResult<()> {
//! let client = GcClient::new(Options::new("192.168.1.70"));
//! client.connect();
//!
//! let devices = client.send("getdevices").await?;
//! let reply = client.send("sendir,1:1,1,38000,1,1,342,171,21,21,21,65,21,1672").await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod client;
pub mod events;
pub mod options;
pub mod probe;
pub mod supervisor;

pub use backoff::{Backoff, BackoffOptions, BackoffStrategy};
pub use client::GcClient;
pub use events::ClientEvent;
pub use options::{Options, OptionsPatch};
pub use probe::{probe, DeviceInfo, IrPort};
pub use supervisor::ConnectionState;
