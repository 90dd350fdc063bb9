//! Session layer for the GC family Unified TCP API
//!
//! This crate holds everything between raw bytes and completed requests:
//!
//! - `framer`: accumulates inbound bytes into complete protocol responses,
//!   including the multiline `getdevices` listing
//! - `classify`: recognises the error, busy and stop-acknowledgement shapes
//!   a device can emit
//! - `expect`: computes the expected-response prefix for an outbound request
//! - `timer`: one-shot cancellable timer handles
//! - `queue`: the transfer queue and request/response correlator

pub mod classify;
pub mod expect;
pub mod framer;
pub mod queue;
pub mod timer;

pub use classify::{classify, Classified};
pub use expect::expected_prefix;
pub use framer::Framer;
pub use queue::{PushOptions, QueueEvent, TransferQueue, WriteOp};
pub use timer::TimerHandle;
