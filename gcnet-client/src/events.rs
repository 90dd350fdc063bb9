//! Events published by the client facade

use crate::supervisor::ConnectionState;
use gcnet_core::GcError;
use std::sync::Arc;

/// Event stream payload
///
/// Delivered on a broadcast channel; slow subscribers that lag simply miss
/// events, they never block the client task.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The connection state changed
    State(ConnectionState),
    /// The stream opened and the queue resumed
    Connect,
    /// The stream closed, by a drop or a manual close
    Close,
    /// A connect-phase or transport error
    Error(Arc<GcError>),
}
