//! Core types for the GC family Unified TCP API client
//!
//! This crate provides the pieces shared by every layer of the stack:
//!
//! - `error`: the error taxonomy (`GcError`, `ConnectionError`, `ResponseError`)
//! - `codes`: the static dictionary of device-reported error codes
//! - `model`: product family and module classification tables

pub mod codes;
pub mod error;
pub mod model;

pub use error::{ConnectionError, ConnectionErrorCode, GcError, GcResult, ResponseError};
pub use model::{DeviceModule, ModuleKind, ProductFamily};
