//! Core traits and types for toolgate
//!
//! This crate provides the contracts shared by the OpenAPI engine and the
//! transports that expose it: the `Tool` trait, call results, credentials and
//! configuration.

pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod traits;

// Re-exports
pub use config::GateConfig;
pub use credentials::{BasicCredentials, Credentials};
pub use envelope::{Envelope, ErrorBody, ErrorCode, FilePayload, ResponseMetadata};
pub use error::{Error, Result};
pub use traits::{CONFIRMATION_FLAG, CallContext, Tool};
