//! Transports for a toolgate registry
//!
//! - `rest`: HTTP/JSON router (axum)
//! - `stdio`: line-delimited JSON-RPC 2.0 over stdin/stdout

pub mod rest;
pub mod stdio;
pub mod types;

pub use rest::{create_router, serve_http};
pub use stdio::{serve_stdio, serve_stream};
pub use types::*;
