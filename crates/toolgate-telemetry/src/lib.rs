//! Logging and tracing setup for toolgate.
//!
//! Everything is written to stderr so that stdout stays free for the stdio
//! protocol stream.

pub mod attributes;
pub mod spans;
pub mod tracer;

pub use spans::{ToolSpanAttributes, record_outcome, tool_call_span};
pub use tracer::init_telemetry;
