//! # toolgate OpenAPI engine
//!
//! Turns an OpenAPI 3.x document into a registry of callable tools.
//!
//! ## Features
//!
//! - Load OpenAPI v3.0+ specifications (JSON and YAML, file or URL)
//! - One tool per operation, with an input schema built from its parameters and body
//! - Argument validation and marshaling (path, query, header, cookie, body)
//! - Random choice among declared servers, or a fixed base URL
//! - API key, bearer and basic authentication driven by the spec's security schemes
//! - Confirmation gate for PUT/POST/DELETE/PATCH
//! - Tagged result envelopes for JSON, text, binary and error responses
//!
//! ## Example
//!
//! ```no_run
//! use toolgate_core::Credentials;
//! use toolgate_openapi::{EngineOptions, ToolRegistry, load_from_file};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let spec = load_from_file("./api/openapi.yaml")?;
//! let registry = ToolRegistry::from_spec(
//!     &spec,
//!     EngineOptions {
//!         credentials: Credentials::bearer(std::env::var("BEARER_TOKEN")?),
//!         ..Default::default()
//!     },
//! )?;
//!
//! for tool in registry.list() {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//!
//! let result = registry.call("getPet", json!({"id": 7})).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod loader;
pub mod marshal;
pub mod naming;
pub mod registry;
pub mod response;
pub mod rest_api_tool;
pub mod schema;
pub mod server;
pub mod synthetic;
pub mod types;

pub use auth::{AuthInjector, AuthLocation, SecurityScheme};
pub use error::{
    ArgumentError, OpenApiError, Result, SelectionError, SpecError, TransportError,
    TransportErrorKind,
};
pub use executor::{HttpExecutor, RawResponse, ReqwestExecutor};
pub use extractor::{ExtractMode, OperationExtractor};
pub use loader::{load, load_from_file, load_from_str, load_from_url};
pub use marshal::{RequestDescriptor, RequestPayload, marshal};
pub use naming::ToolNameFormat;
pub use registry::{EngineOptions, ToolDescription, ToolEntry, ToolRegistry, ToolSummary};
pub use response::{Gate, confirmation_gate, map_response, map_transport_error};
pub use rest_api_tool::{RestApiTool, ToolRuntime};
pub use schema::{InputSchema, build_input_schema};
pub use server::{RandomSource, SeededRandom, ServerSelector, ThreadRandom};
pub use types::{HttpMethod, Operation, Parameter, ParameterLocation, ParameterStyle};
