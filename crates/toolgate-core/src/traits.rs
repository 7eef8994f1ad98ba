use crate::credentials::Credentials;
use crate::envelope::Envelope;
use async_trait::async_trait;
use serde_json::Value;

/// Argument key a caller sets to `true` to confirm a mutating call.
pub const CONFIRMATION_FLAG: &str = "__confirmed";

/// Per-call context handed to a tool.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Correlates log lines of one call
    pub invocation_id: String,
    /// Credentials that override the configured ones for this call only
    pub credentials: Option<Credentials>,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            invocation_id: uuid::Uuid::new_v4().to_string(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An externally invocable unit.
///
/// `call` never fails: every outcome, including bad arguments and upstream
/// errors, is reported through the returned `Envelope`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments
    fn schema(&self) -> Value;

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Envelope;
}
