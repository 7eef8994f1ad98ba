//! REST API tool implementation.

use crate::auth::AuthInjector;
use crate::executor::HttpExecutor;
use crate::marshal::marshal;
use crate::response::{Gate, confirmation_gate, map_response, map_transport_error};
use crate::schema::InputSchema;
use crate::server::ServerSelector;
use crate::types::Operation;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use toolgate_core::{CONFIRMATION_FLAG, CallContext, Envelope, Tool};
use toolgate_telemetry::{ToolSpanAttributes, record_outcome, tool_call_span};
use tracing::{Instrument, debug, info, warn};

/// Collaborators shared by every operation tool of one registry.
pub struct ToolRuntime {
    pub selector: ServerSelector,
    pub auth: AuthInjector,
    pub executor: Arc<dyn HttpExecutor>,
    pub timeout: Duration,
    /// Gate PUT/POST/DELETE/PATCH behind the confirmation flag
    pub confirm_dangerous: bool,
}

/// A tool that executes one REST operation.
pub struct RestApiTool {
    name: String,
    description: String,
    operation: Arc<Operation>,
    input: Arc<InputSchema>,
    runtime: Arc<ToolRuntime>,
}

impl RestApiTool {
    pub fn new(
        name: impl Into<String>,
        operation: Arc<Operation>,
        input: Arc<InputSchema>,
        runtime: Arc<ToolRuntime>,
    ) -> Self {
        Self {
            name: name.into(),
            description: operation.display_text(),
            operation,
            input,
            runtime,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    async fn run(&self, ctx: &CallContext, mut arguments: Value) -> Envelope {
        let gate = confirmation_gate(&self.operation, &arguments, self.runtime.confirm_dangerous);

        if let Value::Object(map) = &mut arguments {
            map.remove(CONFIRMATION_FLAG);
        }

        // Bad arguments are reported before asking for confirmation.
        let mut request = match marshal(&self.operation, &self.input, &arguments) {
            Ok(request) => request,
            Err(err) => {
                debug!(error = %err, "Arguments rejected");
                return Envelope::error(err.to_error_body());
            }
        };

        if let Gate::Confirm(envelope) = gate {
            info!("Confirmation required; no request sent");
            return envelope;
        }

        request.base_url = match self.runtime.selector.select() {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "No base URL");
                return Envelope::error(err.to_error_body());
            }
        };

        self.runtime
            .auth
            .apply(&mut request, &self.operation, ctx.credentials.as_ref());

        let ignored = std::mem::take(&mut request.ignored_arguments);
        match self.runtime.executor.execute(&request, self.runtime.timeout).await {
            Ok(raw) => map_response(&self.name, &raw, ignored),
            Err(err) => {
                warn!(error = %err, "Request failed");
                map_transport_error(&err)
            }
        }
    }
}

#[async_trait]
impl Tool for RestApiTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Value {
        self.input.to_json()
    }

    async fn call(&self, ctx: &CallContext, arguments: Value) -> Envelope {
        let span = tool_call_span(ToolSpanAttributes {
            tool_name: &self.name,
            invocation_id: &ctx.invocation_id,
            http_method: self.operation.method.as_str(),
            route: &self.operation.path,
        });

        let envelope = self.run(ctx, arguments).instrument(span.clone()).await;

        let status = envelope
            .metadata()
            .map(|m| m.http_status)
            .or_else(|| envelope.error_body().and_then(|e| e.http_status));
        record_outcome(&span, envelope.kind(), status);
        envelope
    }
}
