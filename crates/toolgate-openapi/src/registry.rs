//! Tool registry.
//!
//! Turns extracted operations into named tools, adds the informational tools,
//! and dispatches calls by name. The registry is filled once at startup and
//! only read afterwards, so concurrent calls need no locking.

use crate::auth::AuthInjector;
use crate::error::{OpenApiError, Result};
use crate::executor::{HttpExecutor, ReqwestExecutor};
use crate::extractor::{ExtractMode, OperationExtractor};
use crate::naming::ToolNameFormat;
use crate::rest_api_tool::{RestApiTool, ToolRuntime};
use crate::schema::InputSchema;
use crate::server::{RandomSource, ServerSelector};
use crate::synthetic::{
    DESCRIBE_DESCRIPTION, DESCRIBE_TOOL, DescribeTool, EXTERNAL_DOCS_TOOL, ExternalDocsTool,
    INFO_TOOL, InfoTool,
};
use crate::types::Operation;
use openapiv3::OpenAPI;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use toolgate_core::{
    CONFIRMATION_FLAG, CallContext, Credentials, Envelope, ErrorBody, ErrorCode, Tool,
};
use tracing::{debug, info, warn};

/// Settings handed to the engine at construction time.
#[derive(Clone)]
pub struct EngineOptions {
    pub name_format: ToolNameFormat,
    pub prefix: Option<String>,
    pub confirm_dangerous: bool,
    /// Register metadata only; calls to operation tools return `NotExecutable`
    pub dry_run: bool,
    pub timeout: Duration,
    /// Used instead of the document's servers when set
    pub base_url: Option<String>,
    pub credentials: Credentials,
    pub mode: ExtractMode,
    pub include: Option<Regex>,
    pub exclude: Option<Regex>,
    /// Defaults to a [`ReqwestExecutor`]
    pub executor: Option<Arc<dyn HttpExecutor>>,
    /// Defaults to the thread RNG
    pub random: Option<Arc<dyn RandomSource>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            name_format: ToolNameFormat::AsIs,
            prefix: None,
            confirm_dangerous: true,
            dry_run: false,
            timeout: Duration::from_secs(30),
            base_url: None,
            credentials: Credentials::none(),
            mode: ExtractMode::Lenient,
            include: None,
            exclude: None,
            executor: None,
            random: None,
        }
    }
}

impl EngineOptions {
    pub fn with_executor(mut self, executor: Arc<dyn HttpExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn tool_name(&self, id: &str) -> String {
        self.name_format.apply(id, self.prefix.as_deref())
    }
}

/// One registered tool.
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Exactly what `call` validates against
    pub input_schema: Value,
    pub input: Option<Arc<InputSchema>>,
    pub operation: Option<Arc<Operation>>,
    /// `None` in dry-run mode
    pub tool: Option<Arc<dyn Tool>>,
}

/// Entry in the `list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Entry in the `describe` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub input_schema: Value,
    pub examples: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

/// Named tools generated from one OpenAPI document.
pub struct ToolRegistry {
    title: String,
    version: String,
    confirm_dangerous: bool,
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Extract the document's operations and register them.
    pub fn from_spec(spec: &OpenAPI, options: EngineOptions) -> Result<Self> {
        let operations = OperationExtractor::new(spec, options.mode)
            .extract_filtered(options.include.as_ref(), options.exclude.as_ref())?;
        info!("Extracted {} operations from OpenAPI spec", operations.len());
        Self::register(operations, spec, options)
    }

    /// Register `operations` as tools, plus the informational tools of `spec`.
    pub fn register(
        operations: Vec<Operation>,
        spec: &OpenAPI,
        options: EngineOptions,
    ) -> Result<Self> {
        let schemes = OperationExtractor::new(spec, options.mode).security_schemes()?;

        let mut selector = ServerSelector::from_spec(spec, options.base_url.clone());
        if let Some(random) = &options.random {
            selector = selector.with_random(random.clone());
        }
        if selector.override_url().is_none() && selector.servers().is_empty() {
            warn!("Spec declares no servers and no base URL is configured; calls will fail");
        }

        let executor = options
            .executor
            .clone()
            .unwrap_or_else(|| Arc::new(ReqwestExecutor::new()) as Arc<dyn HttpExecutor>);

        let runtime = Arc::new(ToolRuntime {
            selector,
            auth: AuthInjector::new(schemes, options.credentials.clone()),
            executor,
            timeout: options.timeout,
            confirm_dangerous: options.confirm_dangerous,
        });

        let mut registry = Self {
            title: spec.info.title.clone(),
            version: spec.info.version.clone(),
            confirm_dangerous: options.confirm_dangerous,
            entries: Vec::new(),
            index: HashMap::new(),
        };

        for operation in operations {
            let name = options.tool_name(&operation.id);
            let input = Arc::new(InputSchema::for_operation(&operation));
            let operation = Arc::new(operation);

            let tool = (!options.dry_run).then(|| {
                Arc::new(RestApiTool::new(
                    name.clone(),
                    operation.clone(),
                    input.clone(),
                    runtime.clone(),
                )) as Arc<dyn Tool>
            });

            debug!(tool = %name, operation = %operation.id, "Registering operation tool");
            registry.insert(ToolEntry {
                name,
                description: operation.display_text(),
                tags: operation.tags.clone(),
                input_schema: input.to_json(),
                input: Some(input),
                operation: Some(operation),
                tool,
            })?;
        }

        registry.insert_tool(Arc::new(InfoTool::new(
            options.tool_name(INFO_TOOL),
            &spec.info,
        )))?;
        if let Some(docs) = &spec.external_docs {
            registry.insert_tool(Arc::new(ExternalDocsTool::new(
                options.tool_name(EXTERNAL_DOCS_TOOL),
                docs,
            )))?;
        }

        let mut describe = ToolEntry {
            name: options.tool_name(DESCRIBE_TOOL),
            description: DESCRIBE_DESCRIPTION.to_string(),
            tags: Vec::new(),
            input_schema: DescribeTool::input_schema(),
            input: None,
            operation: None,
            tool: None,
        };
        let mut snapshot = registry.describe_all();
        snapshot.push(registry.describe_entry(&describe));
        describe.tool = Some(Arc::new(DescribeTool::new(describe.name.clone(), snapshot)));
        registry.insert(describe)?;

        info!(
            tools = registry.len(),
            dry_run = options.dry_run,
            "Registered tools for {} {}",
            registry.title,
            registry.version
        );
        Ok(registry)
    }

    fn insert(&mut self, entry: ToolEntry) -> Result<()> {
        if self.index.contains_key(&entry.name) {
            return Err(OpenApiError::DuplicateToolName(entry.name));
        }
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    fn insert_tool(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        self.insert(ToolEntry {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            tags: Vec::new(),
            input_schema: tool.schema(),
            input: None,
            operation: None,
            tool: Some(tool),
        })
    }

    /// API title from the document's `info` block.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[ToolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every tool in registration order.
    pub fn list(&self) -> Vec<ToolSummary> {
        self.entries
            .iter()
            .map(|entry| ToolSummary {
                name: entry.name.clone(),
                description: entry.description.clone(),
                tags: entry.tags.clone(),
            })
            .collect()
    }

    /// Describe one tool, or all of them when `name` is `None`.
    ///
    /// Returns `None` when a named tool does not exist.
    pub fn describe(&self, name: Option<&str>) -> Option<Vec<ToolDescription>> {
        match name {
            None => Some(self.describe_all()),
            Some(name) => self.describe_tool(name).map(|d| vec![d]),
        }
    }

    pub fn describe_all(&self) -> Vec<ToolDescription> {
        self.entries.iter().map(|e| self.describe_entry(e)).collect()
    }

    pub fn describe_tool(&self, name: &str) -> Option<ToolDescription> {
        self.get(name).map(|e| self.describe_entry(e))
    }

    fn describe_entry(&self, entry: &ToolEntry) -> ToolDescription {
        let minimal = entry
            .input
            .as_ref()
            .map(|input| input.minimal_example())
            .unwrap_or_else(|| json!({}));

        let gated = self.confirm_dangerous
            && entry
                .operation
                .as_ref()
                .is_some_and(|op| op.requires_confirmation());

        let mut examples = vec![minimal.clone()];
        if gated {
            let mut confirmed = minimal;
            if let Value::Object(map) = &mut confirmed {
                map.insert(CONFIRMATION_FLAG.to_string(), Value::Bool(true));
            }
            examples.push(confirmed);
        }

        ToolDescription {
            name: entry.name.clone(),
            description: entry.description.clone(),
            tags: entry.tags.clone(),
            input_schema: entry.input_schema.clone(),
            examples,
            method: entry.operation.as_ref().map(|op| op.method.to_string()),
            path: entry.operation.as_ref().map(|op| op.path.clone()),
            requires_confirmation: gated,
            deprecated: entry.operation.as_ref().is_some_and(|op| op.deprecated),
        }
    }

    /// Call a tool with a fresh context.
    pub async fn call(&self, name: &str, arguments: Value) -> Envelope {
        self.call_with(&CallContext::new(), name, arguments).await
    }

    /// Call a tool. Never fails; every outcome is an envelope.
    pub async fn call_with(&self, ctx: &CallContext, name: &str, arguments: Value) -> Envelope {
        let Some(entry) = self.get(name) else {
            debug!(tool = %name, "Unknown tool");
            return Envelope::error(
                ErrorBody::new(ErrorCode::UnknownTool, format!("Unknown tool '{name}'"))
                    .with_suggestion("List the available tools and retry with one of their names."),
            );
        };

        match &entry.tool {
            Some(tool) => tool.call(ctx, arguments).await,
            None => Envelope::error(ErrorBody::new(
                ErrorCode::NotExecutable,
                format!("Tool '{name}' was registered in dry-run mode and cannot be executed"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{MockHttpExecutor, RawResponse};
    use crate::loader::load_from_str;

    const SPEC: &str = r##"
openapi: 3.0.3
info:
  title: Pet Store
  version: 2.1.0
externalDocs:
  url: https://docs.example.com/pets
servers:
  - url: https://api.example.com/v1
paths:
  /pets:
    get:
      operationId: listPets
      summary: List pets
      tags: [pets]
      parameters:
        - name: status
          in: query
          required: true
          schema:
            type: string
            enum: [available, sold]
      responses:
        '200':
          description: ok
    post:
      operationId: createPet
      summary: Create a pet
      tags: [pets]
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name:
                  type: string
      responses:
        '201':
          description: created
  /pets/{id}:
    delete:
      operationId: deletePet
      responses:
        '204':
          description: deleted
"##;

    fn spec() -> OpenAPI {
        load_from_str(SPEC).unwrap()
    }

    fn names(registry: &ToolRegistry) -> Vec<String> {
        registry.list().into_iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_list_is_ordered_and_includes_informational_tools() {
        let registry = ToolRegistry::from_spec(&spec(), EngineOptions::default()).unwrap();
        assert_eq!(
            names(&registry),
            vec!["listPets", "createPet", "deletePet", "info", "externalDocs", "describe"]
        );
        assert_eq!(registry.list()[0].tags, vec!["pets".to_string()]);
        assert_eq!(registry.list()[2].description, "DELETE /pets/{id}");
        assert_eq!(registry.title(), "Pet Store");
    }

    #[test]
    fn test_name_format_and_prefix() {
        let options = EngineOptions {
            name_format: ToolNameFormat::Snake,
            prefix: Some("shop_".to_string()),
            ..Default::default()
        };
        let registry = ToolRegistry::from_spec(&spec(), options).unwrap();
        assert!(registry.get("shop_list_pets").is_some());
        assert!(registry.get("shop_external_docs").is_some());
        assert!(registry.get("listPets").is_none());
    }

    #[test]
    fn test_duplicate_tool_names_fail_registration() {
        let mut operations = OperationExtractor::lenient(&spec()).extract().unwrap();
        let mut twin = operations[0].clone();
        twin.id = "list_pets".to_string();
        operations.push(twin);

        let options = EngineOptions {
            name_format: ToolNameFormat::Snake,
            ..Default::default()
        };
        match ToolRegistry::register(operations, &spec(), options) {
            Err(OpenApiError::DuplicateToolName(name)) => assert_eq!(name, "list_pets"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("duplicate names were accepted"),
        }
    }

    #[test]
    fn test_operation_named_like_informational_tool_collides() {
        let mut operations = OperationExtractor::lenient(&spec()).extract().unwrap();
        operations[0].id = "info".to_string();
        assert!(matches!(
            ToolRegistry::register(operations, &spec(), EngineOptions::default()),
            Err(OpenApiError::DuplicateToolName(_))
        ));
    }

    #[test]
    fn test_examples_pass_validation() {
        let registry = ToolRegistry::from_spec(&spec(), EngineOptions::default()).unwrap();

        for entry in registry.entries() {
            let description = registry.describe_tool(&entry.name).unwrap();
            if let Some(tool) = &entry.tool {
                assert_eq!(description.input_schema, tool.schema());
            }
            if let Some(input) = &entry.input {
                for example in &description.examples {
                    let mut example = example.as_object().unwrap().clone();
                    example.remove(CONFIRMATION_FLAG);
                    assert!(input.validate(&example).is_ok(), "{}: {example:?}", entry.name);
                }
            }
        }

        let list_pets = registry.describe_tool("listPets").unwrap();
        assert_eq!(list_pets.examples, vec![json!({"status": "available"})]);

        let create = registry.describe_tool("createPet").unwrap();
        assert!(create.requires_confirmation);
        assert_eq!(create.examples[1][CONFIRMATION_FLAG], true);
        assert_eq!(create.examples[0]["requestBody"]["name"], "<name>");
    }

    #[test]
    fn test_dry_run_reuses_schemas() {
        let live = ToolRegistry::from_spec(&spec(), EngineOptions::default()).unwrap();
        let preview = ToolRegistry::from_spec(
            &spec(),
            EngineOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(live.describe(None), preview.describe(None));
        assert!(preview.get("listPets").unwrap().tool.is_none());
    }

    #[tokio::test]
    async fn test_dry_run_calls_are_not_executable() {
        let mut executor = MockHttpExecutor::new();
        executor.expect_execute().times(0);
        let options = EngineOptions {
            dry_run: true,
            ..Default::default()
        }
        .with_executor(Arc::new(executor));
        let registry = ToolRegistry::from_spec(&spec(), options).unwrap();

        let envelope = registry.call("listPets", json!({"status": "sold"})).await;
        assert_eq!(envelope.error_body().unwrap().code, ErrorCode::NotExecutable);

        // informational tools still answer
        let info = registry.call("info", json!({})).await;
        assert_eq!(info.kind(), "json");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::from_spec(&spec(), EngineOptions::default()).unwrap();
        let envelope = registry.call("nope", json!({})).await;
        let error = envelope.error_body().unwrap();
        assert_eq!(error.code, ErrorCode::UnknownTool);
        assert!(error.message.contains("nope"));
    }

    #[tokio::test]
    async fn test_call_dispatches_to_operation() {
        let mut executor = MockHttpExecutor::new();
        executor
            .expect_execute()
            .withf(|request, _| {
                request.base_url == "https://api.example.com/v1"
                    && request.path == "/pets"
                    && request.query == vec![("status".to_string(), "sold".to_string())]
            })
            .times(1)
            .returning(|_, _| {
                Ok(RawResponse {
                    status: 200,
                    content_type: Some("application/json".to_string()),
                    body: b"[]".to_vec(),
                    ..Default::default()
                })
            });
        let options = EngineOptions::default().with_executor(Arc::new(executor));
        let registry = ToolRegistry::from_spec(&spec(), options).unwrap();

        let envelope = registry.call("listPets", json!({"status": "sold"})).await;
        assert_eq!(envelope.kind(), "json");
    }

    #[tokio::test]
    async fn test_describe_tool_covers_itself() {
        let registry = ToolRegistry::from_spec(&spec(), EngineOptions::default()).unwrap();
        let envelope = registry.call("describe", json!({"tool": "describe"})).await;
        let Envelope::Json { data, .. } = envelope else {
            panic!("expected json");
        };
        assert_eq!(data["name"], "describe");
        assert_eq!(data["inputSchema"]["properties"]["tool"]["type"], "string");
    }
}
