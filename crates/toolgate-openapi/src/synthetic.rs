//! Informational tools that are not backed by an operation.
//!
//! They answer from the loaded document alone and never touch the network.

use crate::registry::ToolDescription;
use async_trait::async_trait;
use serde_json::{Value, json};
use toolgate_core::{CallContext, Envelope, ErrorBody, ErrorCode, Tool};

pub const INFO_TOOL: &str = "info";
pub const EXTERNAL_DOCS_TOOL: &str = "externalDocs";
pub const DESCRIBE_TOOL: &str = "describe";

pub(crate) const DESCRIBE_DESCRIPTION: &str =
    "Input schemas and usage examples for the available tools";

fn no_arguments() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

/// Exposes the document's `info` block.
pub struct InfoTool {
    name: String,
    info: Value,
}

impl InfoTool {
    pub fn new(name: impl Into<String>, info: &openapiv3::Info) -> Self {
        Self {
            name: name.into(),
            info: serde_json::to_value(info).unwrap_or(Value::Null),
        }
    }
}

#[async_trait]
impl Tool for InfoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Title, version and contact details of the API"
    }

    fn schema(&self) -> Value {
        no_arguments()
    }

    async fn call(&self, _ctx: &CallContext, _arguments: Value) -> Envelope {
        Envelope::json(self.info.clone(), None)
    }
}

/// Exposes the document's top-level `externalDocs`.
pub struct ExternalDocsTool {
    name: String,
    docs: Value,
}

impl ExternalDocsTool {
    pub fn new(name: impl Into<String>, docs: &openapiv3::ExternalDocumentation) -> Self {
        Self {
            name: name.into(),
            docs: serde_json::to_value(docs).unwrap_or(Value::Null),
        }
    }
}

#[async_trait]
impl Tool for ExternalDocsTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Link to the API's external documentation"
    }

    fn schema(&self) -> Value {
        no_arguments()
    }

    async fn call(&self, _ctx: &CallContext, _arguments: Value) -> Envelope {
        Envelope::json(self.docs.clone(), None)
    }
}

/// Returns input schemas and examples for one tool or all of them.
///
/// Answers from a snapshot taken once registration is complete.
pub struct DescribeTool {
    name: String,
    descriptions: Vec<ToolDescription>,
}

impl DescribeTool {
    pub fn new(name: impl Into<String>, descriptions: Vec<ToolDescription>) -> Self {
        Self {
            name: name.into(),
            descriptions,
        }
    }

    pub fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "tool": {
                    "type": "string",
                    "description": "Name of a single tool to describe; omit for all tools"
                }
            },
            "required": []
        })
    }
}

#[async_trait]
impl Tool for DescribeTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        DESCRIBE_DESCRIPTION
    }

    fn schema(&self) -> Value {
        Self::input_schema()
    }

    async fn call(&self, _ctx: &CallContext, arguments: Value) -> Envelope {
        match arguments.get("tool").and_then(Value::as_str) {
            None => Envelope::json(json!({"tools": self.descriptions}), None),
            Some(wanted) => match self.descriptions.iter().find(|d| d.name == wanted) {
                Some(description) => Envelope::json(json!(description), None),
                None => Envelope::error(
                    ErrorBody::new(ErrorCode::UnknownTool, format!("Unknown tool '{wanted}'"))
                        .with_suggestion("Call describe without arguments to list every tool."),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(name: &str) -> ToolDescription {
        ToolDescription {
            name: name.to_string(),
            description: format!("{name} things"),
            tags: vec![],
            input_schema: no_arguments(),
            examples: vec![json!({})],
            method: None,
            path: None,
            requires_confirmation: false,
            deprecated: false,
        }
    }

    #[tokio::test]
    async fn test_info_tool_returns_info_block() {
        let info: openapiv3::Info =
            serde_json::from_value(json!({"title": "Pet Store", "version": "1.2.3"})).unwrap();
        let tool = InfoTool::new(INFO_TOOL, &info);

        let envelope = tool.call(&CallContext::new(), json!({})).await;
        match envelope {
            Envelope::Json { data, metadata, .. } => {
                assert_eq!(data["title"], "Pet Store");
                assert_eq!(data["version"], "1.2.3");
                assert!(metadata.is_none());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_describe_one_or_all() {
        let tool = DescribeTool::new(DESCRIBE_TOOL, vec![description("a"), description("b")]);

        let all = tool.call(&CallContext::new(), json!({})).await;
        let Envelope::Json { data, .. } = all else {
            panic!("expected json");
        };
        assert_eq!(data["tools"].as_array().unwrap().len(), 2);

        let one = tool.call(&CallContext::new(), json!({"tool": "b"})).await;
        let Envelope::Json { data, .. } = one else {
            panic!("expected json");
        };
        assert_eq!(data["name"], "b");
        assert_eq!(data["inputSchema"]["type"], "object");

        let missing = tool.call(&CallContext::new(), json!({"tool": "zzz"})).await;
        assert_eq!(missing.error_body().unwrap().code, ErrorCode::UnknownTool);
    }
}
