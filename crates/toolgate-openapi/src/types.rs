//! Normalized operation model extracted from an OpenAPI document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// HTTP method of an operation.
///
/// The declaration order is the listing precedence used when sorting
/// operations that share a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Methods gated behind the confirmation flag. Decided by verb alone.
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self,
            HttpMethod::Put | HttpMethod::Post | HttpMethod::Delete | HttpMethod::Patch
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Trace => reqwest::Method::TRACE,
        }
    }
}

/// Location where a parameter appears in the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Path parameter (e.g., /users/{id})
    Path,
    /// Query parameter (e.g., ?search=value)
    Query,
    /// Header parameter (e.g., X-Custom-Header)
    Header,
    /// Cookie parameter
    Cookie,
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

/// Serialization style of an array/object parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Simple,
    Form,
    Label,
    Matrix,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

/// JSON-Schema primitive type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    /// Read the `type` keyword of a JSON schema fragment.
    pub fn of(schema: &Value) -> Option<SchemaType> {
        match schema.get("type")?.as_str()? {
            "string" => Some(SchemaType::String),
            "number" => Some(SchemaType::Number),
            "integer" => Some(SchemaType::Integer),
            "boolean" => Some(SchemaType::Boolean),
            "array" => Some(SchemaType::Array),
            "object" => Some(SchemaType::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
        }
    }
}

/// One input slot of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Name as declared in the spec
    pub name: String,
    pub location: ParameterLocation,
    /// Always true for path parameters
    pub required: bool,
    pub description: Option<String>,
    /// JSON schema of the value (type, format, enum, default, ...)
    pub schema: Value,
    pub style: ParameterStyle,
    pub explode: bool,
    pub deprecated: bool,
}

impl Parameter {
    pub fn schema_type(&self) -> Option<SchemaType> {
        SchemaType::of(&self.schema)
    }
}

/// Schema declared for one request media type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTypeSchema {
    pub media_type: String,
    pub schema: Value,
}

/// How a request body is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    Form,
    Multipart,
    Text,
    Binary,
}

impl BodyEncoding {
    pub fn for_media_type(media_type: &str) -> BodyEncoding {
        let essence = media_essence(media_type);
        if is_json_media_type(&essence) {
            BodyEncoding::Json
        } else if essence == "application/x-www-form-urlencoded" {
            BodyEncoding::Form
        } else if essence.starts_with("multipart/") {
            BodyEncoding::Multipart
        } else if essence.starts_with("text/") || essence.ends_with("+xml") || essence == "application/xml" {
            BodyEncoding::Text
        } else {
            BodyEncoding::Binary
        }
    }
}

/// Optional payload descriptor of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBodySpec {
    pub description: Option<String>,
    pub required: bool,
    /// Declared media types, in spec order
    pub content: Vec<MediaTypeSchema>,
}

impl RequestBodySpec {
    /// The media type used at invocation time: JSON when declared, else the first one.
    pub fn preferred(&self) -> Option<&MediaTypeSchema> {
        self.content
            .iter()
            .find(|m| is_json_media_type(&media_essence(&m.media_type)))
            .or_else(|| self.content.first())
    }
}

/// Security requirement for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRequirement {
    /// Security scheme name (from components.securitySchemes)
    pub scheme_name: String,
    /// Required scopes (for OAuth2)
    pub scopes: Vec<String>,
}

/// One REST endpoint derived from the spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Unique across the document
    pub id: String,
    pub method: HttpMethod,
    /// Path template (e.g., "/users/{id}")
    pub path: String,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBodySpec>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    /// Schemes this operation may be called with; empty means no auth
    pub security: Vec<SecurityRequirement>,
}

impl Operation {
    /// Human-readable text for listings: summary, else description, else "METHOD path".
    pub fn display_text(&self) -> String {
        self.summary
            .as_deref()
            .or(self.description.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} {}", self.method, self.path))
    }

    /// Text matched by include/exclude filters.
    pub fn filter_text(&self) -> String {
        [self.summary.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn parameter(&self, name: &str, location: ParameterLocation) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name == name && p.location == location)
    }

    pub fn requires_confirmation(&self) -> bool {
        self.method.requires_confirmation()
    }
}

/// Names of the `{placeholder}` segments of a path template, in order.
pub fn path_placeholders(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if !name.is_empty() {
                    names.push(name.to_string());
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Lowercased media type without parameters ("application/json; charset=utf-8" -> "application/json").
pub fn media_essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_json_media_type(essence: &str) -> bool {
    essence == "application/json" || essence.ends_with("+json")
}
