//! Tool call results.
//!
//! Every tool call ends in exactly one `Envelope`. The `type` tag tells a
//! caller which shape it is holding, so nothing has to be sniffed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a single tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Upstream answered with JSON.
    #[serde(rename = "json")]
    Json {
        data: Value,
        #[serde(rename = "outputFormat")]
        output_format: String,
        #[serde(rename = "outputType")]
        output_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<ResponseMetadata>,
    },

    /// Upstream answered with text (or nothing at all).
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(rename = "outputFormat")]
        output_format: String,
        #[serde(rename = "outputType")]
        output_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<ResponseMetadata>,
    },

    /// Upstream answered with a binary payload, carried base64-encoded.
    #[serde(rename = "file")]
    File {
        file: FilePayload,
        #[serde(rename = "outputFormat")]
        output_format: String,
        #[serde(rename = "outputType")]
        output_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<ResponseMetadata>,
    },

    #[serde(rename = "error")]
    Error { error: ErrorBody },

    /// The call would mutate state and must be resubmitted with the
    /// confirmation flag. No request was sent.
    #[serde(rename = "confirmation_request")]
    ConfirmationRequest {
        confirmation_required: bool,
        message: String,
        action: String,
    },
}

impl Envelope {
    pub fn json(data: Value, metadata: Option<ResponseMetadata>) -> Self {
        Envelope::Json {
            data,
            output_format: "structured".to_string(),
            output_type: "json".to_string(),
            metadata,
        }
    }

    pub fn text(text: impl Into<String>, metadata: Option<ResponseMetadata>) -> Self {
        Envelope::Text {
            text: text.into(),
            output_format: "unstructured".to_string(),
            output_type: "text".to_string(),
            metadata,
        }
    }

    pub fn file(file: FilePayload, metadata: Option<ResponseMetadata>) -> Self {
        Envelope::File {
            file,
            output_format: "binary".to_string(),
            output_type: "file".to_string(),
            metadata,
        }
    }

    pub fn error(error: ErrorBody) -> Self {
        Envelope::Error { error }
    }

    pub fn confirmation(message: impl Into<String>, action: impl Into<String>) -> Self {
        Envelope::ConfirmationRequest {
            confirmation_required: true,
            message: message.into(),
            action: action.into(),
        }
    }

    /// The `type` tag this envelope serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Json { .. } => "json",
            Envelope::Text { .. } => "text",
            Envelope::File { .. } => "file",
            Envelope::Error { .. } => "error",
            Envelope::ConfirmationRequest { .. } => "confirmation_request",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error { .. })
    }

    pub fn error_body(&self) -> Option<&ErrorBody> {
        match self {
            Envelope::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn metadata(&self) -> Option<&ResponseMetadata> {
        match self {
            Envelope::Json { metadata, .. }
            | Envelope::Text { metadata, .. }
            | Envelope::File { metadata, .. } => metadata.as_ref(),
            Envelope::Error { .. } | Envelope::ConfirmationRequest { .. } => None,
        }
    }
}

/// Observability data attached to successful results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(rename = "httpStatus")]
    pub http_status: u16,

    /// Argument keys that matched no declared parameter and were not sent
    #[serde(
        rename = "ignoredArguments",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ignored_arguments: Vec<String>,

    /// Next page URL from a `Link: <...>; rel="next"` response header
    #[serde(rename = "nextPage", default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
}

/// Binary response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    /// Standard base64 of the raw body
    pub bytes: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "suggestedFileName")]
    pub suggested_file_name: String,
}

/// Machine-readable classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidArgument,
    MissingPathParameter,
    NoServerAvailable,
    NetworkError,
    UpstreamError,
    UnknownTool,
    NotExecutable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,

    #[serde(rename = "httpStatus", default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    pub message: String,

    #[serde(rename = "rawBody", default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            http_status: None,
            message: message.into(),
            raw_body: None,
            details: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}
