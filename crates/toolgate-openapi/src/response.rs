//! Response mapping and the confirmation gate.
//!
//! A call moves from `Received` to exactly one of `Confirm`, `Success` or
//! `Error`. Nothing is remembered between calls: a confirmed call is simply a
//! replay of the original arguments with the confirmation flag set.

use crate::error::TransportError;
use crate::executor::RawResponse;
use crate::types::{Operation, is_json_media_type, media_essence};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use toolgate_core::{
    CONFIRMATION_FLAG, Envelope, ErrorBody, ErrorCode, FilePayload, ResponseMetadata,
};
use tracing::error;

/// Upper bound on the upstream body echoed back in an error envelope.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Outcome of the confirmation gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// Go ahead and send the request.
    Proceed,
    /// Stop and ask the caller to resubmit with the flag.
    Confirm(Envelope),
}

/// True when the arguments carry `"__confirmed": true`.
pub fn is_confirmed(arguments: &Value) -> bool {
    arguments
        .get(CONFIRMATION_FLAG)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Decide whether `operation` may run with `arguments`.
pub fn confirmation_gate(operation: &Operation, arguments: &Value, enabled: bool) -> Gate {
    if !enabled || !operation.requires_confirmation() || is_confirmed(arguments) {
        return Gate::Proceed;
    }

    let action = format!("{} {}", operation.method, operation.path);
    let message = format!(
        "'{}' performs {} and may modify data. Resubmit the same arguments with \"{}\": true to execute it.",
        operation.id, action, CONFIRMATION_FLAG
    );
    Gate::Confirm(Envelope::confirmation(message, action))
}

/// Map a transport failure. No HTTP status is attached.
pub fn map_transport_error(err: &TransportError) -> Envelope {
    Envelope::error(err.to_error_body())
}

/// Map a raw HTTP response into a result envelope.
pub fn map_response(tool_name: &str, raw: &RawResponse, ignored_arguments: Vec<String>) -> Envelope {
    if raw.status >= 400 {
        return Envelope::error(upstream_error(tool_name, raw));
    }

    let metadata = Some(ResponseMetadata {
        http_status: raw.status,
        ignored_arguments,
        next_page: raw.header("link").and_then(next_link),
    });

    let essence = raw
        .content_type
        .as_deref()
        .map(media_essence)
        .unwrap_or_default();

    if raw.body.is_empty() {
        return Envelope::text("", metadata);
    }

    if essence.is_empty() || is_json_media_type(&essence) {
        if let Ok(data) = serde_json::from_slice::<Value>(&raw.body) {
            return Envelope::json(data, metadata);
        }
    }

    if essence.is_empty() || is_textual(&essence) {
        return match String::from_utf8(raw.body.clone()) {
            Ok(text) => Envelope::text(text, metadata),
            Err(_) => file_envelope(tool_name, raw, "application/octet-stream", metadata),
        };
    }

    let mime = raw.content_type.as_deref().unwrap_or("application/octet-stream");
    file_envelope(tool_name, raw, mime, metadata)
}

fn is_textual(essence: &str) -> bool {
    essence.starts_with("text/")
        || is_json_media_type(essence)
        || essence.ends_with("+xml")
        || matches!(
            essence,
            "application/xml"
                | "application/javascript"
                | "application/x-www-form-urlencoded"
                | "application/yaml"
                | "application/x-yaml"
        )
}

fn file_envelope(
    tool_name: &str,
    raw: &RawResponse,
    mime: &str,
    metadata: Option<ResponseMetadata>,
) -> Envelope {
    let suggested_file_name = raw
        .header("content-disposition")
        .and_then(disposition_file_name)
        .unwrap_or_else(|| format!("{tool_name}.{}", extension_for(&media_essence(mime))));

    Envelope::file(
        FilePayload {
            bytes: STANDARD.encode(&raw.body),
            mime_type: mime.to_string(),
            suggested_file_name,
        },
        metadata,
    )
}

fn upstream_error(tool_name: &str, raw: &RawResponse) -> ErrorBody {
    let message = match raw.status_text.as_deref().filter(|s| !s.is_empty()) {
        Some(reason) => format!("HTTP {} {}", raw.status, reason),
        None => format!("HTTP {}", raw.status),
    };

    let text = String::from_utf8_lossy(&raw.body);
    let raw_body = if text.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.into_owned()
    };

    error!(
        tool = tool_name,
        status = raw.status,
        "Upstream returned an error response"
    );

    let mut body = ErrorBody::new(ErrorCode::UpstreamError, message);
    body.http_status = Some(raw.status);
    if !raw_body.is_empty() {
        body.raw_body = Some(raw_body);
    }
    if let Ok(details) = serde_json::from_slice::<Value>(&raw.body) {
        body = body.with_details(details);
    }
    for suggestion in suggestions_for(raw.status) {
        body = body.with_suggestion(suggestion);
    }
    body
}

fn suggestions_for(status: u16) -> Vec<&'static str> {
    match status {
        401 | 403 => vec![
            "Check the configured credentials (API key, bearer token or basic auth).",
            "Make sure the credentials grant access to this operation.",
        ],
        404 => vec!["Check the path parameters; the resource may not exist."],
        429 => vec!["The upstream is rate limiting requests; wait before retrying."],
        400 | 422 => vec!["Call the describe tool and check the arguments against the input schema."],
        500..=599 => vec!["The upstream service failed; the request may succeed later."],
        _ => Vec::new(),
    }
}

/// Extract `filename` from a Content-Disposition header. `filename*` wins.
fn disposition_file_name(header: &str) -> Option<String> {
    let mut plain = None;
    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = value.rsplit_once("''").map_or(value, |(_, name)| name);
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    if let Some(name) = sanitize_file_name(&decoded) {
                        return Some(name);
                    }
                }
            }
            "filename" => plain = sanitize_file_name(value),
            _ => {}
        }
    }
    plain
}

fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    (!base.is_empty() && base != "." && base != "..").then(|| base.to_string())
}

fn extension_for(essence: &str) -> String {
    let known = match essence {
        "application/octet-stream" => "bin",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/gzip" => "gz",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "audio/mpeg" => "mp3",
        "video/mp4" => "mp4",
        _ => "",
    };
    if !known.is_empty() {
        return known.to_string();
    }

    essence
        .split_once('/')
        .map(|(_, subtype)| subtype)
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
        .to_string()
}

/// URL of the `rel="next"` entry of a Link header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params.split(';').any(|p| {
            p.trim()
                .strip_prefix("rel=")
                .is_some_and(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
        });
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpMethod;
    use serde_json::json;

    fn operation(method: HttpMethod) -> Operation {
        Operation {
            id: "deletePet".to_string(),
            method,
            path: "/pets/{id}".to_string(),
            parameters: vec![],
            request_body: None,
            summary: None,
            description: None,
            tags: vec![],
            deprecated: false,
            security: vec![],
        }
    }

    fn response(status: u16, content_type: &str, body: &[u8]) -> RawResponse {
        RawResponse {
            status,
            status_text: None,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            content_type: Some(content_type.to_string()),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_gate_blocks_unconfirmed_mutations() {
        let op = operation(HttpMethod::Delete);
        match confirmation_gate(&op, &json!({"id": 1}), true) {
            Gate::Confirm(envelope) => {
                let value = serde_json::to_value(&envelope).unwrap();
                assert_eq!(value["type"], "confirmation_request");
                assert_eq!(value["action"], "DELETE /pets/{id}");
                assert!(value["message"].as_str().unwrap().contains(CONFIRMATION_FLAG));
            }
            Gate::Proceed => panic!("unconfirmed DELETE must be gated"),
        }

        assert_eq!(
            confirmation_gate(&op, &json!({"id": 1, "__confirmed": true}), true),
            Gate::Proceed
        );
        assert!(matches!(
            confirmation_gate(&op, &json!({"id": 1, "__confirmed": "yes"}), true),
            Gate::Confirm(_)
        ));
    }

    #[test]
    fn test_gate_ignores_reads_and_can_be_disabled() {
        assert_eq!(
            confirmation_gate(&operation(HttpMethod::Get), &json!({}), true),
            Gate::Proceed
        );
        assert_eq!(
            confirmation_gate(&operation(HttpMethod::Post), &json!({}), false),
            Gate::Proceed
        );
    }

    #[test]
    fn test_json_success() {
        let raw = response(200, "application/json", br#"{"id": 7}"#);
        let envelope = map_response("getPet", &raw, vec!["extra".to_string()]);
        assert_eq!(envelope.kind(), "json");
        let metadata = envelope.metadata().unwrap();
        assert_eq!(metadata.http_status, 200);
        assert_eq!(metadata.ignored_arguments, vec!["extra"]);
    }

    #[test]
    fn test_invalid_json_falls_back_to_text() {
        let raw = response(200, "application/json", b"not json");
        let envelope = map_response("getPet", &raw, vec![]);
        assert!(matches!(envelope, Envelope::Text { ref text, .. } if text == "not json"));
    }

    #[test]
    fn test_binary_becomes_file() {
        let raw = response(200, "application/octet-stream", &[0, 159, 146, 150]);
        match map_response("download", &raw, vec![]) {
            Envelope::File { file, .. } => {
                assert_eq!(file.bytes, STANDARD.encode([0u8, 159, 146, 150]));
                assert_eq!(file.mime_type, "application/octet-stream");
                assert_eq!(file.suggested_file_name, "download.bin");
            }
            other => panic!("expected file envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_file_name_from_content_disposition() {
        assert_eq!(
            disposition_file_name(r#"attachment; filename="report.pdf""#).as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            disposition_file_name("attachment; filename=a.txt; filename*=UTF-8''r%C3%A9sum%C3%A9.txt")
                .as_deref(),
            Some("résumé.txt")
        );
        assert_eq!(
            disposition_file_name(r#"attachment; filename="../../etc/passwd""#).as_deref(),
            Some("passwd")
        );
        assert_eq!(disposition_file_name("inline"), None);
    }

    #[test]
    fn test_error_status() {
        let mut raw = response(404, "text/plain", b"not found");
        raw.status_text = Some("Not Found".to_string());
        let envelope = map_response("getPet", &raw, vec![]);
        let body = envelope.error_body().unwrap();
        assert_eq!(body.code, ErrorCode::UpstreamError);
        assert_eq!(body.http_status, Some(404));
        assert_eq!(body.message, "HTTP 404 Not Found");
        assert_eq!(body.raw_body.as_deref(), Some("not found"));
        assert!(!body.suggestions.is_empty());
    }

    #[test]
    fn test_error_details_from_json_body() {
        let raw = response(422, "application/json", br#"{"field": "name"}"#);
        let body = map_response("createPet", &raw, vec![]).error_body().cloned().unwrap();
        assert_eq!(body.details, Some(json!({"field": "name"})));
        assert!(body.message.contains("422"));
    }

    #[test]
    fn test_empty_body_is_empty_text() {
        let raw = RawResponse {
            status: 204,
            ..Default::default()
        };
        let envelope = map_response("deletePet", &raw, vec![]);
        assert!(matches!(envelope, Envelope::Text { ref text, .. } if text.is_empty()));
    }

    #[test]
    fn test_next_page_from_link_header() {
        let mut raw = response(200, "application/json", b"[]");
        raw.headers.push((
            "Link".to_string(),
            r#"<https://api.example.com/items?page=1>; rel="prev", <https://api.example.com/items?page=3>; rel="next""#
                .to_string(),
        ));
        let envelope = map_response("listItems", &raw, vec![]);
        assert_eq!(
            envelope.metadata().unwrap().next_page.as_deref(),
            Some("https://api.example.com/items?page=3")
        );
    }
}
