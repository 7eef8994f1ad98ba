//! Argument marshaling.
//!
//! Turns a validated argument object into a [`RequestDescriptor`]: the path
//! with placeholders substituted, query pairs, headers, cookies and an encoded
//! body. No network access happens here.

use crate::error::ArgumentError;
use crate::schema::{InputSchema, PropertySource};
use crate::types::{BodyEncoding, HttpMethod, Operation, ParameterLocation, ParameterStyle};
use serde_json::{Map, Value};
use toolgate_core::CONFIRMATION_FLAG;
use tracing::debug;
use url::Url;

/// Encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Json(Value),
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
    /// `multipart/form-data` text fields
    Multipart(Vec<(String, String)>),
    Raw {
        bytes: Vec<u8>,
        content_type: String,
    },
}

impl RequestPayload {
    pub fn content_type(&self) -> &str {
        match self {
            RequestPayload::Json(_) => "application/json",
            RequestPayload::Form(_) => "application/x-www-form-urlencoded",
            RequestPayload::Multipart(_) => "multipart/form-data",
            RequestPayload::Raw { content_type, .. } => content_type,
        }
    }
}

/// Everything needed to send one request. Built per call and then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Filled in by the server selector
    pub base_url: String,
    /// Path with placeholders substituted and escaped
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub body: Option<RequestPayload>,
    /// Argument keys that matched nothing and were not sent
    pub ignored_arguments: Vec<String>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url: String::new(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            cookies: Vec::new(),
            body: None,
            ignored_arguments: Vec::new(),
        }
    }

    /// Absolute URL including the query string.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.path
        ))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Set a header, replacing any existing one with the same name (case-insensitive).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.query.retain(|(n, _)| n != &name);
        self.query.push((name, value.into()));
    }

    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.cookies.retain(|(n, _)| n != &name);
        self.cookies.push((name, value.into()));
    }

    /// Value for a `Cookie` header, if any cookies are set.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Build the request for `operation` from `arguments`.
///
/// Validation against `input` runs first, so anything rejected here is
/// rejected by [`InputSchema::validate`] too.
pub fn marshal(
    operation: &Operation,
    input: &InputSchema,
    arguments: &Value,
) -> Result<RequestDescriptor, ArgumentError> {
    let empty = Map::new();
    let arguments = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(ArgumentError::NotAnObject),
    };

    input.validate(arguments)?;

    let mut request = RequestDescriptor::new(operation.method, operation.path.clone());

    for property in &input.properties {
        let Some(value) = arguments.get(&property.name).filter(|v| !v.is_null()) else {
            continue;
        };

        match &property.source {
            PropertySource::Parameter {
                wire_name,
                location,
                style,
                explode,
            } => match location {
                ParameterLocation::Path => {
                    let rendered = render_path(wire_name, value, *style, *explode);
                    request.path = request.path.replace(&format!("{{{wire_name}}}"), &rendered);
                }
                ParameterLocation::Query => {
                    request
                        .query
                        .extend(encode_query(wire_name, value, *style, *explode));
                }
                ParameterLocation::Header => {
                    request
                        .headers
                        .push((wire_name.clone(), render_simple(value, *explode)));
                }
                ParameterLocation::Cookie => {
                    request
                        .cookies
                        .push((wire_name.clone(), render_simple(value, false)));
                }
            },
            PropertySource::RequestBody { media_type } => {
                request.body = Some(encode_body(media_type.as_deref(), value));
            }
        }
    }

    request.ignored_arguments = arguments
        .keys()
        .filter(|key| key.as_str() != CONFIRMATION_FLAG && input.property(key).is_none())
        .cloned()
        .collect();

    debug!(
        operation = %operation.id,
        path = %request.path,
        query = request.query.len(),
        headers = request.headers.len(),
        ignored = ?request.ignored_arguments,
        "Marshaled arguments"
    );
    Ok(request)
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Stringify a scalar the way it goes on the wire.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            // `1.0` and `1e3` are valid integers but must not reach the wire as floats.
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// `simple`/`form` rendering without a key: arrays comma-joined, objects as
/// `k,v,k2,v2` (or `k=v,k2=v2` when exploded).
pub(crate) fn render_simple(value: &Value, explode: bool) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                if explode {
                    format!("{k}={}", value_to_string(v))
                } else {
                    format!("{k},{}", value_to_string(v))
                }
            })
            .collect::<Vec<_>>()
            .join(","),
        _ => value_to_string(value),
    }
}

fn escape(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn render_path(name: &str, value: &Value, style: ParameterStyle, explode: bool) -> String {
    let parts: Vec<(Option<String>, String)> = match value {
        Value::Array(items) => items
            .iter()
            .map(|v| (None, escape(&value_to_string(v))))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (Some(escape(k)), escape(&value_to_string(v))))
            .collect(),
        _ => vec![(None, escape(&value_to_string(value)))],
    };
    let is_object = value.is_object();

    let join_pairs = |pair_sep: &str, item_sep: &str| {
        parts
            .iter()
            .map(|(k, v)| match k {
                Some(k) => format!("{k}{pair_sep}{v}"),
                None => v.clone(),
            })
            .collect::<Vec<_>>()
            .join(item_sep)
    };

    match style {
        ParameterStyle::Label => {
            let sep = if explode { "." } else { "," };
            let pair_sep = if explode && is_object { "=" } else { "," };
            format!(".{}", join_pairs(pair_sep, sep))
        }
        ParameterStyle::Matrix => {
            let name = escape(name);
            match (explode, value) {
                (true, Value::Array(_)) => parts
                    .iter()
                    .map(|(_, v)| format!(";{name}={v}"))
                    .collect(),
                (true, Value::Object(_)) => parts
                    .iter()
                    .map(|(k, v)| format!(";{}={v}", k.as_deref().unwrap_or_default()))
                    .collect(),
                _ => format!(";{name}={}", join_pairs(",", ",")),
            }
        }
        _ => {
            let pair_sep = if explode && is_object { "=" } else { "," };
            join_pairs(pair_sep, ",")
        }
    }
}

fn encode_query(
    name: &str,
    value: &Value,
    style: ParameterStyle,
    explode: bool,
) -> Vec<(String, String)> {
    match value {
        Value::Array(items) => {
            let values: Vec<String> = items.iter().map(value_to_string).collect();
            match (style, explode) {
                (ParameterStyle::SpaceDelimited, _) => vec![(name.to_string(), values.join(" "))],
                (ParameterStyle::PipeDelimited, _) => vec![(name.to_string(), values.join("|"))],
                (ParameterStyle::DeepObject, _) | (_, false) => {
                    vec![(name.to_string(), values.join(","))]
                }
                (_, true) => values.into_iter().map(|v| (name.to_string(), v)).collect(),
            }
        }
        Value::Object(map) => match (style, explode) {
            (ParameterStyle::DeepObject, _) => map
                .iter()
                .map(|(k, v)| (format!("{name}[{k}]"), value_to_string(v)))
                .collect(),
            (ParameterStyle::Form, true) => map
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect(),
            _ => vec![(name.to_string(), render_simple(value, false))],
        },
        _ => vec![(name.to_string(), value_to_string(value))],
    }
}

fn flatten_fields(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .flat_map(|(k, v)| match v {
                Value::Array(items) => items
                    .iter()
                    .map(|item| (k.clone(), value_to_string(item)))
                    .collect::<Vec<_>>(),
                Value::Null => Vec::new(),
                _ => vec![(k.clone(), value_to_string(v))],
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn encode_body(media_type: Option<&str>, value: &Value) -> RequestPayload {
    let Some(media_type) = media_type else {
        return RequestPayload::Json(value.clone());
    };

    match BodyEncoding::for_media_type(media_type) {
        BodyEncoding::Json => RequestPayload::Json(value.clone()),
        BodyEncoding::Form => RequestPayload::Form(flatten_fields(value)),
        BodyEncoding::Multipart => RequestPayload::Multipart(flatten_fields(value)),
        BodyEncoding::Text | BodyEncoding::Binary => RequestPayload::Raw {
            bytes: value_to_string(value).into_bytes(),
            content_type: media_type.to_string(),
        },
    }
}
