//! Input schema construction and argument validation.
//!
//! The same [`InputSchema`] value is rendered for `describe` and consulted by
//! [`InputSchema::validate`] at call time, which the marshaler runs before it
//! builds anything. Previewed and enforced contracts therefore cannot drift.

use crate::error::ArgumentError;
use crate::marshal::render_simple;
use crate::types::{
    BodyEncoding, Operation, Parameter, ParameterLocation, ParameterStyle, RequestBodySpec,
    SchemaType,
};
use serde_json::{Map, Value, json};

/// Argument key carrying the request body.
pub const REQUEST_BODY_PROPERTY: &str = "requestBody";

/// Where an argument goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySource {
    Parameter {
        /// Name sent on the wire; differs from the property name only on collisions
        wire_name: String,
        location: ParameterLocation,
        style: ParameterStyle,
        explode: bool,
    },
    RequestBody {
        /// Selected media type; `None` when the body declares no content
        media_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    /// Argument key
    pub name: String,
    pub source: PropertySource,
    /// JSON schema shown to callers, including the synthesized description
    pub schema: Value,
}

impl PropertySchema {
    pub fn location(&self) -> Option<ParameterLocation> {
        match &self.source {
            PropertySource::Parameter { location, .. } => Some(*location),
            PropertySource::RequestBody { .. } => None,
        }
    }
}

/// Argument contract of one tool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputSchema {
    /// Parameter declaration order, `requestBody` last
    pub properties: Vec<PropertySchema>,
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn for_operation(operation: &Operation) -> Self {
        build_input_schema(&operation.parameters, operation.request_body.as_ref())
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// JSON-Schema rendering handed to callers.
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.schema.clone()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }

    /// Smallest argument object this schema accepts: every required property
    /// filled with its default, its first enum value, or a type placeholder.
    pub fn minimal_example(&self) -> Value {
        let example: Map<String, Value> = self
            .required
            .iter()
            .filter_map(|name| self.property(name))
            .map(|p| (p.name.clone(), example_value(&p.name, &p.schema, 0)))
            .collect();
        Value::Object(example)
    }

    /// Check an argument object against this schema.
    ///
    /// Keys that match no property are not an error here; the marshaler
    /// reports them as ignored.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), ArgumentError> {
        for name in &self.required {
            let source = self.property(name).map(|p| &p.source);
            let in_path = matches!(
                source,
                Some(PropertySource::Parameter {
                    location: ParameterLocation::Path,
                    ..
                })
            );
            // An empty path segment would change the route.
            let present = arguments
                .get(name)
                .is_some_and(|v| !v.is_null() && !(in_path && v.as_str() == Some("")));
            if present {
                continue;
            }
            return Err(match source {
                Some(PropertySource::Parameter {
                    wire_name,
                    location: ParameterLocation::Path,
                    ..
                }) => ArgumentError::MissingPathParameter(wire_name.clone()),
                _ => ArgumentError::MissingRequired(name.clone()),
            });
        }

        for property in &self.properties {
            let Some(value) = arguments.get(&property.name).filter(|v| !v.is_null()) else {
                continue;
            };
            check_value(&property.name, &property.schema, value)?;

            if let PropertySource::Parameter {
                wire_name,
                location,
                explode,
                ..
            } = &property.source
            {
                match location {
                    ParameterLocation::Header => {
                        check_header(&property.name, wire_name, value, *explode)?
                    }
                    ParameterLocation::Cookie => check_cookie(&property.name, value)?,
                    ParameterLocation::Path | ParameterLocation::Query => {}
                }
            }
        }

        Ok(())
    }
}

/// Build the argument contract for a parameter list and optional body.
pub fn build_input_schema(
    parameters: &[Parameter],
    request_body: Option<&RequestBodySpec>,
) -> InputSchema {
    let mut schema = InputSchema::default();

    for param in parameters {
        let mut name = param.name.clone();
        if name == REQUEST_BODY_PROPERTY || schema.property(&name).is_some() {
            name = format!("{}__{}", param.name, param.location);
        }

        if param.required {
            schema.required.push(name.clone());
        }
        schema.properties.push(PropertySchema {
            name,
            source: PropertySource::Parameter {
                wire_name: param.name.clone(),
                location: param.location,
                style: param.style,
                explode: param.explode,
            },
            schema: parameter_schema(param),
        });
    }

    if let Some(body) = request_body {
        if body.required {
            schema.required.push(REQUEST_BODY_PROPERTY.to_string());
        }
        schema.properties.push(PropertySchema {
            name: REQUEST_BODY_PROPERTY.to_string(),
            source: PropertySource::RequestBody {
                media_type: body.preferred().map(|m| m.media_type.clone()),
            },
            schema: body_schema(body),
        });
    }

    schema
}

fn parameter_schema(param: &Parameter) -> Value {
    let mut schema = match &param.schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let description = match param.description.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!(
            "{} parameter '{}' ({})",
            capitalize(&param.location.to_string()),
            param.name,
            if param.required { "required" } else { "optional" }
        ),
    };
    schema.insert("description".to_string(), Value::String(description));

    if param.deprecated {
        schema.insert("deprecated".to_string(), Value::Bool(true));
    }
    schema.insert(
        "x-parameter-location".to_string(),
        json!(param.location.to_string()),
    );
    schema.insert("x-parameter-style".to_string(), json!(param.style));
    schema.insert("x-parameter-explode".to_string(), json!(param.explode));

    Value::Object(schema)
}

fn body_schema(body: &RequestBodySpec) -> Value {
    let preferred = body.preferred();
    let encoding = preferred
        .map(|m| BodyEncoding::for_media_type(&m.media_type))
        .unwrap_or(BodyEncoding::Json);

    let mut schema = match (encoding, preferred) {
        (BodyEncoding::Json, Some(media)) => match &media.schema {
            Value::Object(map) if !map.is_empty() => map.clone(),
            _ => opaque_object(),
        },
        (BodyEncoding::Text | BodyEncoding::Binary, _) => {
            let mut map = Map::new();
            map.insert("type".to_string(), json!("string"));
            map
        }
        _ => opaque_object(),
    };

    let description = body
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match preferred {
            Some(media) => format!("Request body sent as {}", media.media_type),
            None => "Request body".to_string(),
        });
    schema.insert("description".to_string(), Value::String(description));

    if let Some(media) = preferred {
        schema.insert("x-media-type".to_string(), json!(media.media_type));
    }

    Value::Object(schema)
}

fn example_value(name: &str, schema: &Value, depth: usize) -> Value {
    if let Some(default) = schema.get("default") {
        return default.clone();
    }
    if let Some(first) = schema
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
    {
        return first.clone();
    }

    match SchemaType::of(schema) {
        Some(SchemaType::String) | None if schema.get("properties").is_none() => {
            json!(format!("<{name}>"))
        }
        Some(SchemaType::Integer) | Some(SchemaType::Number) => json!(1),
        Some(SchemaType::Boolean) => json!(false),
        Some(SchemaType::Array) => json!([]),
        _ => {
            let mut object = Map::new();
            if depth < 3 {
                let required = schema
                    .get("required")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for key in required.iter().filter_map(Value::as_str) {
                    let nested = schema
                        .get("properties")
                        .and_then(|props| props.get(key))
                        .cloned()
                        .unwrap_or(Value::Null);
                    object.insert(key.to_string(), example_value(key, &nested, depth + 1));
                }
            }
            Value::Object(object)
        }
    }
}

fn opaque_object() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("type".to_string(), json!("object"));
    map
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(expected: SchemaType, value: &Value) -> bool {
    match expected {
        SchemaType::String => value.is_string(),
        SchemaType::Number => value.is_number(),
        SchemaType::Integer => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::Array => value.is_array(),
        SchemaType::Object => value.is_object(),
    }
}

fn check_value(name: &str, schema: &Value, value: &Value) -> Result<(), ArgumentError> {
    if let Some(expected) = SchemaType::of(schema) {
        if !matches_type(expected, value) {
            return Err(ArgumentError::TypeMismatch {
                name: name.to_string(),
                expected: expected.as_str().to_string(),
                found: json_kind(value).to_string(),
            });
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.is_empty() && !allowed.contains(value) {
            return Err(ArgumentError::NotInEnum {
                name: name.to_string(),
                allowed: Value::Array(allowed.clone()).to_string(),
            });
        }
    }

    if let (Some(items), Value::Array(values)) = (schema.get("items"), value) {
        for (index, item) in values.iter().enumerate() {
            check_value(&format!("{name}[{index}]"), items, item)?;
        }
    }

    Ok(())
}

fn check_header(
    name: &str,
    wire_name: &str,
    value: &Value,
    explode: bool,
) -> Result<(), ArgumentError> {
    if reqwest::header::HeaderName::from_bytes(wire_name.as_bytes()).is_err() {
        return Err(ArgumentError::InvalidHeaderValue {
            name: name.to_string(),
            reason: format!("'{wire_name}' is not a valid header name"),
        });
    }
    let rendered = render_simple(value, explode);
    if reqwest::header::HeaderValue::from_str(&rendered).is_err() {
        return Err(ArgumentError::InvalidHeaderValue {
            name: name.to_string(),
            reason: "value contains characters not allowed in a header".to_string(),
        });
    }
    Ok(())
}

fn check_cookie(name: &str, value: &Value) -> Result<(), ArgumentError> {
    let rendered = render_simple(value, false);
    if rendered
        .chars()
        .any(|c| c == ';' || c == '"' || c.is_control())
    {
        return Err(ArgumentError::InvalidHeaderValue {
            name: name.to_string(),
            reason: "cookie values cannot contain ';', '\"' or control characters".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HttpMethod, MediaTypeSchema};

    fn param(name: &str, location: ParameterLocation, required: bool, schema: Value) -> Parameter {
        Parameter {
            name: name.to_string(),
            location,
            required,
            description: None,
            schema,
            style: ParameterStyle::Form,
            explode: false,
            deprecated: false,
        }
    }

    fn operation() -> Operation {
        Operation {
            id: "updateUser".to_string(),
            method: HttpMethod::Put,
            path: "/users/{id}".to_string(),
            parameters: vec![
                param("id", ParameterLocation::Path, true, json!({"type": "integer"})),
                param(
                    "status",
                    ParameterLocation::Query,
                    false,
                    json!({"type": "string", "enum": ["active", "disabled"], "default": "active"}),
                ),
                param("X-Request-Id", ParameterLocation::Header, false, json!({"type": "string"})),
            ],
            request_body: Some(RequestBodySpec {
                description: None,
                required: true,
                content: vec![MediaTypeSchema {
                    media_type: "application/json".to_string(),
                    schema: json!({"type": "object", "properties": {"name": {"type": "string"}}}),
                }],
            }),
            summary: None,
            description: None,
            tags: vec![],
            deprecated: false,
            security: vec![],
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_schema_shape_and_order() {
        let schema = InputSchema::for_operation(&operation());
        let names: Vec<_> = schema.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "status", "X-Request-Id", "requestBody"]);
        assert_eq!(schema.required, vec!["id", "requestBody"]);

        let json = schema.to_json();
        let keys: Vec<_> = json["properties"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["id", "status", "X-Request-Id", "requestBody"]);
        assert_eq!(json["properties"]["status"]["enum"], json!(["active", "disabled"]));
        assert_eq!(json["properties"]["status"]["default"], "active");
        assert_eq!(json["properties"]["id"]["description"], "Path parameter 'id' (required)");
        assert_eq!(json["properties"]["id"]["x-parameter-location"], "path");
        assert_eq!(json["properties"]["requestBody"]["properties"]["name"]["type"], "string");
    }

    #[test]
    fn test_missing_path_parameter() {
        let schema = InputSchema::for_operation(&operation());
        let err = schema.validate(&args(json!({"requestBody": {}}))).unwrap_err();
        assert_eq!(err, ArgumentError::MissingPathParameter("id".to_string()));
    }

    #[test]
    fn test_empty_path_parameter_is_missing() {
        let schema = build_input_schema(
            &[
                param("slug", ParameterLocation::Path, true, json!({"type": "string"})),
                param("q", ParameterLocation::Query, true, json!({"type": "string"})),
            ],
            None,
        );
        let err = schema.validate(&args(json!({"slug": "", "q": "x"}))).unwrap_err();
        assert_eq!(err, ArgumentError::MissingPathParameter("slug".to_string()));

        assert!(schema.validate(&args(json!({"slug": "a", "q": ""}))).is_ok());
    }

    #[test]
    fn test_missing_body() {
        let schema = InputSchema::for_operation(&operation());
        let err = schema.validate(&args(json!({"id": 1}))).unwrap_err();
        assert_eq!(err, ArgumentError::MissingRequired("requestBody".to_string()));
    }

    #[test]
    fn test_type_and_enum_checks() {
        let schema = InputSchema::for_operation(&operation());

        let err = schema
            .validate(&args(json!({"id": "abc", "requestBody": {}})))
            .unwrap_err();
        assert!(matches!(err, ArgumentError::TypeMismatch { ref name, .. } if name == "id"));

        let err = schema
            .validate(&args(json!({"id": 1, "status": "gone", "requestBody": {}})))
            .unwrap_err();
        assert!(matches!(err, ArgumentError::NotInEnum { ref name, .. } if name == "status"));

        assert!(
            schema
                .validate(&args(json!({"id": 1, "status": "active", "requestBody": {"name": "x"}})))
                .is_ok()
        );
    }

    #[test]
    fn test_header_value_must_be_sendable() {
        let schema = InputSchema::for_operation(&operation());
        let err = schema
            .validate(&args(json!({"id": 1, "X-Request-Id": "a\r\nb", "requestBody": {}})))
            .unwrap_err();
        assert!(matches!(err, ArgumentError::InvalidHeaderValue { .. }));
    }

    #[test]
    fn test_array_items_are_checked() {
        let schema = build_input_schema(
            &[param(
                "ids",
                ParameterLocation::Query,
                true,
                json!({"type": "array", "items": {"type": "integer"}}),
            )],
            None,
        );
        assert!(schema.validate(&args(json!({"ids": [1, 2]}))).is_ok());
        let err = schema.validate(&args(json!({"ids": [1, "x"]}))).unwrap_err();
        assert!(matches!(err, ArgumentError::TypeMismatch { ref name, .. } if name == "ids[1]"));
    }

    #[test]
    fn test_name_collision_gets_location_suffix() {
        let schema = build_input_schema(
            &[
                param("id", ParameterLocation::Path, true, json!({"type": "string"})),
                param("id", ParameterLocation::Query, false, json!({"type": "string"})),
            ],
            None,
        );
        assert!(schema.property("id").is_some());
        let query = schema.property("id__query").unwrap();
        assert!(matches!(
            &query.source,
            PropertySource::Parameter { wire_name, .. } if wire_name == "id"
        ));
    }

    #[test]
    fn test_minimal_example_passes_validation() {
        let schema = InputSchema::for_operation(&operation());
        let example = schema.minimal_example();
        assert_eq!(example, json!({"id": 1, "requestBody": {}}));
        assert!(schema.validate(example.as_object().unwrap()).is_ok());

        let with_enum = build_input_schema(
            &[param(
                "mode",
                ParameterLocation::Query,
                true,
                json!({"type": "string", "enum": ["fast", "slow"]}),
            )],
            None,
        );
        assert_eq!(with_enum.minimal_example(), json!({"mode": "fast"}));
    }

    #[test]
    fn test_example_fills_required_body_fields() {
        let body_schema = json!({
            "type": "object",
            "required": ["name", "age"],
            "properties": {"name": {"type": "string"}, "age": {"type": "integer"}, "tag": {"type": "string"}}
        });
        assert_eq!(
            example_value("requestBody", &body_schema, 0),
            json!({"name": "<name>", "age": 1})
        );
    }

    #[test]
    fn test_non_json_body_is_opaque() {
        let body = RequestBodySpec {
            description: Some("Upload".to_string()),
            required: false,
            content: vec![MediaTypeSchema {
                media_type: "multipart/form-data".to_string(),
                schema: json!({"type": "object", "properties": {"file": {"type": "string"}}}),
            }],
        };
        let schema = build_input_schema(&[], Some(&body));
        let body_schema = &schema.property(REQUEST_BODY_PROPERTY).unwrap().schema;
        assert_eq!(body_schema["type"], "object");
        assert!(body_schema.get("properties").is_none());
        assert_eq!(body_schema["x-media-type"], "multipart/form-data");
        assert!(schema.required.is_empty());
    }
}
