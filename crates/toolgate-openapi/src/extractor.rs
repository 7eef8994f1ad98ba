//! Operation extraction.
//!
//! Walks the paths of a parsed OpenAPI document and produces a flat,
//! deterministically ordered list of [`Operation`] records. Structural defects
//! are fatal in strict mode; in lenient mode they are logged and repaired
//! (synthesized ids, suffixed duplicates, synthesized path parameters).

use crate::auth::SecurityScheme;
use crate::error::{OpenApiError, Result, SpecError};
use crate::types::{
    HttpMethod, MediaTypeSchema, Operation, Parameter, ParameterLocation, ParameterStyle,
    RequestBodySpec, SchemaType, SecurityRequirement, path_placeholders,
};
use openapiv3::{
    Components, OpenAPI, ParameterSchemaOrContent, PathStyle, QueryStyle, ReferenceOr, Schema,
};
use regex::Regex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// How many `$ref` hops are followed before a reference counts as unresolved.
const MAX_REF_DEPTH: usize = 16;

/// Tolerance for spec defects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMode {
    /// Any defect fails extraction. Used for validation.
    Strict,
    /// Defects are repaired and logged. Used for tool generation.
    #[default]
    Lenient,
}

/// One method+path pair before normalization.
struct RawOperation<'a> {
    path: &'a str,
    method: HttpMethod,
    operation: &'a openapiv3::Operation,
    shared_parameters: &'a [ReferenceOr<openapiv3::Parameter>],
}

/// Extracts normalized operations from a document.
pub struct OperationExtractor<'a> {
    spec: &'a OpenAPI,
    mode: ExtractMode,
}

impl<'a> OperationExtractor<'a> {
    pub fn new(spec: &'a OpenAPI, mode: ExtractMode) -> Self {
        Self { spec, mode }
    }

    pub fn strict(spec: &'a OpenAPI) -> Self {
        Self::new(spec, ExtractMode::Strict)
    }

    pub fn lenient(spec: &'a OpenAPI) -> Self {
        Self::new(spec, ExtractMode::Lenient)
    }

    /// Extract every operation, ordered by path then method precedence.
    pub fn extract(&self) -> Result<Vec<Operation>> {
        let mut defects = Vec::new();
        let operations = self.walk(&mut defects);

        if self.mode == ExtractMode::Strict {
            if let Some(first) = defects.into_iter().next() {
                return Err(OpenApiError::Spec(first));
            }
        }

        debug!(count = operations.len(), "Extracted operations");
        Ok(operations)
    }

    /// Like [`extract`](Self::extract), keeping only operations whose summary or
    /// description matches `include` (when given) and does not match `exclude`
    /// (when given).
    ///
    /// Ids are assigned over the whole document before filtering, so a tool
    /// keeps its name regardless of which filters are active.
    pub fn extract_filtered(
        &self,
        include: Option<&Regex>,
        exclude: Option<&Regex>,
    ) -> Result<Vec<Operation>> {
        let operations = self
            .extract()?
            .into_iter()
            .filter(|op| {
                let text = op.filter_text();
                include.is_none_or(|re| re.is_match(&text))
                    && !exclude.is_some_and(|re| re.is_match(&text))
            })
            .collect::<Vec<_>>();

        debug!(count = operations.len(), "Operations kept after filtering");
        Ok(operations)
    }

    /// Every structural defect of the document, regardless of mode.
    pub fn defects(&self) -> Vec<SpecError> {
        let mut defects = Vec::new();
        self.walk(&mut defects);
        defects
    }

    /// Security schemes declared under `components.securitySchemes`.
    pub fn security_schemes(&self) -> Result<BTreeMap<String, SecurityScheme>> {
        let mut schemes = BTreeMap::new();
        let Some(components) = &self.spec.components else {
            return Ok(schemes);
        };

        for (name, scheme_ref) in &components.security_schemes {
            match self.resolve(scheme_ref, "securitySchemes", |c, n| {
                c.security_schemes.get(n)
            }) {
                Ok(scheme) => {
                    schemes.insert(name.clone(), SecurityScheme::from_openapi(scheme));
                }
                Err(err) => self.on_defect(err)?,
            }
        }
        Ok(schemes)
    }

    fn on_defect(&self, err: SpecError) -> Result<()> {
        match self.mode {
            ExtractMode::Strict => Err(err.into()),
            ExtractMode::Lenient => {
                warn!("Skipping spec element: {}", err);
                Ok(())
            }
        }
    }

    fn walk(&self, defects: &mut Vec<SpecError>) -> Vec<Operation> {
        let mut raw = Vec::new();

        for (path, path_item_ref) in &self.spec.paths.paths {
            let path_item = match path_item_ref {
                ReferenceOr::Item(item) => item,
                ReferenceOr::Reference { reference } => {
                    record(defects, SpecError::UnresolvedReference(reference.clone()));
                    continue;
                }
            };

            let methods = [
                (HttpMethod::Get, &path_item.get),
                (HttpMethod::Put, &path_item.put),
                (HttpMethod::Post, &path_item.post),
                (HttpMethod::Delete, &path_item.delete),
                (HttpMethod::Options, &path_item.options),
                (HttpMethod::Head, &path_item.head),
                (HttpMethod::Patch, &path_item.patch),
                (HttpMethod::Trace, &path_item.trace),
            ];

            for (method, operation) in methods {
                if let Some(operation) = operation {
                    raw.push(RawOperation {
                        path: path.as_str(),
                        method,
                        operation,
                        shared_parameters: &path_item.parameters,
                    });
                }
            }
        }

        raw.sort_by(|a, b| a.path.cmp(b.path).then(a.method.cmp(&b.method)));

        let mut used_ids = HashSet::new();
        raw.iter()
            .map(|op| {
                let id = self.assign_id(op, &mut used_ids, defects);
                self.normalize(id, op, defects)
            })
            .collect()
    }

    fn assign_id(
        &self,
        raw: &RawOperation<'a>,
        used: &mut HashSet<String>,
        defects: &mut Vec<SpecError>,
    ) -> String {
        let declared = raw
            .operation
            .operation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let base = match declared {
            Some(id) => id.to_string(),
            None => {
                record(
                    defects,
                    SpecError::MissingOperationId {
                        method: raw.method,
                        path: raw.path.to_string(),
                    },
                );
                synthesize_operation_id(raw.method, raw.path)
            }
        };

        if used.insert(base.clone()) {
            return base;
        }

        record(defects, SpecError::DuplicateOperationId(base.clone()));
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn normalize(
        &self,
        id: String,
        raw: &RawOperation<'a>,
        defects: &mut Vec<SpecError>,
    ) -> Operation {
        let parameters = self.collect_parameters(&id, raw, defects);
        let request_body = raw
            .operation
            .request_body
            .as_ref()
            .and_then(|body| self.convert_request_body(body, defects));

        let security = raw
            .operation
            .security
            .as_ref()
            .or(self.spec.security.as_ref())
            .map(|requirements| {
                requirements
                    .iter()
                    .flat_map(|req| {
                        req.iter().map(|(name, scopes)| SecurityRequirement {
                            scheme_name: name.clone(),
                            scopes: scopes.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Operation {
            id,
            method: raw.method,
            path: raw.path.to_string(),
            parameters,
            request_body,
            summary: raw.operation.summary.clone(),
            description: raw.operation.description.clone(),
            tags: raw.operation.tags.clone(),
            deprecated: raw.operation.deprecated,
            security,
        }
    }

    fn collect_parameters(
        &self,
        operation_id: &str,
        raw: &RawOperation<'a>,
        defects: &mut Vec<SpecError>,
    ) -> Vec<Parameter> {
        let mut merged: Vec<Parameter> = Vec::new();

        // Path-level first; operation-level entries replace them in place.
        for param_ref in raw.shared_parameters.iter().chain(&raw.operation.parameters) {
            let Some(param) = self.convert_parameter(operation_id, param_ref, defects) else {
                continue;
            };
            match merged
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => merged.push(param),
            }
        }

        let placeholders = path_placeholders(raw.path);

        merged.retain(|p| {
            if p.location == ParameterLocation::Path && !placeholders.contains(&p.name) {
                record(
                    defects,
                    SpecError::MalformedParameter {
                        operation_id: operation_id.to_string(),
                        name: p.name.clone(),
                        reason: "declared in path but the path template has no such placeholder"
                            .to_string(),
                    },
                );
                false
            } else {
                true
            }
        });

        for name in placeholders {
            if merged
                .iter()
                .any(|p| p.location == ParameterLocation::Path && p.name == name)
            {
                continue;
            }
            record(
                defects,
                SpecError::UndeclaredPathParameter {
                    operation_id: operation_id.to_string(),
                    name: name.clone(),
                },
            );
            merged.push(Parameter {
                name,
                location: ParameterLocation::Path,
                required: true,
                description: None,
                schema: json!({"type": "string"}),
                style: ParameterStyle::Simple,
                explode: false,
                deprecated: false,
            });
        }

        merged
    }

    fn convert_parameter(
        &self,
        operation_id: &str,
        param_ref: &'a ReferenceOr<openapiv3::Parameter>,
        defects: &mut Vec<SpecError>,
    ) -> Option<Parameter> {
        let param = match self.resolve(param_ref, "parameters", |c, n| c.parameters.get(n)) {
            Ok(param) => param,
            Err(err) => {
                record(defects, err);
                return None;
            }
        };

        let (data, location, style) = match param {
            openapiv3::Parameter::Query {
                parameter_data,
                style,
                ..
            } => {
                let style = match style {
                    QueryStyle::Form => ParameterStyle::Form,
                    QueryStyle::SpaceDelimited => ParameterStyle::SpaceDelimited,
                    QueryStyle::PipeDelimited => ParameterStyle::PipeDelimited,
                    QueryStyle::DeepObject => ParameterStyle::DeepObject,
                };
                (parameter_data, ParameterLocation::Query, style)
            }
            openapiv3::Parameter::Header { parameter_data, .. } => {
                (parameter_data, ParameterLocation::Header, ParameterStyle::Simple)
            }
            openapiv3::Parameter::Path {
                parameter_data,
                style,
            } => {
                let style = match style {
                    PathStyle::Matrix => ParameterStyle::Matrix,
                    PathStyle::Label => ParameterStyle::Label,
                    PathStyle::Simple => ParameterStyle::Simple,
                };
                (parameter_data, ParameterLocation::Path, style)
            }
            openapiv3::Parameter::Cookie { parameter_data, .. } => {
                (parameter_data, ParameterLocation::Cookie, ParameterStyle::Form)
            }
        };

        let malformed = |reason: &str| SpecError::MalformedParameter {
            operation_id: operation_id.to_string(),
            name: data.name.clone(),
            reason: reason.to_string(),
        };

        if data.name.trim().is_empty() {
            record(defects, malformed("parameter name is empty"));
            return None;
        }

        let schema_ref = match &data.format {
            ParameterSchemaOrContent::Schema(schema_ref) => Some(schema_ref),
            ParameterSchemaOrContent::Content(content) => {
                content.values().next().and_then(|media| media.schema.as_ref())
            }
        };
        let schema = match schema_ref {
            Some(schema_ref) => match self.schema_value(schema_ref) {
                Ok(schema) => schema,
                Err(err) => {
                    record(defects, err);
                    return None;
                }
            },
            None => json!({"type": "string"}),
        };

        if style == ParameterStyle::DeepObject
            && SchemaType::of(&schema).is_some_and(|t| t != SchemaType::Object)
        {
            record(defects, malformed("deepObject style requires an object schema"));
            return None;
        }

        Some(Parameter {
            name: data.name.clone(),
            location,
            required: data.required || location == ParameterLocation::Path,
            description: data.description.clone(),
            schema,
            style,
            explode: data.explode.unwrap_or(false),
            deprecated: data.deprecated.unwrap_or(false),
        })
    }

    fn convert_request_body(
        &self,
        body_ref: &'a ReferenceOr<openapiv3::RequestBody>,
        defects: &mut Vec<SpecError>,
    ) -> Option<RequestBodySpec> {
        let body = match self.resolve(body_ref, "requestBodies", |c, n| c.request_bodies.get(n)) {
            Ok(body) => body,
            Err(err) => {
                record(defects, err);
                return None;
            }
        };

        let mut content = Vec::new();
        for (media_type, media) in &body.content {
            let schema = match &media.schema {
                Some(schema_ref) => match self.schema_value(schema_ref) {
                    Ok(schema) => schema,
                    Err(err) => {
                        record(defects, err);
                        json!({"type": "object"})
                    }
                },
                None => json!({}),
            };
            content.push(MediaTypeSchema {
                media_type: media_type.clone(),
                schema,
            });
        }

        Some(RequestBodySpec {
            description: body.description.clone(),
            required: body.required,
            content,
        })
    }

    fn schema_value(
        &self,
        schema_ref: &'a ReferenceOr<Schema>,
    ) -> std::result::Result<Value, SpecError> {
        let schema = self.resolve(schema_ref, "schemas", |c, n| c.schemas.get(n))?;
        let mut value = serde_json::to_value(schema).unwrap_or(Value::Object(Default::default()));
        self.inline_refs(&mut value, &mut Vec::new())?;
        Ok(value)
    }

    /// Replace nested schema references with their targets so the published
    /// schema is self-contained. A reference back to a schema that is already
    /// being expanded (a recursive type) becomes an unconstrained `{}`.
    fn inline_refs(
        &self,
        value: &mut Value,
        expanding: &mut Vec<String>,
    ) -> std::result::Result<(), SpecError> {
        if let Some(reference) = value.get("$ref").and_then(Value::as_str).map(str::to_string) {
            if expanding.contains(&reference) || expanding.len() >= MAX_REF_DEPTH {
                *value = json!({});
                return Ok(());
            }
            let schema = self.schema_by_reference(&reference)?;
            *value = serde_json::to_value(schema).unwrap_or(Value::Object(Default::default()));
            expanding.push(reference);
            let result = self.inline_refs(value, expanding);
            expanding.pop();
            return result;
        }

        let Value::Object(map) = value else {
            return Ok(());
        };
        for key in ["items", "additionalProperties", "not"] {
            if let Some(child) = map.get_mut(key).filter(|c| c.is_object()) {
                self.inline_refs(child, expanding)?;
            }
        }
        if let Some(Value::Object(properties)) = map.get_mut("properties") {
            for child in properties.values_mut() {
                self.inline_refs(child, expanding)?;
            }
        }
        for key in ["allOf", "oneOf", "anyOf"] {
            if let Some(Value::Array(children)) = map.get_mut(key) {
                for child in children {
                    self.inline_refs(child, expanding)?;
                }
            }
        }
        Ok(())
    }

    fn schema_by_reference(&self, reference: &str) -> std::result::Result<&'a Schema, SpecError> {
        let unresolved = || SpecError::UnresolvedReference(reference.to_string());
        let name = reference
            .strip_prefix("#/components/schemas/")
            .ok_or_else(unresolved)?;
        let components = self.spec.components.as_ref().ok_or_else(unresolved)?;
        let item = components.schemas.get(name).ok_or_else(unresolved)?;
        self.resolve(item, "schemas", |c, n| c.schemas.get(n))
    }

    /// Follow local `#/components/{section}/Name` references.
    fn resolve<T>(
        &self,
        item: &'a ReferenceOr<T>,
        section: &str,
        lookup: impl Fn(&'a Components, &str) -> Option<&'a ReferenceOr<T>>,
    ) -> std::result::Result<&'a T, SpecError> {
        let prefix = format!("#/components/{section}/");
        let mut current = item;

        for _ in 0..MAX_REF_DEPTH {
            match current {
                ReferenceOr::Item(value) => return Ok(value),
                ReferenceOr::Reference { reference } => {
                    let unresolved = || SpecError::UnresolvedReference(reference.clone());
                    let name = reference.strip_prefix(prefix.as_str()).ok_or_else(unresolved)?;
                    let components = self.spec.components.as_ref().ok_or_else(unresolved)?;
                    current = lookup(components, name).ok_or_else(unresolved)?;
                }
            }
        }

        let reference = match item {
            ReferenceOr::Reference { reference } => reference.clone(),
            ReferenceOr::Item(_) => String::new(),
        };
        Err(SpecError::UnresolvedReference(reference))
    }
}

fn record(defects: &mut Vec<SpecError>, err: SpecError) {
    warn!("{}", err);
    defects.push(err);
}

/// Id for an operation without one, e.g. `GET /users/{id}` -> `GET_users_id`.
pub fn synthesize_operation_id(method: HttpMethod, path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.chars()
                .filter(|c| *c != '{' && *c != '}')
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect()
        })
        .collect();

    if segments.is_empty() {
        format!("{method}_root")
    } else {
        format!("{method}_{}", segments.join("_"))
    }
}
