//! In-memory contract document model.
//!
//! Collections with set semantics (parameters, properties, required names,
//! enum values, responses) are stored sorted so that the canonical form is
//! independent of source ordering. Routes keep document order.

use crate::error::{ContractError, InvariantViolation};
use serde::Serialize;
use specsync_types::validate_resource_name;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// A loaded, validated contract. Immutable: edits produce a new document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractDocument {
    name: String,
    info: ContractInfo,
    routes: Vec<Route>,
    components: BTreeMap<String, Schema>,
    fingerprint: String,
}

impl ContractDocument {
    /// Validate invariants and compute the fingerprint.
    pub fn new(
        name: impl Into<String>,
        info: ContractInfo,
        routes: Vec<Route>,
        components: BTreeMap<String, Schema>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let invariant = |violation| ContractError::Invariant {
            name: name.clone(),
            violation,
        };
        validate_resource_name(&name).map_err(|e| invariant(e.into()))?;
        validate(&routes, &components).map_err(invariant)?;

        let fingerprint = crate::fingerprint::compute(&name, &info, &routes, &components)?;
        Ok(Self {
            name,
            info,
            routes,
            components,
            fingerprint,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &ContractInfo {
        &self.info
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.path == path)
    }

    pub fn components(&self) -> &BTreeMap<String, Schema> {
        &self.components
    }

    /// 64-char lowercase hex sha256 of the canonical form.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Every operation with its route path, in document order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, Method, &Operation)> {
        self.routes.iter().flat_map(|r| {
            r.operations
                .iter()
                .map(move |(m, op)| (r.path.as_str(), *m, op))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    /// Template string, e.g. `/users/{id}`.
    pub path: String,
    pub operations: BTreeMap<Method, Operation>,
}

/// HTTP method token. Declaration order is the canonical operation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Options,
        Method::Head,
        Method::Patch,
        Method::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
            Method::Options => "options",
            Method::Head => "head",
            Method::Patch => "patch",
            Method::Trace => "trace",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sorted by (location, name); unique by that pair.
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Keyed by status token (`200`, `4XX`, `default`).
    pub responses: BTreeMap<String, Response>,
}

impl Operation {
    pub fn parameter(&self, location: ParameterLocation, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.location == location && p.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterLocation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(ParameterLocation::Path),
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "cookie" => Ok(ParameterLocation::Cookie),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

impl Parameter {
    /// A default on the parameter or on its schema.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.schema.as_ref().is_some_and(|s| s.default.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Schema kind. `String` through `Boolean` (and `Any`) are the primitive
/// kinds; `Reference` points at a component schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Any,
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Reference,
}

impl SchemaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaKind::Any => "any",
            SchemaKind::String => "string",
            SchemaKind::Integer => "integer",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Object => "object",
            SchemaKind::Array => "array",
            SchemaKind::Reference => "reference",
        }
    }

    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            SchemaKind::Any
                | SchemaKind::String
                | SchemaKind::Integer
                | SchemaKind::Number
                | SchemaKind::Boolean
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub kind: SchemaKind,
    /// `$ref` target when `kind == Reference`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub required: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    pub constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Schema {
    pub fn of_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            reference: None,
            properties: BTreeMap::new(),
            required: BTreeSet::new(),
            items: None,
            constraints: Constraints::default(),
            description: None,
            example: None,
            default: None,
        }
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.contains(property)
    }
}

/// Validation bounds. `enum_values` is kept sorted and de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
}

/// Sort and de-duplicate enum values by their compact JSON text.
pub fn normalize_enum(values: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
    let mut keyed: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    for v in values {
        keyed.insert(v.to_string(), v);
    }
    keyed.into_values().collect()
}

fn validate(
    routes: &[Route],
    components: &BTreeMap<String, Schema>,
) -> Result<(), InvariantViolation> {
    let mut seen_paths = BTreeSet::new();
    let mut seen_ids: HashMap<&str, String> = HashMap::new();

    for route in routes {
        if !seen_paths.insert(route.path.as_str()) {
            return Err(InvariantViolation::DuplicateRoute {
                path: route.path.clone(),
            });
        }
        for (method, op) in &route.operations {
            let here = format!("{} {}", method.as_str().to_ascii_uppercase(), route.path);
            if let Some(first) = seen_ids.get(op.operation_id.as_str()) {
                return Err(InvariantViolation::DuplicateOperationId {
                    operation_id: op.operation_id.clone(),
                    first: first.clone(),
                    second: here,
                });
            }
            seen_ids.insert(op.operation_id.as_str(), here);

            let base = format!("routes.{}.operations.{}", route.path, method);
            let mut seen_params = BTreeSet::new();
            for p in &op.parameters {
                if !seen_params.insert((p.location, p.name.as_str())) {
                    return Err(InvariantViolation::DuplicateParameter {
                        path: base.clone(),
                        name: p.name.clone(),
                        location: p.location.to_string(),
                    });
                }
                if let Some(s) = &p.schema {
                    validate_schema(
                        s,
                        &format!("{base}.parameters.{}.{}", p.location, p.name),
                    )?;
                }
            }
            if let Some(body) = &op.request_body
                && let Some(s) = &body.schema
            {
                validate_schema(s, &format!("{base}.requestBody"))?;
            }
            for (status, resp) in &op.responses {
                if let Some(s) = &resp.schema {
                    validate_schema(s, &format!("{base}.responses.{status}"))?;
                }
            }
        }
    }

    for (name, schema) in components {
        validate_schema(schema, &format!("components.schemas.{name}"))?;
    }
    Ok(())
}

fn validate_schema(schema: &Schema, path: &str) -> Result<(), InvariantViolation> {
    if let Some(missing) = schema
        .required
        .iter()
        .find(|r| !schema.properties.contains_key(*r))
    {
        return Err(InvariantViolation::RequiredNotInProperties {
            path: path.to_string(),
            property: missing.clone(),
        });
    }
    for (name, prop) in &schema.properties {
        validate_schema(prop, &format!("{path}.properties.{name}"))?;
    }
    if let Some(items) = &schema.items {
        validate_schema(items, &format!("{path}.items"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(id: &str) -> Operation {
        Operation {
            operation_id: id.to_string(),
            summary: None,
            description: None,
            parameters: vec![],
            request_body: None,
            responses: BTreeMap::new(),
        }
    }

    fn route(path: &str, ops: Vec<(Method, Operation)>) -> Route {
        Route {
            path: path.to_string(),
            operations: ops.into_iter().collect(),
        }
    }

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!("GET".parse::<Method>(), Ok(Method::Get));
        assert_eq!("patch".parse::<Method>(), Ok(Method::Patch));
        assert!("fetch".parse::<Method>().is_err());
    }

    #[test]
    fn duplicate_operation_id_is_rejected() {
        let routes = vec![
            route("/a", vec![(Method::Get, op("same"))]),
            route("/b", vec![(Method::Post, op("same"))]),
        ];
        let err = ContractDocument::new("svc", ContractInfo::default(), routes, BTreeMap::new())
            .unwrap_err();
        match err {
            ContractError::Invariant {
                violation: InvariantViolation::DuplicateOperationId { first, second, .. },
                ..
            } => {
                assert_eq!(first, "GET /a");
                assert_eq!(second, "POST /b");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn required_must_be_declared() {
        let mut schema = Schema::of_kind(SchemaKind::Object);
        schema.required.insert("ghost".to_string());
        let mut components = BTreeMap::new();
        components.insert("User".to_string(), schema);
        let err = ContractDocument::new("svc", ContractInfo::default(), vec![], components)
            .unwrap_err();
        assert!(err.to_string().contains("components.schemas.User"));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn unsafe_name_is_rejected() {
        let err = ContractDocument::new("../etc", ContractInfo::default(), vec![], BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ContractError::Invariant { .. }));
    }

    #[test]
    fn enum_normalization_sorts_and_dedupes() {
        let v = normalize_enum(vec![
            serde_json::json!("b"),
            serde_json::json!("a"),
            serde_json::json!("b"),
        ]);
        assert_eq!(v, vec![serde_json::json!("a"), serde_json::json!("b")]);
    }
}
