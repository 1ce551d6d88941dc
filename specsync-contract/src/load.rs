//! Parse raw bytes into a validated [`ContractDocument`].

use crate::error::{ContractError, InvariantViolation};
use crate::model::{
    normalize_enum, Constraints, ContractDocument, ContractInfo, Method, Operation, Parameter,
    ParameterLocation, RequestBody, Response, Route, Schema, SchemaKind,
};
use crate::raw::{
    RawDocument, RawMediaType, RawOperation, RawParameter, RawRequestBody, RawResponse, RawSchema,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const JSON_MEDIA_TYPE: &str = "application/json";

/// Path-item keys that are accepted and ignored.
const IGNORED_PATH_ITEM_KEYS: &[&str] = &["summary", "description", "servers", "$ref"];

/// Load a contract from YAML or JSON bytes under the logical `name`.
///
/// Fails with [`ContractError::Parse`] for malformed input and
/// [`ContractError::Invariant`] when the document violates an invariant.
pub fn load(name: &str, bytes: &[u8]) -> Result<ContractDocument, ContractError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ContractError::parse(name, "document is empty"));
    }
    let raw: RawDocument =
        serde_yaml::from_slice(bytes).map_err(|e| ContractError::parse(name, e.to_string()))?;

    if let Some(found) = &raw.name
        && found != name
    {
        return Err(ContractError::Invariant {
            name: name.to_string(),
            violation: InvariantViolation::NameMismatch {
                expected: name.to_string(),
                found: found.clone(),
            },
        });
    }

    let lower = Lowering { name };
    let info = raw
        .info
        .map(|i| -> Result<ContractInfo, ContractError> {
            Ok(ContractInfo {
                title: lower.scalar(i.title, "info.title")?,
                version: lower.scalar(i.version, "info.version")?,
                description: lower.scalar(i.description, "info.description")?,
            })
        })
        .transpose()?
        .unwrap_or_default();

    let mut routes = Vec::with_capacity(raw.paths.len());
    for (key, item) in raw.paths {
        let path = lower.key_string(&key, "paths")?;
        if !path.starts_with('/') {
            return Err(lower.err(format!("paths.{path}: route path must start with '/'")));
        }
        routes.push(lower.route(path, item)?);
    }

    let mut components = BTreeMap::new();
    if let Some(c) = raw.components {
        for (schema_name, schema) in c.schemas {
            let at = format!("components.schemas.{schema_name}");
            components.insert(schema_name, lower.schema(schema, &at)?);
        }
    }

    let doc = ContractDocument::new(name, info, routes, components)?;
    debug!(
        name = %name,
        routes = doc.routes().len(),
        fingerprint = %doc.fingerprint(),
        "loaded contract"
    );
    Ok(doc)
}

struct Lowering<'a> {
    name: &'a str,
}

impl Lowering<'_> {
    fn err(&self, message: impl Into<String>) -> ContractError {
        ContractError::parse(self.name, message)
    }

    fn from_value<T: serde::de::DeserializeOwned>(
        &self,
        value: serde_yaml::Value,
        at: &str,
    ) -> Result<T, ContractError> {
        serde_yaml::from_value(value).map_err(|e| self.err(format!("{at}: {e}")))
    }

    fn key_string(&self, key: &serde_yaml::Value, at: &str) -> Result<String, ContractError> {
        match key {
            serde_yaml::Value::String(s) => Ok(s.clone()),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            other => Err(self.err(format!("{at}: unsupported key {other:?}"))),
        }
    }

    fn scalar(
        &self,
        value: Option<serde_yaml::Value>,
        at: &str,
    ) -> Result<Option<String>, ContractError> {
        match value {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
            Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
            Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(self.err(format!("{at}: expected a scalar"))),
        }
    }

    fn route(&self, path: String, item: serde_yaml::Value) -> Result<Route, ContractError> {
        let at = format!("paths.{path}");
        let serde_yaml::Value::Mapping(item) = item else {
            return Err(self.err(format!("{at}: expected a mapping of methods")));
        };

        let mut shared_params: Vec<RawParameter> = Vec::new();
        let mut raw_ops: Vec<(Method, RawOperation)> = Vec::new();
        for (key, value) in item {
            let key = self.key_string(&key, &at)?;
            if key == "parameters" {
                shared_params = self.from_value(value, &format!("{at}.parameters"))?;
            } else if let Ok(method) = key.parse::<Method>() {
                if raw_ops.iter().any(|(m, _)| *m == method) {
                    return Err(self.err(format!("{at}: duplicate method {key}")));
                }
                raw_ops.push((method, self.from_value(value, &format!("{at}.{key}"))?));
            } else if IGNORED_PATH_ITEM_KEYS.contains(&key.as_str()) || key.starts_with("x-") {
                continue;
            } else {
                return Err(self.err(format!("{at}: unknown method {key:?}")));
            }
        }

        let mut operations = BTreeMap::new();
        for (method, raw) in raw_ops {
            let op = self.operation(&path, method, raw, &shared_params)?;
            operations.insert(method, op);
        }
        Ok(Route { path, operations })
    }

    fn operation(
        &self,
        path: &str,
        method: Method,
        raw: RawOperation,
        shared_params: &[RawParameter],
    ) -> Result<Operation, ContractError> {
        let at = format!("paths.{path}.{method}");

        // Path-level parameters first; an operation-level parameter with the
        // same name and location replaces it.
        let mut params: BTreeMap<(ParameterLocation, String), Parameter> = BTreeMap::new();
        for raw_param in shared_params {
            let p = self.parameter(raw_param.clone(), &format!("{at}.parameters"))?;
            params.insert((p.location, p.name.clone()), p);
        }
        let mut own_keys = BTreeSet::new();
        for raw_param in raw.parameters {
            let p = self.parameter(raw_param, &format!("{at}.parameters"))?;
            let key = (p.location, p.name.clone());
            if !own_keys.insert(key.clone()) {
                return Err(ContractError::Invariant {
                    name: self.name.to_string(),
                    violation: InvariantViolation::DuplicateParameter {
                        path: format!("routes.{path}.operations.{method}"),
                        name: p.name,
                        location: p.location.to_string(),
                    },
                });
            }
            params.insert(key, p);
        }

        let request_body = raw
            .request_body
            .map(|b| self.request_body(b, &format!("{at}.requestBody")))
            .transpose()?;

        let mut responses = BTreeMap::new();
        for (key, value) in raw.responses {
            let status = self.key_string(&key, &format!("{at}.responses"))?;
            let raw_resp: RawResponse =
                self.from_value(value, &format!("{at}.responses.{status}"))?;
            let resp_at = format!("{at}.responses.{status}");
            let schema = self.media_schema(raw_resp.content, raw_resp.schema, &resp_at)?;
            responses.insert(
                status,
                Response {
                    description: raw_resp.description,
                    schema,
                },
            );
        }

        Ok(Operation {
            operation_id: raw
                .operation_id
                .unwrap_or_else(|| derive_operation_id(method, path)),
            summary: raw.summary,
            description: raw.description,
            parameters: params.into_values().collect(),
            request_body,
            responses,
        })
    }

    fn parameter(&self, raw: RawParameter, at: &str) -> Result<Parameter, ContractError> {
        if raw.name.is_empty() {
            return Err(self.err(format!("{at}: parameter name is empty")));
        }
        let location: ParameterLocation = raw.location.parse().map_err(|_| {
            self.err(format!(
                "{at}.{}: unknown parameter location {:?}",
                raw.name, raw.location
            ))
        })?;
        let schema_at = format!("{at}.{}.{}", location, raw.name);
        Ok(Parameter {
            required: location == ParameterLocation::Path || raw.required.unwrap_or(false),
            schema: raw
                .schema
                .map(|s| self.schema(s, &schema_at))
                .transpose()?,
            name: raw.name,
            location,
            description: raw.description,
            default: raw.default,
            example: raw.example,
        })
    }

    fn request_body(&self, raw: RawRequestBody, at: &str) -> Result<RequestBody, ContractError> {
        Ok(RequestBody {
            required: raw.required.unwrap_or(false),
            description: raw.description,
            schema: self.media_schema(raw.content, raw.schema, at)?,
        })
    }

    /// Schema from `content` (JSON media type preferred, else the first
    /// entry) or from the `schema` shorthand.
    fn media_schema(
        &self,
        content: Option<serde_yaml::Mapping>,
        shorthand: Option<RawSchema>,
        at: &str,
    ) -> Result<Option<Schema>, ContractError> {
        let raw = match content {
            Some(mut content) => {
                let key = serde_yaml::Value::String(JSON_MEDIA_TYPE.to_string());
                let picked = match content.remove(&key) {
                    Some(v) => Some(v),
                    None => content.into_iter().next().map(|(_, v)| v),
                };
                match picked {
                    Some(v) => {
                        let media: RawMediaType = self.from_value(v, &format!("{at}.content"))?;
                        media.schema
                    }
                    None => None,
                }
            }
            None => shorthand,
        };
        raw.map(|s| self.schema(s, at)).transpose()
    }

    fn schema(&self, raw: RawSchema, at: &str) -> Result<Schema, ContractError> {
        let kind = if raw.reference.is_some() {
            SchemaKind::Reference
        } else {
            match raw.type_.as_deref() {
                None if raw.properties.is_some() => SchemaKind::Object,
                None if raw.items.is_some() => SchemaKind::Array,
                None => SchemaKind::Any,
                Some("string") => SchemaKind::String,
                Some("integer") => SchemaKind::Integer,
                Some("number") => SchemaKind::Number,
                Some("boolean") => SchemaKind::Boolean,
                Some("object") => SchemaKind::Object,
                Some("array") => SchemaKind::Array,
                Some(other) => {
                    return Err(self.err(format!("{at}: unknown schema type {other:?}")));
                }
            }
        };

        let mut properties = BTreeMap::new();
        for (prop, schema) in raw.properties.unwrap_or_default() {
            let prop_at = format!("{at}.properties.{prop}");
            properties.insert(prop, self.schema(schema, &prop_at)?);
        }
        let items = raw
            .items
            .map(|i| self.schema(*i, &format!("{at}.items")).map(Box::new))
            .transpose()?;

        Ok(Schema {
            kind,
            reference: raw.reference,
            properties,
            required: raw.required.unwrap_or_default().into_iter().collect(),
            items,
            constraints: Constraints {
                format: raw.format,
                minimum: raw.minimum,
                maximum: raw.maximum,
                min_length: raw.min_length,
                max_length: raw.max_length,
                pattern: raw.pattern,
                min_items: raw.min_items,
                max_items: raw.max_items,
                enum_values: raw.enum_values.map(normalize_enum),
                nullable: raw.nullable.unwrap_or(false),
            },
            description: raw.description,
            example: raw.example,
            default: raw.default,
        })
    }
}

/// `get /users/{id}` -> `get_users_id`.
fn derive_operation_id(method: Method, path: &str) -> String {
    let mut slug = String::new();
    for c in path.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        format!("{method}_root")
    } else {
        format!("{method}_{slug}")
    }
}
