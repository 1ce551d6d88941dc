//! Canonical YAML output accepted by [`crate::load`].

use crate::error::ContractError;
use crate::model::{
    ContractDocument, Operation, Parameter, RequestBody, Response, Schema, SchemaKind,
};
use crate::raw::{
    RawComponents, RawDocument, RawInfo, RawMediaType, RawOperation, RawParameter,
    RawRequestBody, RawResponse, RawSchema,
};

const OPENAPI_VERSION: &str = "3.0.3";
const JSON_MEDIA_TYPE: &str = "application/json";

/// Serialize a document to canonical YAML. `load(name, &serialize(doc)?)`
/// yields a document equal to `doc`.
pub fn serialize(doc: &ContractDocument) -> Result<Vec<u8>, ContractError> {
    let err = |e: serde_yaml::Error| ContractError::Serialize {
        name: doc.name().to_string(),
        message: e.to_string(),
    };

    let mut paths = serde_yaml::Mapping::new();
    for route in doc.routes() {
        let mut item = serde_yaml::Mapping::new();
        for (method, op) in &route.operations {
            let raw = serde_yaml::to_value(raw_operation(op)?).map_err(err)?;
            item.insert(method.as_str().into(), raw);
        }
        paths.insert(route.path.clone().into(), serde_yaml::Value::Mapping(item));
    }

    let info = doc.info();
    let text = |s: &Option<String>| s.clone().map(serde_yaml::Value::String);
    let raw_info = RawInfo {
        title: text(&info.title),
        version: text(&info.version),
        description: text(&info.description),
    };
    let has_info = raw_info.title.is_some()
        || raw_info.version.is_some()
        || raw_info.description.is_some();

    let raw = RawDocument {
        openapi: Some(OPENAPI_VERSION.into()),
        name: Some(doc.name().to_string()),
        info: has_info.then_some(raw_info),
        paths,
        components: (!doc.components().is_empty()).then(|| RawComponents {
            schemas: doc
                .components()
                .iter()
                .map(|(k, v)| (k.clone(), raw_schema(v)))
                .collect(),
        }),
    };

    serde_yaml::to_string(&raw)
        .map(String::into_bytes)
        .map_err(err)
}

fn raw_operation(op: &Operation) -> Result<RawOperation, ContractError> {
    let err = |e: serde_yaml::Error| ContractError::Serialize {
        name: op.operation_id.clone(),
        message: e.to_string(),
    };
    let mut responses = serde_yaml::Mapping::new();
    for (status, resp) in &op.responses {
        let value = serde_yaml::to_value(raw_response(resp).map_err(err)?).map_err(err)?;
        responses.insert(status.clone().into(), value);
    }
    Ok(RawOperation {
        operation_id: Some(op.operation_id.clone()),
        summary: op.summary.clone(),
        description: op.description.clone(),
        parameters: op.parameters.iter().map(raw_parameter).collect(),
        request_body: op
            .request_body
            .as_ref()
            .map(raw_request_body)
            .transpose()
            .map_err(err)?,
        responses,
    })
}

fn raw_parameter(p: &Parameter) -> RawParameter {
    RawParameter {
        name: p.name.clone(),
        location: p.location.as_str().to_string(),
        required: Some(p.required),
        description: p.description.clone(),
        schema: p.schema.as_ref().map(raw_schema),
        default: p.default.clone(),
        example: p.example.clone(),
    }
}

fn raw_request_body(b: &RequestBody) -> Result<RawRequestBody, serde_yaml::Error> {
    Ok(RawRequestBody {
        required: Some(b.required),
        description: b.description.clone(),
        content: b.schema.as_ref().map(json_content).transpose()?,
        schema: None,
    })
}

fn raw_response(r: &Response) -> Result<RawResponse, serde_yaml::Error> {
    Ok(RawResponse {
        description: r.description.clone(),
        content: r.schema.as_ref().map(json_content).transpose()?,
        schema: None,
    })
}

fn json_content(schema: &Schema) -> Result<serde_yaml::Mapping, serde_yaml::Error> {
    let media = RawMediaType {
        schema: Some(raw_schema(schema)),
    };
    let mut content = serde_yaml::Mapping::new();
    content.insert(JSON_MEDIA_TYPE.into(), serde_yaml::to_value(media)?);
    Ok(content)
}

fn raw_schema(s: &Schema) -> RawSchema {
    let type_ = match s.kind {
        SchemaKind::Any | SchemaKind::Reference => None,
        other => Some(other.as_str().to_string()),
    };
    let c = &s.constraints;
    RawSchema {
        type_,
        reference: s.reference.clone(),
        format: c.format.clone(),
        properties: (!s.properties.is_empty()).then(|| {
            s.properties
                .iter()
                .map(|(k, v)| (k.clone(), raw_schema(v)))
                .collect()
        }),
        required: (!s.required.is_empty()).then(|| s.required.iter().cloned().collect()),
        items: s.items.as_ref().map(|i| Box::new(raw_schema(i))),
        description: s.description.clone(),
        example: s.example.clone(),
        default: s.default.clone(),
        enum_values: c.enum_values.clone(),
        minimum: c.minimum,
        maximum: c.maximum,
        min_length: c.min_length,
        max_length: c.max_length,
        pattern: c.pattern.clone(),
        min_items: c.min_items,
        max_items: c.max_items,
        nullable: c.nullable.then_some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load;
    use pretty_assertions::assert_eq;

    const SRC: &str = r#"
info: {title: Orders, version: "3"}
paths:
  /orders/{id}:
    get:
      operationId: getOrder
      description: Fetch one order
      parameters:
        - {name: id, in: path, schema: {type: string, pattern: "^[a-z]+$"}}
        - {name: expand, in: query, schema: {type: boolean}, default: false}
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                type: object
                required: [id]
                properties:
                  id: {type: string}
                  total: {type: number, minimum: 0, nullable: true}
                  lines: {type: array, items: {$ref: '#/components/schemas/Line'}, maxItems: 50}
        '404': {description: missing}
components:
  schemas:
    Line:
      type: object
      properties:
        sku: {type: string, example: A-1}
        qty: {type: integer, enum: [3, 1, 2]}
"#;

    #[test]
    fn round_trip_is_lossless() {
        let doc = load("orders", SRC.as_bytes()).unwrap();
        let bytes = serialize(&doc).unwrap();
        let again = load("orders", &bytes).unwrap();
        assert_eq!(again, doc);
        assert_eq!(again.fingerprint(), doc.fingerprint());
    }

    #[test]
    fn output_is_stable() {
        let doc = load("orders", SRC.as_bytes()).unwrap();
        let once = serialize(&doc).unwrap();
        let twice = serialize(&load("orders", &once).unwrap()).unwrap();
        assert_eq!(String::from_utf8(once).unwrap(), String::from_utf8(twice).unwrap());
    }

    #[test]
    fn output_embeds_the_resource_name() {
        let doc = load("orders", SRC.as_bytes()).unwrap();
        let text = String::from_utf8(serialize(&doc).unwrap()).unwrap();
        assert!(text.contains("name: orders"));
        assert!(load("other", text.as_bytes()).is_err());
    }
}
