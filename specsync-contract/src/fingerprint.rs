//! Canonical content fingerprint.

use crate::error::ContractError;
use crate::model::{ContractDocument, ContractInfo, Route, Schema};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct CanonicalView<'a> {
    name: &'a str,
    info: &'a ContractInfo,
    routes: &'a [Route],
    components: &'a BTreeMap<String, Schema>,
}

pub(crate) fn compute(
    name: &str,
    info: &ContractInfo,
    routes: &[Route],
    components: &BTreeMap<String, Schema>,
) -> Result<String, ContractError> {
    let view = CanonicalView {
        name,
        info,
        routes,
        components,
    };
    let err = |e: serde_json::Error| ContractError::Serialize {
        name: name.to_string(),
        message: format!("canonical form: {e}"),
    };
    let value = serde_json::to_value(&view).map_err(err)?;
    specsync_hash::canonical_json_sha256(&value).map_err(err)
}

/// Recompute the 256-bit digest (lowercase hex) of a document's canonical
/// form. Key order and whitespace of the source text do not contribute; set
/// order never contributes; route order does.
pub fn fingerprint(doc: &ContractDocument) -> Result<String, ContractError> {
    compute(doc.name(), doc.info(), doc.routes(), doc.components())
}
