//! Artifact generation: the files a sync writes for one contract version.

use anyhow::Context;
use serde::Serialize;
use specsync_contract::ContractDocument;
use specsync_store::ArtifactSet;
use specsync_types::version::Version;

/// Canonical snapshot the serving layer loads.
pub const CONTRACT_FILE: &str = "contract.yaml";

/// Route table manifest.
pub const ROUTES_FILE: &str = "routes.json";

pub const ROUTES_SCHEMA_V1: &str = "specsync.routes.v1";

#[derive(Debug, Serialize)]
struct RouteManifest<'a> {
    schema: &'static str,
    name: &'a str,
    version: Version,
    fingerprint: &'a str,
    routes: Vec<RouteEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct RouteEntry<'a> {
    method: String,
    path: &'a str,
    operation_id: &'a str,
    parameters: Vec<ParameterEntry<'a>>,
    responses: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct ParameterEntry<'a> {
    name: &'a str,
    location: &'static str,
    required: bool,
}

/// Build the artifact set for `doc` at `version`. Output is a pure
/// function of its inputs.
pub fn generate(doc: &ContractDocument, version: Version) -> anyhow::Result<ArtifactSet> {
    let contract = specsync_contract::serialize(doc)
        .with_context(|| format!("serialize contract {}", doc.name()))?;

    let routes = doc
        .operations()
        .map(|(path, method, op)| RouteEntry {
            method: method.as_str().to_ascii_uppercase(),
            path,
            operation_id: &op.operation_id,
            parameters: op
                .parameters
                .iter()
                .map(|p| ParameterEntry {
                    name: &p.name,
                    location: p.location.as_str(),
                    required: p.required,
                })
                .collect(),
            responses: op.responses.keys().map(String::as_str).collect(),
        })
        .collect();
    let manifest = RouteManifest {
        schema: ROUTES_SCHEMA_V1,
        name: doc.name(),
        version,
        fingerprint: doc.fingerprint(),
        routes,
    };
    let mut routes_json =
        serde_json::to_vec_pretty(&manifest).context("serialize route manifest")?;
    routes_json.push(b'\n');

    let mut set = ArtifactSet::new();
    set.insert(CONTRACT_FILE.to_string(), contract);
    set.insert(ROUTES_FILE.to_string(), routes_json);
    Ok(set)
}
