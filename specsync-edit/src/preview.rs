use diffy::PatchFormatter;
use specsync_store::ArtifactSet;
use std::collections::BTreeSet;

/// Unified diff between the current artifact set and the one a sync would
/// write. Paths are `<artifact_id>/<file>`; added and removed files diff
/// against empty content. Non-UTF-8 files are reported, not diffed.
pub fn render_patch(artifact_id: &str, before: Option<&ArtifactSet>, after: &ArtifactSet) -> String {
    let empty = ArtifactSet::new();
    let before = before.unwrap_or(&empty);
    let files: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    let mut out = String::new();
    let formatter = PatchFormatter::new();

    for file in files {
        let old = before.get(file).map(Vec::as_slice).unwrap_or_default();
        let new = after.get(file).map(Vec::as_slice).unwrap_or_default();
        if old == new {
            continue;
        }

        let path = format!("{artifact_id}/{file}");
        out.push_str(&format!("diff --git a/{0} b/{0}\n", path));
        let (Ok(old), Ok(new)) = (std::str::from_utf8(old), std::str::from_utf8(new)) else {
            out.push_str(&format!("Binary files a/{0} and b/{0} differ\n", path));
            continue;
        };
        out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", path));

        let patch = diffy::create_patch(old, new);
        out.push_str(&formatter.fmt_patch(&patch).to_string());
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}
