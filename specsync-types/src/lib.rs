//! Shared DTOs (schemas-as-code) for the specsync workspace.
//!
//! # Design constraints
//! - These types are intended to be serialized to disk or printed as JSON.
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod change;
pub mod migration;
pub mod plan;
pub mod result;
pub mod tracked;
pub mod version;

/// Schema identifiers.
pub mod schema {
    pub const SPECSYNC_PLAN_V1: &str = "specsync.plan.v1";
    pub const SPECSYNC_RESULT_V1: &str = "specsync.result.v1";
    pub const SPECSYNC_CHANGESET_V1: &str = "specsync.changeset.v1";
    pub const SPECSYNC_VERSION_RECORD_V1: &str = "specsync.version_record.v1";
    pub const SPECSYNC_TRACKED_V1: &str = "specsync.tracked.v1";
}

/// Rejected resource name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource name {name:?}: {reason}")]
pub struct InvalidResourceName {
    pub name: String,
    pub reason: &'static str,
}

/// Resource names key every store (file names, snapshot directories, lock
/// files), so they are restricted to `[A-Za-z0-9._-]+`.
pub fn validate_resource_name(name: &str) -> Result<(), InvalidResourceName> {
    let fail = |reason| {
        Err(InvalidResourceName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return fail("empty");
    }
    if name == "." || name == ".." {
        return fail("reserved path component");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return fail("only ASCII letters, digits, '.', '_' and '-' are allowed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_resource_name;

    #[test]
    fn accepts_plain_names() {
        for name in ["users", "billing-v2", "orders.api", "a_b"] {
            assert!(validate_resource_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_path_like_names() {
        for name in ["", ".", "..", "a/b", "a\\b", "users api", "ü"] {
            assert!(validate_resource_name(name).is_err(), "{name:?}");
        }
    }
}
