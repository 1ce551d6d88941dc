use crate::migration::migration_plan;
use specsync_types::change::ChangeSet;
use specsync_types::plan::{ArtifactTarget, SyncAction, SyncActionKind, SyncPlan};
use specsync_types::tracked::{SyncStatus, TrackedSpec};
use specsync_types::version::{Version, VersionRecord};
use tracing::debug;
use uuid::Uuid;

/// Facts about the artifact side gathered by the caller, so that planning
/// itself never touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
    pub artifacts_present: bool,
    /// Artifact identifier, e.g. `generated/users`.
    pub artifact_root: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Compute the actions that bring the artifacts for `tracked` up to
    /// `latest`. `changes` is the diff from the version the artifacts
    /// reflect to `latest`.
    pub fn plan(
        &self,
        ctx: &PlanContext,
        tracked: &TrackedSpec,
        latest: &VersionRecord,
        changes: &ChangeSet,
    ) -> SyncPlan {
        let mut plan = SyncPlan::new(&latest.name, latest.version, &latest.fingerprint);
        plan.from_version = tracked.current_version;
        plan.changes = changes.counts();
        plan.requires_acknowledgement =
            changes.has_breaking() || tracked.sync_status == SyncStatus::BreakingPending;

        let target = ArtifactTarget {
            id: ctx.artifact_root.clone(),
        };
        let mut kinds: Vec<(SyncActionKind, String)> = Vec::new();

        if !ctx.artifacts_present {
            kinds.push((
                SyncActionKind::Generate,
                format!("no artifacts exist yet; generate from v{}", latest.version),
            ));
        } else if is_current(tracked, latest) && changes.is_empty() {
            // Nothing to do.
        } else {
            kinds.push((
                SyncActionKind::Backup,
                "preserve the current artifact set before replacing it".to_string(),
            ));
            kinds.push((
                SyncActionKind::Update,
                format!("{}; update to v{}", changes.summary(), latest.version),
            ));
            if changes.has_breaking() {
                let migration = migration_plan(changes, tracked.current_version, latest.version);
                let file_name = guide_file_name(&latest.name, tracked.current_version, latest.version);
                kinds.push((
                    SyncActionKind::WriteMigrationGuide {
                        file_name,
                        migration,
                    },
                    format!(
                        "{} breaking change(s) require consumer migration",
                        plan.changes.breaking
                    ),
                ));
            }
        }

        plan.actions = kinds
            .into_iter()
            .map(|(kind, rationale)| SyncAction {
                id: deterministic_action_id(&latest.name, &latest.version, &kind, &target)
                    .to_string(),
                kind,
                target: target.clone(),
                rationale,
            })
            .collect();

        debug!(
            name = %latest.name,
            target = %latest.version,
            actions = plan.actions.len(),
            requires_acknowledgement = plan.requires_acknowledgement,
            "planned sync"
        );
        plan
    }
}

fn is_current(tracked: &TrackedSpec, latest: &VersionRecord) -> bool {
    tracked.sync_status == SyncStatus::InSync && tracked.current_version == Some(latest.version)
}

/// `<name>-v<from>-to-v<to>.md`; a resource with no prior version migrates
/// from `0.0.0`.
pub fn guide_file_name(name: &str, from: Option<Version>, to: Version) -> String {
    let from = from.unwrap_or(Version::new(0, 0, 0));
    format!("{name}-v{from}-to-v{to}.md")
}

fn deterministic_action_id(
    name: &str,
    version: &Version,
    kind: &SyncActionKind,
    target: &ArtifactTarget,
) -> Uuid {
    const NAMESPACE: Uuid = Uuid::from_bytes([
        0x9a, 0x1f, 0x5c, 0x2e, 0x71, 0x0b, 0x4d, 0x8e, 0xb3, 0x62, 0x1e, 0x7d, 0xc4, 0x05, 0xa9,
        0x3f,
    ]);
    let stable_key = format!("{name}|{version}|{}|{}", kind.as_str(), target.id);
    Uuid::new_v5(&NAMESPACE, stable_key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use specsync_types::change::{Change, ChangeDetail, ChangePath, Classification, Scope};
    use specsync_types::version::SnapshotRef;

    fn record(version: Version) -> VersionRecord {
        VersionRecord::new(
            "users",
            version,
            SnapshotRef {
                path: format!("snapshots/users/v{version}.yaml"),
                sha256: "s".repeat(64),
            },
            "f".repeat(64),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn tracked(version: Option<Version>, status: SyncStatus) -> TrackedSpec {
        let mut t = TrackedSpec::new("users", "f".repeat(64));
        t.current_version = version;
        t.sync_status = status;
        t
    }

    fn ctx(present: bool) -> PlanContext {
        PlanContext {
            artifacts_present: present,
            artifact_root: "generated/users".to_string(),
        }
    }

    fn one_change(classification: Classification) -> ChangeSet {
        let detail = match classification {
            Classification::Breaking => ChangeDetail::RouteRemoved,
            _ => ChangeDetail::RouteAdded,
        };
        ChangeSet::from_changes(
            "users",
            "a",
            "b",
            vec![Change {
                path: ChangePath(vec!["routes".into(), "/teams".into()]),
                scope: Scope::Route,
                detail,
                classification,
                rule: "test".into(),
                message: "route /teams changed".into(),
            }],
        )
    }

    fn kinds(plan: &SyncPlan) -> Vec<&'static str> {
        plan.actions.iter().map(|a| a.kind.as_str()).collect()
    }

    #[test]
    fn no_artifacts_generates() {
        let plan = Planner::new().plan(
            &ctx(false),
            &tracked(None, SyncStatus::Pending),
            &record(Version::INITIAL),
            &ChangeSet::empty("users", "f", "f"),
        );
        assert_eq!(kinds(&plan), vec!["generate"]);
        assert!(!plan.requires_acknowledgement);
        assert_eq!(plan.actions[0].target.id, "generated/users");
    }

    #[test]
    fn in_sync_and_unchanged_is_noop() {
        let v = Version::new(1, 2, 0);
        let plan = Planner::new().plan(
            &ctx(true),
            &tracked(Some(v), SyncStatus::InSync),
            &record(v),
            &ChangeSet::empty("users", "f", "f"),
        );
        assert!(plan.is_noop());
    }

    #[test]
    fn non_breaking_backs_up_then_updates() {
        let plan = Planner::new().plan(
            &ctx(true),
            &tracked(Some(Version::new(1, 2, 0)), SyncStatus::Pending),
            &record(Version::new(1, 3, 0)),
            &one_change(Classification::NonBreaking),
        );
        assert_eq!(kinds(&plan), vec!["backup", "update"]);
        assert!(!plan.requires_acknowledgement);
        assert_eq!(plan.from_version, Some(Version::new(1, 2, 0)));
    }

    #[test]
    fn breaking_adds_guide_and_requires_ack() {
        let plan = Planner::new().plan(
            &ctx(true),
            &tracked(Some(Version::new(1, 2, 3)), SyncStatus::BreakingPending),
            &record(Version::new(2, 0, 0)),
            &one_change(Classification::Breaking),
        );
        assert_eq!(kinds(&plan), vec!["backup", "update", "write_migration_guide"]);
        assert!(plan.requires_acknowledgement);
        match &plan.actions[2].kind {
            SyncActionKind::WriteMigrationGuide {
                file_name,
                migration,
            } => {
                assert_eq!(file_name, "users-v1.2.3-to-v2.0.0.md");
                assert_eq!(migration.to_version, Version::new(2, 0, 0));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn breaking_pending_status_alone_requires_ack() {
        let plan = Planner::new().plan(
            &ctx(false),
            &tracked(None, SyncStatus::BreakingPending),
            &record(Version::INITIAL),
            &ChangeSet::empty("users", "f", "f"),
        );
        assert!(plan.requires_acknowledgement);
    }

    #[test]
    fn plans_are_deterministic() {
        let t = tracked(Some(Version::new(1, 2, 3)), SyncStatus::Pending);
        let r = record(Version::new(2, 0, 0));
        let c = one_change(Classification::Breaking);
        let a = Planner::new().plan(&ctx(true), &t, &r, &c);
        let b = Planner::new().plan(&ctx(true), &t, &r, &c);
        assert_eq!(a, b);
        let ids: std::collections::BTreeSet<_> = a.actions.iter().map(|x| &x.id).collect();
        assert_eq!(ids.len(), a.actions.len());
    }
}
