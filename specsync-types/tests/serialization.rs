use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use specsync_types::change::{Change, ChangeDetail, ChangeSet, Classification, Scope};
use specsync_types::migration::{Effort, MigrationPlan};
use specsync_types::plan::{ArtifactTarget, SyncAction, SyncActionKind, SyncPlan};
use specsync_types::tracked::{SyncStatus, TrackedSpec};
use specsync_types::version::{SnapshotRef, Version, VersionRecord};

#[test]
fn version_record_round_trips_through_json() {
    let mut record = VersionRecord::new(
        "users",
        Version::new(2, 0, 0),
        SnapshotRef {
            path: "users/v2.0.0.yaml".to_string(),
            sha256: "00".repeat(32),
        },
        "ab".repeat(32),
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
    );
    record.classification = Some(Classification::Breaking);

    let json = serde_json::to_string_pretty(&record).expect("serialize");
    assert!(json.contains("\"version\": \"2.0.0\""));
    assert!(json.contains("\"classification\": \"breaking\""));
    let back: VersionRecord = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, record);
}

#[test]
fn migration_guide_action_carries_plan() {
    let mut plan = SyncPlan::new("users", Version::new(2, 0, 0), "f");
    plan.requires_acknowledgement = true;
    plan.actions.push(SyncAction {
        id: "id".to_string(),
        kind: SyncActionKind::WriteMigrationGuide {
            file_name: "users-v1.2.3-to-v2.0.0.md".to_string(),
            migration: MigrationPlan {
                name: "users".to_string(),
                from_version: Some(Version::new(1, 2, 3)),
                to_version: Version::new(2, 0, 0),
                breaking_changes: vec!["x: removed".to_string()],
                steps: vec![],
                requires_manual_intervention: true,
                estimated_effort: Effort::High,
            },
        },
        target: ArtifactTarget {
            id: "migrations/users".to_string(),
        },
        rationale: "breaking".to_string(),
    });

    let v = serde_json::to_value(&plan).expect("serialize");
    assert_eq!(v["actions"][0]["kind"]["type"], "write_migration_guide");
    assert_eq!(
        v["actions"][0]["kind"]["migration"]["estimated_effort"],
        "high"
    );
    let back: SyncPlan = serde_json::from_value(v).expect("deserialize");
    assert_eq!(back, plan);
}

#[test]
fn tracked_spec_omits_unsynced_fields() {
    let t = TrackedSpec::new("users", "f");
    let v = serde_json::to_value(&t).expect("serialize");
    assert!(v.get("current_version").is_none());
    assert!(v.get("last_synced_at").is_none());
    assert_eq!(v["sync_status"], serde_json::json!(SyncStatus::Pending.as_str()));
}

#[test]
fn change_set_serializes_dotted_path_segments() {
    let set = ChangeSet::from_changes(
        "users",
        "a",
        "b",
        vec![Change {
            path: ["routes", "/users", "operations", "post"].into_iter().collect(),
            scope: Scope::Operation,
            detail: ChangeDetail::OperationRemoved {
                method: "post".to_string(),
            },
            classification: Classification::Breaking,
            rule: "removed_surface".to_string(),
            message: "operation removed".to_string(),
        }],
    );
    let v = serde_json::to_value(&set).expect("serialize");
    assert_eq!(
        v["removals"][0]["path"],
        serde_json::json!(["routes", "/users", "operations", "post"])
    );
    assert_eq!(v["removals"][0]["detail"]["type"], "operation_removed");
}
