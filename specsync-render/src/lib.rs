//! Rendering helpers (markdown) for human-readable artifacts.

use specsync_types::change::{Change, ChangeSet};
use specsync_types::migration::MigrationPlan;
use specsync_types::plan::{SyncActionKind, SyncPlan};
use specsync_types::result::{ActionStatus, SyncOutcome, SyncResult};
use specsync_types::version::{CompatibilityEntry, Version};

pub fn render_plan_md(plan: &SyncPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!("# specsync plan: {}\n\n", plan.name));
    out.push_str(&format!("- From: {}\n", version_label(plan.from_version)));
    out.push_str(&format!("- Target: v{}\n", plan.target_version));
    out.push_str(&format!(
        "- Changes: {} breaking, {} non-breaking, {} informational\n",
        plan.changes.breaking, plan.changes.non_breaking, plan.changes.informational
    ));
    out.push_str(&format!(
        "- Requires acknowledgement: `{}`\n\n",
        plan.requires_acknowledgement
    ));

    out.push_str("## Actions\n\n");
    if plan.actions.is_empty() {
        out.push_str("_Artifacts are in sync; nothing to do._\n");
        return out;
    }

    for (i, action) in plan.actions.iter().enumerate() {
        out.push_str(&format!("### {}. {}\n\n", i + 1, action.kind.as_str()));
        out.push_str(&format!("- Id: `{}`\n", action.id));
        out.push_str(&format!("- Target: `{}`\n", action.target.id));
        if let SyncActionKind::WriteMigrationGuide { file_name, .. } = &action.kind {
            out.push_str(&format!("- Guide: `{}`\n", file_name));
        }
        out.push_str(&format!("\n{}\n\n", action.rationale));
    }

    out
}

pub fn render_result_md(result: &SyncResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("# specsync sync: {}\n\n", result.name));
    out.push_str(&format!("- Status: `{}`\n", outcome_label(result.status)));
    out.push_str(&format!(
        "- Version: {} → v{}\n",
        version_label(result.from_version),
        result.version
    ));
    out.push_str(&format!("- Forced: `{}`\n", result.forced));
    if let Some(backup) = &result.backup {
        out.push_str(&format!(
            "- Backup: `{}` ({} files)\n",
            backup.location, backup.files
        ));
    }
    out.push('\n');

    out.push_str("## Actions\n\n");
    if result.actions.is_empty() {
        out.push_str("_No actions._\n");
        return out;
    }

    for (i, r) in result.actions.iter().enumerate() {
        out.push_str(&format!("### {}. {}\n\n", i + 1, r.kind));
        out.push_str(&format!("- Status: `{}`\n", status_label(r.status)));
        out.push_str(&format!("- Target: `{}`\n", r.target));
        if let Some(msg) = &r.message {
            out.push_str(&format!("- Message: {}\n", msg));
        }
        if !r.files_written.is_empty() {
            out.push_str("\n**Files written**\n\n");
            for f in &r.files_written {
                out.push_str(&format!("- `{}`\n", f));
            }
        }
        out.push('\n');
    }

    out
}

pub fn render_changes_md(changes: &ChangeSet) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Changes: {}\n\n", changes.name));
    out.push_str(&format!("- Aggregate: `{}`\n", changes.aggregate()));
    out.push_str(&format!("- Summary: {}\n\n", changes.summary()));

    for (title, list) in [
        ("Additions", &changes.additions),
        ("Removals", &changes.removals),
        ("Modifications", &changes.modifications),
    ] {
        if list.is_empty() {
            continue;
        }
        out.push_str(&format!("## {}\n\n", title));
        for c in list {
            out.push_str(&change_line(c));
        }
        out.push('\n');
    }

    if changes.is_empty() {
        out.push_str("_No changes._\n");
    }
    out
}

/// Consumer-facing guide written next to the generated artifacts when a
/// sync carries breaking changes.
pub fn render_migration_guide_md(plan: &MigrationPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Migrating {} from {} to v{}\n\n",
        plan.name,
        version_label(plan.from_version),
        plan.to_version
    ));
    out.push_str(&format!(
        "- Estimated effort: `{}`\n",
        plan.estimated_effort.as_str()
    ));
    out.push_str(&format!(
        "- Manual intervention required: `{}`\n\n",
        plan.requires_manual_intervention
    ));

    out.push_str("## Breaking changes\n\n");
    if plan.breaking_changes.is_empty() {
        out.push_str("_None._\n");
    } else {
        for b in &plan.breaking_changes {
            out.push_str(&format!("- {}\n", b));
        }
    }

    out.push_str("\n## Steps\n\n");
    for (i, step) in plan.steps.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }
    out
}

pub fn render_matrix_md(rows: &[CompatibilityEntry]) -> String {
    let mut out = String::new();
    out.push_str("# Compatibility matrix\n\n");
    if rows.is_empty() {
        out.push_str("_No versions recorded._\n");
        return out;
    }
    out.push_str("| Resource | Version | Latest | Current | Breaking since first | Created |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for r in rows {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            r.name,
            r.version,
            yes_no(r.is_latest),
            yes_no(r.is_current),
            yes_no(r.has_breaking_changes),
            r.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    out
}

fn change_line(c: &Change) -> String {
    format!(
        "- `{}` `{}` {} (rule `{}`)\n",
        c.classification, c.path, c.message, c.rule
    )
}

fn version_label(v: Option<Version>) -> String {
    v.map_or_else(|| "(none)".to_string(), |v| format!("v{v}"))
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn outcome_label(s: SyncOutcome) -> &'static str {
    match s {
        SyncOutcome::Applied => "applied",
        SyncOutcome::NoOp => "no_op",
        SyncOutcome::RolledBack => "rolled_back",
    }
}

fn status_label(s: ActionStatus) -> &'static str {
    match s {
        ActionStatus::Applied => "applied",
        ActionStatus::Failed => "failed",
        ActionStatus::RolledBack => "rolled_back",
        ActionStatus::Skipped => "skipped",
    }
}
