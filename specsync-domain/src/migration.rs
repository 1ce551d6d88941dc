use specsync_types::change::{ChangeCategory, ChangeDetail, ChangeSet, Classification};
use specsync_types::migration::{Effort, MigrationPlan};
use specsync_types::version::Version;

/// Consumer guidance for moving from `from` to `to`, derived from the
/// change set between the two versions.
pub fn migration_plan(changes: &ChangeSet, from: Option<Version>, to: Version) -> MigrationPlan {
    let mut steps = Vec::new();
    let mut manual = false;
    let mut effort = Effort::Low;

    for change in changes.breaking() {
        let location = change.path.dotted();
        if change.category() == ChangeCategory::Removal {
            steps.push(format!(
                "Remove client code that depends on {location}: {}",
                change.message
            ));
            manual = true;
            effort = Effort::High;
        } else if adds_requirement(&change.detail) {
            steps.push(format!(
                "Update callers to satisfy the new requirement at {location}: {}",
                change.message
            ));
            manual = true;
            effort = effort.max(Effort::Medium);
        } else {
            steps.push(format!("Review usages of {location}: {}", change.message));
        }
    }

    for change in changes
        .additions
        .iter()
        .filter(|c| c.classification == Classification::NonBreaking)
    {
        steps.push(format!("Optional: adopt {}", change.message));
    }

    if steps.is_empty() {
        steps.push("No implementation changes required".to_string());
    }

    MigrationPlan {
        name: changes.name.clone(),
        from_version: from,
        to_version: to,
        breaking_changes: changes
            .breaking()
            .map(|c| format!("{}: {}", c.path, c.message))
            .collect(),
        steps,
        requires_manual_intervention: manual,
        estimated_effort: effort,
    }
}

fn adds_requirement(detail: &ChangeDetail) -> bool {
    match detail {
        ChangeDetail::ParameterAdded { required, .. }
        | ChangeDetail::RequestBodyAdded { required }
        | ChangeDetail::PropertyAdded { required, .. } => *required,
        ChangeDetail::ParameterRequiredChanged { to, .. }
        | ChangeDetail::RequestBodyRequiredChanged { to, .. }
        | ChangeDetail::PropertyRequiredChanged { to, .. } => *to,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specsync_types::change::{Change, ChangePath, Scope};

    fn change(detail: ChangeDetail, classification: Classification, message: &str) -> Change {
        Change {
            path: ChangePath(vec!["routes".into(), "/users".into()]),
            scope: Scope::Request,
            detail,
            classification,
            rule: "test".into(),
            message: message.into(),
        }
    }

    #[test]
    fn no_changes_needs_no_work() {
        let set = ChangeSet::empty("users", "a", "b");
        let plan = migration_plan(&set, Some(Version::new(1, 0, 0)), Version::new(1, 0, 1));
        assert_eq!(plan.steps, vec!["No implementation changes required"]);
        assert!(!plan.requires_manual_intervention);
        assert_eq!(plan.estimated_effort, Effort::Low);
        assert!(plan.breaking_changes.is_empty());
    }

    #[test]
    fn removal_is_high_effort() {
        let set = ChangeSet::from_changes(
            "users",
            "a",
            "b",
            vec![change(
                ChangeDetail::RouteRemoved,
                Classification::Breaking,
                "route /users removed",
            )],
        );
        let plan = migration_plan(&set, Some(Version::new(1, 2, 3)), Version::new(2, 0, 0));
        assert!(plan.requires_manual_intervention);
        assert_eq!(plan.estimated_effort, Effort::High);
        assert_eq!(plan.breaking_changes, vec!["routes./users: route /users removed"]);
    }

    #[test]
    fn new_required_input_is_medium_effort() {
        let set = ChangeSet::from_changes(
            "users",
            "a",
            "b",
            vec![
                change(
                    ChangeDetail::ParameterAdded {
                        location: "query".into(),
                        required: true,
                        has_default: false,
                    },
                    Classification::Breaking,
                    "required query parameter `tenant` added",
                ),
                change(
                    ChangeDetail::RouteAdded,
                    Classification::NonBreaking,
                    "route /teams added",
                ),
            ],
        );
        let plan = migration_plan(&set, None, Version::new(2, 0, 0));
        assert!(plan.requires_manual_intervention);
        assert_eq!(plan.estimated_effort, Effort::Medium);
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[1].starts_with("Optional: adopt route /teams added"));
    }
}
