//! Ordered compatibility classification rules.
//!
//! Evaluated top to bottom; the first match wins. A change no rule matches
//! is classified breaking under [`FAIL_SAFE_RULE`].

use specsync_types::change::{
    ChangeDetail, Classification, ConstraintEffect, Scope, TypeEffect,
};

/// Rule id assigned to changes no rule in [`RULES`] matched.
pub const FAIL_SAFE_RULE: &str = "fail_safe";

pub struct ClassificationRule {
    pub id: &'static str,
    pub classification: Classification,
    pub summary: &'static str,
    matches: fn(Scope, &ChangeDetail) -> bool,
}

impl ClassificationRule {
    pub fn matches(&self, scope: Scope, detail: &ChangeDetail) -> bool {
        (self.matches)(scope, detail)
    }
}

pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        id: "removed_surface",
        classification: Classification::Breaking,
        summary: "removing an operation, a route or a required request parameter",
        matches: removed_surface,
    },
    ClassificationRule {
        id: "added_required_input",
        classification: Classification::Breaking,
        summary: "adding a required request parameter without a default",
        matches: added_required_input,
    },
    ClassificationRule {
        id: "narrowed_response",
        classification: Classification::Breaking,
        summary: "narrowing a response type, removing a guaranteed response field or a response status",
        matches: narrowed_response,
    },
    ClassificationRule {
        id: "compatible_extension",
        classification: Classification::NonBreaking,
        summary: "loosening a request constraint or adding optional inputs, response fields, operations or routes",
        matches: compatible_extension,
    },
    ClassificationRule {
        id: "documentation_only",
        classification: Classification::Informational,
        summary: "description, summary or example changes",
        matches: documentation_only,
    },
];

/// Classification and the id of the rule that produced it.
pub fn classify(scope: Scope, detail: &ChangeDetail) -> (Classification, &'static str) {
    RULES
        .iter()
        .find(|r| r.matches(scope, detail))
        .map(|r| (r.classification, r.id))
        .unwrap_or((Classification::Breaking, FAIL_SAFE_RULE))
}

fn removed_surface(scope: Scope, d: &ChangeDetail) -> bool {
    use ChangeDetail::*;
    match d {
        RouteRemoved | OperationRemoved { .. } => true,
        ParameterRemoved { required, .. } => *required,
        RequestBodyRemoved { required } => *required,
        PropertyRemoved { required } => scope == Scope::Request && *required,
        _ => false,
    }
}

fn added_required_input(scope: Scope, d: &ChangeDetail) -> bool {
    use ChangeDetail::*;
    match d {
        ParameterAdded {
            required,
            has_default,
            ..
        } => *required && !*has_default,
        RequestBodyAdded { required } => *required,
        PropertyAdded {
            required,
            has_default,
        } => matches!(scope, Scope::Request | Scope::Component) && *required && !*has_default,
        _ => false,
    }
}

fn narrowed_response(scope: Scope, d: &ChangeDetail) -> bool {
    use ChangeDetail::*;
    if scope != Scope::Response {
        return false;
    }
    match d {
        TypeChanged { effect, .. } => *effect == TypeEffect::Narrowed,
        PropertyRemoved { required } => *required,
        PropertyRequiredChanged { from, to } => *from && !*to,
        SchemaRemoved | ResponseRemoved { .. } => true,
        _ => false,
    }
}

fn compatible_extension(scope: Scope, d: &ChangeDetail) -> bool {
    use ChangeDetail::*;
    match d {
        RouteAdded | OperationAdded { .. } | ComponentAdded => true,
        ParameterAdded {
            required,
            has_default,
            ..
        } => !*required || *has_default,
        RequestBodyAdded { required } => !*required,
        ParameterRequiredChanged { from, to } | RequestBodyRequiredChanged { from, to } => {
            *from && !*to
        }
        PropertyAdded {
            required,
            has_default,
        } => match scope {
            Scope::Response => !*required,
            Scope::Request | Scope::Component => !*required || *has_default,
            _ => false,
        },
        PropertyRequiredChanged { from, to } => scope == Scope::Request && *from && !*to,
        ConstraintChanged { effect, .. } => {
            scope == Scope::Request && *effect == ConstraintEffect::Loosened
        }
        TypeChanged { effect, .. } => scope == Scope::Request && *effect == TypeEffect::Widened,
        _ => false,
    }
}

fn documentation_only(_scope: Scope, d: &ChangeDetail) -> bool {
    matches!(
        d,
        ChangeDetail::TextChanged { .. }
            | ChangeDetail::ExampleChanged { .. }
            | ChangeDetail::RouteOrderChanged { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text() -> ChangeDetail {
        ChangeDetail::TextChanged {
            field: "description".to_string(),
            from: None,
            to: Some("x".to_string()),
        }
    }

    #[test]
    fn rule_ids_are_unique() {
        let mut ids: Vec<_> = RULES.iter().map(|r| r.id).collect();
        ids.push(FAIL_SAFE_RULE);
        let n = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), n);
    }

    #[test]
    fn removed_required_parameter_is_breaking() {
        let d = ChangeDetail::ParameterRemoved {
            location: "query".into(),
            required: true,
        };
        assert_eq!(
            classify(Scope::Request, &d),
            (Classification::Breaking, "removed_surface")
        );
    }

    #[test]
    fn removed_optional_parameter_falls_to_fail_safe() {
        let d = ChangeDetail::ParameterRemoved {
            location: "query".into(),
            required: false,
        };
        assert_eq!(
            classify(Scope::Request, &d),
            (Classification::Breaking, FAIL_SAFE_RULE)
        );
    }

    #[test]
    fn new_required_parameter_depends_on_default() {
        let without = ChangeDetail::ParameterAdded {
            location: "query".into(),
            required: true,
            has_default: false,
        };
        let with = ChangeDetail::ParameterAdded {
            location: "query".into(),
            required: true,
            has_default: true,
        };
        assert_eq!(classify(Scope::Request, &without).1, "added_required_input");
        assert_eq!(
            classify(Scope::Request, &with),
            (Classification::NonBreaking, "compatible_extension")
        );
    }

    #[test]
    fn response_narrowing_is_breaking_request_widening_is_not() {
        let narrowed = ChangeDetail::TypeChanged {
            from: "number".into(),
            to: "integer".into(),
            effect: TypeEffect::Narrowed,
        };
        let widened = ChangeDetail::TypeChanged {
            from: "integer".into(),
            to: "number".into(),
            effect: TypeEffect::Widened,
        };
        assert_eq!(classify(Scope::Response, &narrowed).1, "narrowed_response");
        assert_eq!(
            classify(Scope::Request, &widened),
            (Classification::NonBreaking, "compatible_extension")
        );
        assert_eq!(classify(Scope::Response, &widened).1, FAIL_SAFE_RULE);
    }

    #[test]
    fn loosened_request_constraint_is_non_breaking() {
        let d = ChangeDetail::ConstraintChanged {
            constraint: "maximum".into(),
            from: serde_json::json!(100.0),
            to: serde_json::json!(500.0),
            effect: ConstraintEffect::Loosened,
        };
        assert_eq!(classify(Scope::Request, &d).0, Classification::NonBreaking);
        let tightened = ChangeDetail::ConstraintChanged {
            constraint: "maximum".into(),
            from: serde_json::json!(500.0),
            to: serde_json::json!(100.0),
            effect: ConstraintEffect::Tightened,
        };
        assert_eq!(classify(Scope::Request, &tightened).1, FAIL_SAFE_RULE);
    }

    #[test]
    fn optional_response_field_is_non_breaking() {
        let d = ChangeDetail::PropertyAdded {
            required: false,
            has_default: false,
        };
        assert_eq!(classify(Scope::Response, &d).0, Classification::NonBreaking);
    }

    #[test]
    fn response_status_removal_is_breaking() {
        let d = ChangeDetail::ResponseRemoved {
            status: "404".into(),
        };
        assert_eq!(classify(Scope::Response, &d).1, "narrowed_response");
    }

    #[test]
    fn text_is_informational_everywhere() {
        for scope in [Scope::Document, Scope::Operation, Scope::Request, Scope::Response] {
            assert_eq!(
                classify(scope, &text()),
                (Classification::Informational, "documentation_only")
            );
        }
    }

    #[test]
    fn reference_change_is_fail_safe() {
        let d = ChangeDetail::ReferenceChanged {
            from: "#/components/schemas/A".into(),
            to: "#/components/schemas/B".into(),
        };
        assert_eq!(
            classify(Scope::Response, &d),
            (Classification::Breaking, FAIL_SAFE_RULE)
        );
    }

    #[test]
    fn earlier_rule_wins() {
        // A removed required request property matches removed_surface before
        // anything else could claim it.
        let d = ChangeDetail::PropertyRemoved { required: true };
        assert_eq!(classify(Scope::Request, &d).1, "removed_surface");
        assert_eq!(classify(Scope::Response, &d).1, "narrowed_response");
    }
}
