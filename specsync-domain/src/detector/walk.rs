use super::rules;
use serde_json::{Value, json};
use specsync_contract::{
    ContractDocument, ContractInfo, Method, Operation, Parameter, ParameterLocation, RequestBody,
    Response, Route, Schema, SchemaKind,
};
use specsync_types::change::{
    Change, ChangeDetail, ChangePath, ConstraintEffect, Scope, TypeEffect,
};
use std::collections::{BTreeMap, BTreeSet};

/// Lock-step walk over two documents of the same resource. Changes are
/// collected in traversal order: info, routes (new-document order, then
/// routes only the old document has), components.
pub(crate) struct Walker {
    out: Vec<Change>,
}

impl Walker {
    pub(crate) fn new() -> Self {
        Self { out: Vec::new() }
    }

    pub(crate) fn finish(self) -> Vec<Change> {
        self.out
    }

    pub(crate) fn document(&mut self, old: &ContractDocument, new: &ContractDocument) {
        self.info(old.info(), new.info());
        self.route_order(old, new);

        for route in new.routes() {
            match old.route(&route.path) {
                Some(prev) => self.route(prev, route),
                None => self.emit(
                    &route_path(&route.path),
                    Scope::Route,
                    ChangeDetail::RouteAdded,
                    format!("route {} added", route.path),
                ),
            }
        }
        for route in old.routes() {
            if new.route(&route.path).is_none() {
                self.emit(
                    &route_path(&route.path),
                    Scope::Route,
                    ChangeDetail::RouteRemoved,
                    format!("route {} removed", route.path),
                );
            }
        }

        self.components(old.components(), new.components());
    }

    /// Route order contributes to the fingerprint, so a pure reorder must
    /// still surface as a change.
    fn route_order(&mut self, old: &ContractDocument, new: &ContractDocument) {
        let shared = |doc: &ContractDocument, other: &ContractDocument| -> Vec<String> {
            doc.routes()
                .iter()
                .filter(|r| other.route(&r.path).is_some())
                .map(|r| r.path.clone())
                .collect()
        };
        let (from, to) = (shared(old, new), shared(new, old));
        if from != to {
            self.emit(
                &["routes".to_string()],
                Scope::Document,
                ChangeDetail::RouteOrderChanged { from, to },
                "route order changed".to_string(),
            );
        }
    }

    fn emit(&mut self, path: &[String], scope: Scope, detail: ChangeDetail, message: String) {
        let (classification, rule) = rules::classify(scope, &detail);
        self.out.push(Change {
            path: ChangePath(path.to_vec()),
            scope,
            detail,
            classification,
            rule: rule.to_string(),
            message,
        });
    }

    fn text(
        &mut self,
        base: &[String],
        scope: Scope,
        field: &str,
        old: Option<&String>,
        new: Option<&String>,
    ) {
        if old == new {
            return;
        }
        let path = child(base, &[field]);
        let message = format!("{} changed", ChangePath(path.clone()));
        self.emit(
            &path,
            scope,
            ChangeDetail::TextChanged {
                field: field.to_string(),
                from: old.cloned(),
                to: new.cloned(),
            },
            message,
        );
    }

    fn example(&mut self, base: &[String], scope: Scope, old: Option<&Value>, new: Option<&Value>) {
        if old == new {
            return;
        }
        let path = child(base, &["example"]);
        self.emit(
            &path,
            scope,
            ChangeDetail::ExampleChanged {
                from: old.cloned().unwrap_or(Value::Null),
                to: new.cloned().unwrap_or(Value::Null),
            },
            format!("example of {} changed", ChangePath(base.to_vec())),
        );
    }

    fn default_value(
        &mut self,
        base: &[String],
        scope: Scope,
        old: Option<&Value>,
        new: Option<&Value>,
    ) {
        if old == new {
            return;
        }
        let path = child(base, &["default"]);
        self.emit(
            &path,
            scope,
            ChangeDetail::DefaultChanged {
                from: old.cloned().unwrap_or(Value::Null),
                to: new.cloned().unwrap_or(Value::Null),
            },
            format!("default of {} changed", ChangePath(base.to_vec())),
        );
    }

    fn info(&mut self, old: &ContractInfo, new: &ContractInfo) {
        let base = vec!["info".to_string()];
        self.text(&base, Scope::Document, "title", old.title.as_ref(), new.title.as_ref());
        self.text(
            &base,
            Scope::Document,
            "version",
            old.version.as_ref(),
            new.version.as_ref(),
        );
        self.text(
            &base,
            Scope::Document,
            "description",
            old.description.as_ref(),
            new.description.as_ref(),
        );
    }

    fn route(&mut self, old: &Route, new: &Route) {
        let base = route_path(&new.path);
        for method in Method::ALL {
            match (old.operations.get(&method), new.operations.get(&method)) {
                (Some(a), Some(b)) => self.operation(&new.path, method, a, b),
                (None, Some(_)) => self.emit(
                    &child(&base, &["operations", method.as_str()]),
                    Scope::Operation,
                    ChangeDetail::OperationAdded {
                        method: method.to_string(),
                    },
                    format!("operation {} added", op_label(method, &new.path)),
                ),
                (Some(_), None) => self.emit(
                    &child(&base, &["operations", method.as_str()]),
                    Scope::Operation,
                    ChangeDetail::OperationRemoved {
                        method: method.to_string(),
                    },
                    format!("operation {} removed", op_label(method, &new.path)),
                ),
                (None, None) => {}
            }
        }
    }

    fn operation(&mut self, route: &str, method: Method, old: &Operation, new: &Operation) {
        let base = child(&route_path(route), &["operations", method.as_str()]);
        let label = op_label(method, route);

        if old.operation_id != new.operation_id {
            self.emit(
                &child(&base, &["operationId"]),
                Scope::Operation,
                ChangeDetail::OperationIdChanged {
                    from: old.operation_id.clone(),
                    to: new.operation_id.clone(),
                },
                format!(
                    "operationId of {label} changed from {} to {}",
                    old.operation_id, new.operation_id
                ),
            );
        }
        self.text(
            &base,
            Scope::Operation,
            "summary",
            old.summary.as_ref(),
            new.summary.as_ref(),
        );
        self.text(
            &base,
            Scope::Operation,
            "description",
            old.description.as_ref(),
            new.description.as_ref(),
        );

        self.parameters(&base, &label, &old.parameters, &new.parameters);
        self.request_body(
            &base,
            &label,
            old.request_body.as_ref(),
            new.request_body.as_ref(),
        );
        self.responses(&base, &label, &old.responses, &new.responses);
    }

    fn parameters(&mut self, base: &[String], label: &str, old: &[Parameter], new: &[Parameter]) {
        let index = |ps: &[Parameter]| -> BTreeMap<(ParameterLocation, String), usize> {
            ps.iter()
                .enumerate()
                .map(|(i, p)| ((p.location, p.name.clone()), i))
                .collect()
        };
        let old_ix = index(old);
        let new_ix = index(new);
        let keys: BTreeSet<_> = old_ix.keys().chain(new_ix.keys()).cloned().collect();

        for key in keys {
            let (location, name) = &key;
            let path = child(base, &["parameters", location.as_str(), name.as_str()]);
            match (old_ix.get(&key), new_ix.get(&key)) {
                (Some(&a), Some(&b)) => self.parameter(&path, &old[a], &new[b]),
                (None, Some(&b)) => {
                    let p = &new[b];
                    let kind = if p.required { "required" } else { "optional" };
                    self.emit(
                        &path,
                        Scope::Request,
                        ChangeDetail::ParameterAdded {
                            location: location.to_string(),
                            required: p.required,
                            has_default: p.has_default(),
                        },
                        format!("{kind} {location} parameter `{name}` added to {label}"),
                    );
                }
                (Some(&a), None) => {
                    let p = &old[a];
                    let kind = if p.required { "required" } else { "optional" };
                    self.emit(
                        &path,
                        Scope::Request,
                        ChangeDetail::ParameterRemoved {
                            location: location.to_string(),
                            required: p.required,
                        },
                        format!("{kind} {location} parameter `{name}` removed from {label}"),
                    );
                }
                (None, None) => {}
            }
        }
    }

    fn parameter(&mut self, path: &[String], old: &Parameter, new: &Parameter) {
        if old.required != new.required {
            self.emit(
                path,
                Scope::Request,
                ChangeDetail::ParameterRequiredChanged {
                    from: old.required,
                    to: new.required,
                },
                format!(
                    "parameter `{}` is now {}",
                    new.name,
                    if new.required { "required" } else { "optional" }
                ),
            );
        }
        self.text(
            path,
            Scope::Request,
            "description",
            old.description.as_ref(),
            new.description.as_ref(),
        );
        self.example(path, Scope::Request, old.example.as_ref(), new.example.as_ref());
        self.default_value(path, Scope::Request, old.default.as_ref(), new.default.as_ref());
        // Parameter schemas sit directly under the parameter path.
        self.optional_schema(path, Scope::Request, old.schema.as_ref(), new.schema.as_ref());
    }

    fn request_body(
        &mut self,
        base: &[String],
        label: &str,
        old: Option<&RequestBody>,
        new: Option<&RequestBody>,
    ) {
        let path = child(base, &["requestBody"]);
        match (old, new) {
            (None, None) => {}
            (None, Some(b)) => self.emit(
                &path,
                Scope::Request,
                ChangeDetail::RequestBodyAdded {
                    required: b.required,
                },
                format!("request body added to {label}"),
            ),
            (Some(a), None) => self.emit(
                &path,
                Scope::Request,
                ChangeDetail::RequestBodyRemoved {
                    required: a.required,
                },
                format!("request body removed from {label}"),
            ),
            (Some(a), Some(b)) => {
                if a.required != b.required {
                    self.emit(
                        &path,
                        Scope::Request,
                        ChangeDetail::RequestBodyRequiredChanged {
                            from: a.required,
                            to: b.required,
                        },
                        format!(
                            "request body of {label} is now {}",
                            if b.required { "required" } else { "optional" }
                        ),
                    );
                }
                self.text(
                    &path,
                    Scope::Request,
                    "description",
                    a.description.as_ref(),
                    b.description.as_ref(),
                );
                self.optional_schema(&path, Scope::Request, a.schema.as_ref(), b.schema.as_ref());
            }
        }
    }

    fn responses(
        &mut self,
        base: &[String],
        label: &str,
        old: &BTreeMap<String, Response>,
        new: &BTreeMap<String, Response>,
    ) {
        let statuses: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        for status in statuses {
            let path = child(base, &["responses", status.as_str()]);
            match (old.get(status), new.get(status)) {
                (Some(a), Some(b)) => {
                    self.text(
                        &path,
                        Scope::Response,
                        "description",
                        a.description.as_ref(),
                        b.description.as_ref(),
                    );
                    self.optional_schema(
                        &path,
                        Scope::Response,
                        a.schema.as_ref(),
                        b.schema.as_ref(),
                    );
                }
                (None, Some(_)) => self.emit(
                    &path,
                    Scope::Response,
                    ChangeDetail::ResponseAdded {
                        status: status.clone(),
                    },
                    format!("response {status} added to {label}"),
                ),
                (Some(_), None) => self.emit(
                    &path,
                    Scope::Response,
                    ChangeDetail::ResponseRemoved {
                        status: status.clone(),
                    },
                    format!("response {status} removed from {label}"),
                ),
                (None, None) => {}
            }
        }
    }

    fn components(&mut self, old: &BTreeMap<String, Schema>, new: &BTreeMap<String, Schema>) {
        let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        for name in names {
            let path = vec![
                "components".to_string(),
                "schemas".to_string(),
                name.clone(),
            ];
            match (old.get(name), new.get(name)) {
                (Some(a), Some(b)) => self.schema(&path, Scope::Component, a, b),
                (None, Some(_)) => self.emit(
                    &path,
                    Scope::Component,
                    ChangeDetail::ComponentAdded,
                    format!("component schema {name} added"),
                ),
                (Some(_), None) => self.emit(
                    &path,
                    Scope::Component,
                    ChangeDetail::ComponentRemoved,
                    format!("component schema {name} removed"),
                ),
                (None, None) => {}
            }
        }
    }

    fn optional_schema(
        &mut self,
        path: &[String],
        scope: Scope,
        old: Option<&Schema>,
        new: Option<&Schema>,
    ) {
        match (old, new) {
            (Some(a), Some(b)) => self.schema(path, scope, a, b),
            (None, Some(_)) => self.emit(
                path,
                scope,
                ChangeDetail::SchemaAdded,
                format!("schema added at {}", ChangePath(path.to_vec())),
            ),
            (Some(_), None) => self.emit(
                path,
                scope,
                ChangeDetail::SchemaRemoved,
                format!("schema removed at {}", ChangePath(path.to_vec())),
            ),
            (None, None) => {}
        }
    }

    fn schema(&mut self, path: &[String], scope: Scope, old: &Schema, new: &Schema) {
        let here = ChangePath(path.to_vec());

        if old.kind != new.kind {
            let effect = type_effect(old.kind, new.kind);
            self.emit(
                path,
                scope,
                ChangeDetail::TypeChanged {
                    from: type_label(old),
                    to: type_label(new),
                    effect,
                },
                format!(
                    "type of {here} changed from {} to {}",
                    type_label(old),
                    type_label(new)
                ),
            );
            return;
        }
        if old.reference != new.reference {
            let from = old.reference.clone().unwrap_or_default();
            let to = new.reference.clone().unwrap_or_default();
            let message = format!("{here} now references {to} instead of {from}");
            self.emit(
                path,
                scope,
                ChangeDetail::ReferenceChanged { from, to },
                message,
            );
            return;
        }

        self.text(
            path,
            scope,
            "description",
            old.description.as_ref(),
            new.description.as_ref(),
        );
        self.example(path, scope, old.example.as_ref(), new.example.as_ref());
        self.default_value(path, scope, old.default.as_ref(), new.default.as_ref());
        self.constraints(path, scope, old, new);

        let names: BTreeSet<&String> = old.properties.keys().chain(new.properties.keys()).collect();
        for name in names {
            let prop_path = child(path, &["properties", name.as_str()]);
            match (old.properties.get(name), new.properties.get(name)) {
                (Some(a), Some(b)) => {
                    let (was, is) = (old.is_required(name), new.is_required(name));
                    if was != is {
                        self.emit(
                            &prop_path,
                            scope,
                            ChangeDetail::PropertyRequiredChanged { from: was, to: is },
                            format!(
                                "property `{name}` at {here} is now {}",
                                if is { "required" } else { "optional" }
                            ),
                        );
                    }
                    self.schema(&prop_path, scope, a, b);
                }
                (None, Some(b)) => {
                    let required = new.is_required(name);
                    let kind = if required { "required" } else { "optional" };
                    self.emit(
                        &prop_path,
                        scope,
                        ChangeDetail::PropertyAdded {
                            required,
                            has_default: b.default.is_some(),
                        },
                        format!("{kind} property `{name}` added at {here}"),
                    );
                }
                (Some(_), None) => {
                    let required = old.is_required(name);
                    let kind = if required { "required" } else { "optional" };
                    self.emit(
                        &prop_path,
                        scope,
                        ChangeDetail::PropertyRemoved { required },
                        format!("{kind} property `{name}` removed at {here}"),
                    );
                }
                (None, None) => {}
            }
        }

        self.optional_schema(
            &child(path, &["items"]),
            scope,
            old.items.as_deref(),
            new.items.as_deref(),
        );
    }

    fn constraints(&mut self, path: &[String], scope: Scope, old: &Schema, new: &Schema) {
        let (a, b) = (&old.constraints, &new.constraints);
        let as_f64 = |v: Option<u64>| v.map(|n| n as f64);

        let bounds = [
            ("minimum", a.minimum, b.minimum, Bound::Lower),
            ("maximum", a.maximum, b.maximum, Bound::Upper),
            ("minLength", as_f64(a.min_length), as_f64(b.min_length), Bound::Lower),
            ("maxLength", as_f64(a.max_length), as_f64(b.max_length), Bound::Upper),
        ];
        for (name, from, to, bound) in bounds {
            if let Some(effect) = bound_effect(from, to, bound) {
                self.constraint(path, scope, name, json!(from), json!(to), effect);
            }
        }

        if let Some(effect) = restriction_effect(a.pattern.as_ref(), b.pattern.as_ref()) {
            self.constraint(path, scope, "pattern", json!(a.pattern), json!(b.pattern), effect);
        }

        let item_bounds = [
            ("minItems", as_f64(a.min_items), as_f64(b.min_items), Bound::Lower),
            ("maxItems", as_f64(a.max_items), as_f64(b.max_items), Bound::Upper),
        ];
        for (name, from, to, bound) in item_bounds {
            if let Some(effect) = bound_effect(from, to, bound) {
                // Item counts are integers; render them without a fraction.
                let render = |v: Option<f64>| json!(v.map(|n| n as u64));
                self.constraint(path, scope, name, render(from), render(to), effect);
            }
        }

        if let Some(effect) = enum_effect(a.enum_values.as_deref(), b.enum_values.as_deref()) {
            self.constraint(
                path,
                scope,
                "enum",
                json!(a.enum_values),
                json!(b.enum_values),
                effect,
            );
        }

        if let Some(effect) = restriction_effect(a.format.as_ref(), b.format.as_ref()) {
            self.constraint(path, scope, "format", json!(a.format), json!(b.format), effect);
        }

        if a.nullable != b.nullable {
            let effect = if b.nullable {
                ConstraintEffect::Loosened
            } else {
                ConstraintEffect::Tightened
            };
            self.constraint(
                path,
                scope,
                "nullable",
                json!(a.nullable),
                json!(b.nullable),
                effect,
            );
        }
    }

    fn constraint(
        &mut self,
        base: &[String],
        scope: Scope,
        name: &str,
        from: Value,
        to: Value,
        effect: ConstraintEffect,
    ) {
        let path = child(base, &[name]);
        let verb = match effect {
            ConstraintEffect::Loosened => "loosened",
            ConstraintEffect::Tightened => "tightened",
            ConstraintEffect::Changed => "changed",
        };
        let message = format!(
            "{name} on {} {verb} ({from} -> {to})",
            ChangePath(base.to_vec())
        );
        self.emit(
            &path,
            scope,
            ChangeDetail::ConstraintChanged {
                constraint: name.to_string(),
                from,
                to,
                effect,
            },
            message,
        );
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Lower,
    Upper,
}

fn bound_effect(from: Option<f64>, to: Option<f64>, bound: Bound) -> Option<ConstraintEffect> {
    match (from, to) {
        (None, None) => None,
        (None, Some(_)) => Some(ConstraintEffect::Tightened),
        (Some(_), None) => Some(ConstraintEffect::Loosened),
        (Some(a), Some(b)) if a == b => None,
        (Some(a), Some(b)) => {
            let raised = b > a;
            let tightened = match bound {
                Bound::Lower => raised,
                Bound::Upper => !raised,
            };
            Some(if tightened {
                ConstraintEffect::Tightened
            } else {
                ConstraintEffect::Loosened
            })
        }
    }
}

/// Pattern and format: adding restricts, removing relaxes, replacing is
/// not comparable.
fn restriction_effect(from: Option<&String>, to: Option<&String>) -> Option<ConstraintEffect> {
    match (from, to) {
        (None, None) => None,
        (None, Some(_)) => Some(ConstraintEffect::Tightened),
        (Some(_), None) => Some(ConstraintEffect::Loosened),
        (Some(a), Some(b)) if a == b => None,
        (Some(_), Some(_)) => Some(ConstraintEffect::Changed),
    }
}

fn enum_effect(from: Option<&[Value]>, to: Option<&[Value]>) -> Option<ConstraintEffect> {
    match (from, to) {
        (None, None) => None,
        (None, Some(_)) => Some(ConstraintEffect::Tightened),
        (Some(_), None) => Some(ConstraintEffect::Loosened),
        (Some(a), Some(b)) if a == b => None,
        (Some(a), Some(b)) => {
            let subset = |x: &[Value], y: &[Value]| x.iter().all(|v| y.contains(v));
            if subset(a, b) {
                Some(ConstraintEffect::Loosened)
            } else if subset(b, a) {
                Some(ConstraintEffect::Tightened)
            } else {
                Some(ConstraintEffect::Changed)
            }
        }
    }
}

/// `integer ⊂ number ⊂ any`, and every other kind `⊂ any`.
pub(crate) fn type_effect(from: SchemaKind, to: SchemaKind) -> TypeEffect {
    match (from, to) {
        (SchemaKind::Integer, SchemaKind::Number) => TypeEffect::Widened,
        (SchemaKind::Number, SchemaKind::Integer) => TypeEffect::Narrowed,
        (_, SchemaKind::Any) => TypeEffect::Widened,
        (SchemaKind::Any, _) => TypeEffect::Narrowed,
        _ => TypeEffect::Incompatible,
    }
}

fn type_label(schema: &Schema) -> String {
    match (&schema.kind, &schema.reference) {
        (SchemaKind::Reference, Some(target)) => target.clone(),
        (kind, _) => kind.as_str().to_string(),
    }
}

fn route_path(path: &str) -> Vec<String> {
    vec!["routes".to_string(), path.to_string()]
}

fn child(base: &[String], segments: &[&str]) -> Vec<String> {
    let mut out = base.to_vec();
    out.extend(segments.iter().map(|s| s.to_string()));
    out
}

fn op_label(method: Method, path: &str) -> String {
    format!("{} {path}", method.as_str().to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_lattice() {
        assert_eq!(
            type_effect(SchemaKind::Integer, SchemaKind::Number),
            TypeEffect::Widened
        );
        assert_eq!(
            type_effect(SchemaKind::Number, SchemaKind::Integer),
            TypeEffect::Narrowed
        );
        assert_eq!(
            type_effect(SchemaKind::String, SchemaKind::Any),
            TypeEffect::Widened
        );
        assert_eq!(
            type_effect(SchemaKind::Any, SchemaKind::Object),
            TypeEffect::Narrowed
        );
        assert_eq!(
            type_effect(SchemaKind::String, SchemaKind::Integer),
            TypeEffect::Incompatible
        );
    }

    #[test]
    fn bounds_move_in_opposite_directions() {
        assert_eq!(
            bound_effect(Some(1.0), Some(5.0), Bound::Lower),
            Some(ConstraintEffect::Tightened)
        );
        assert_eq!(
            bound_effect(Some(1.0), Some(5.0), Bound::Upper),
            Some(ConstraintEffect::Loosened)
        );
        assert_eq!(
            bound_effect(None, Some(5.0), Bound::Upper),
            Some(ConstraintEffect::Tightened)
        );
        assert_eq!(
            bound_effect(Some(5.0), None, Bound::Lower),
            Some(ConstraintEffect::Loosened)
        );
        assert_eq!(bound_effect(Some(5.0), Some(5.0), Bound::Lower), None);
    }

    #[test]
    fn enum_superset_loosens_subset_tightens() {
        let ab = vec![json!("a"), json!("b")];
        let abc = vec![json!("a"), json!("b"), json!("c")];
        let xy = vec![json!("x"), json!("y")];
        assert_eq!(
            enum_effect(Some(ab.as_slice()), Some(abc.as_slice())),
            Some(ConstraintEffect::Loosened)
        );
        assert_eq!(
            enum_effect(Some(abc.as_slice()), Some(ab.as_slice())),
            Some(ConstraintEffect::Tightened)
        );
        assert_eq!(
            enum_effect(Some(ab.as_slice()), Some(xy.as_slice())),
            Some(ConstraintEffect::Changed)
        );
        assert_eq!(enum_effect(None, Some(ab.as_slice())), Some(ConstraintEffect::Tightened));
    }

    #[test]
    fn replaced_pattern_is_changed() {
        let a = "^a".to_string();
        let b = "^b".to_string();
        assert_eq!(
            restriction_effect(Some(&a), Some(&b)),
            Some(ConstraintEffect::Changed)
        );
        assert_eq!(
            restriction_effect(Some(&a), None),
            Some(ConstraintEffect::Loosened)
        );
        assert_eq!(restriction_effect(Some(&a), Some(&a)), None);
    }
}
