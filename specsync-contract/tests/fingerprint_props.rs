//! Property tests for fingerprint invariance and round-trip stability.

use proptest::prelude::*;
use specsync_contract::{fingerprint, load, serialize};

#[derive(Debug, Clone)]
struct Prop {
    name: String,
    ty: &'static str,
    required: bool,
    description: Option<String>,
}

fn prop_strategy() -> impl Strategy<Value = Prop> {
    (
        "p[a-z]{1,7}",
        prop_oneof![
            Just("string"),
            Just("integer"),
            Just("number"),
            Just("boolean")
        ],
        any::<bool>(),
        proptest::option::of("[A-Za-z ]{0,16}"),
    )
        .prop_map(|(name, ty, required, description)| Prop {
            name,
            ty,
            required,
            description,
        })
}

fn props_strategy() -> impl Strategy<Value = Vec<Prop>> {
    proptest::collection::vec(prop_strategy(), 0..8).prop_map(|mut v| {
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v.dedup_by(|a, b| a.name == b.name);
        v
    })
}

/// Render a contract with properties (and keys within each property) in
/// the given order, using either block or flow YAML.
fn render(props: &[Prop], flow: bool) -> String {
    let required: Vec<&str> = props
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();
    let mut out = String::from("paths:\n  /things:\n    get:\n      operationId: listThings\n      responses:\n        '200':\n          description: ok\n          schema:\n");
    if !required.is_empty() {
        out.push_str(&format!("            required: [{}]\n", required.join(", ")));
    }
    out.push_str("            type: object\n            properties:\n");
    if props.is_empty() {
        out.push_str("              {}\n");
    }
    for p in props {
        let desc = p
            .description
            .as_ref()
            .map(|d| format!("\"{d}\""))
            .unwrap_or_else(|| "null".to_string());
        if flow {
            out.push_str(&format!(
                "              {}: {{ description: {}, type: {} }}\n",
                p.name, desc, p.ty
            ));
        } else {
            out.push_str(&format!(
                "              {}:\n                type: {}\n                description: {}\n",
                p.name, p.ty, desc
            ));
        }
    }
    out
}

proptest! {
    #[test]
    fn fingerprint_ignores_key_order_and_layout(props in props_strategy()) {
        let forward = render(&props, false);
        let mut reversed = props.clone();
        reversed.reverse();
        let backward = render(&reversed, true);

        let a = load("things", forward.as_bytes()).expect("forward loads");
        let b = load("things", backward.as_bytes()).expect("backward loads");
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(&a, &b);
    }

    #[test]
    fn load_serialize_load_is_identity(props in props_strategy()) {
        let src = render(&props, false);
        let doc = load("things", src.as_bytes()).expect("loads");
        let bytes = serialize(&doc).expect("serializes");
        let again = load("things", &bytes).expect("reloads");
        prop_assert_eq!(fingerprint(&again).unwrap(), fingerprint(&doc).unwrap());
        prop_assert_eq!(again, doc);
    }
}
