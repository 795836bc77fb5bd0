use pretty_assertions::assert_eq;
use proptest::prelude::*;

use lookup::{parse_lookup_string, FunctionRegistry};

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i64>().prop_map(|i| i.to_string()),
        "[a-z ]{0,8}".prop_map(|s| format!("\"{}\"", s)),
        Just("true".to_string()),
        Just("null".to_string()),
        Just("this".to_string()),
        "[a-z][a-z0-9]{0,5}".prop_map(|id| format!("[[/entry/{}]]", id)),
    ]
}

fn expression() -> impl Strategy<Value = String> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4)
                .prop_map(|items| format!("[{}]", items.join(", "))),
            inner.clone().prop_map(|e| format!("count({})", e)),
            inner.clone().prop_map(|e| format!("{}.first()", e)),
            inner.clone().prop_map(|e| format!("{}.name", e)),
            (inner.clone(), inner.clone())
                .prop_map(|(test, then)| format!("if({}, then={})", test, then)),
            inner
                .clone()
                .prop_map(|e| format!("[1, 2].map(apply=(x -> [x, {}]))", e)),
        ]
    })
}

proptest! {
    #[test]
    fn test_canonical_form_reparses_to_the_same_tree(text in expression()) {
        let registry = FunctionRegistry::builtin();
        let parsed = parse_lookup_string(&text, &registry).unwrap();
        let canonical = parsed.to_string();
        let reparsed = parse_lookup_string(&canonical, &registry).unwrap();
        prop_assert_eq!(&parsed, &reparsed);
        prop_assert_eq!(reparsed.to_string(), canonical);
    }
}

#[test]
fn test_canonical_forms() {
    let registry = FunctionRegistry::builtin();
    let cases = [
        ("count(this)", "this.count()"),
        ("ancestors([[/entry/x]])", "[[/entry/x]].ancestors()"),
        ("[1,2,  3]", "[1, 2, 3]"),
        ("map([1], apply=(v->v))", "[1].map(apply=(v -> v))"),
        ("not(true)", "not(true)"),
    ];
    for (text, expected) in cases {
        let parsed = parse_lookup_string(text, &registry).unwrap();
        assert_eq!(parsed.to_string(), expected, "canonical form of {}", text);
    }
}
