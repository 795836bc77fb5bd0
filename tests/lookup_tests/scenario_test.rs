use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

use lookup::model::{PropertyId, PropertyKind, PropertyRecord};
use lookup::provider::in_memory::InMemoryGraph;
use lookup::value::{PageValue, RangeValue};
use lookup::error::{EvaluationError, LookupError};
use lookup::value::ErrorValue;
use lookup::ConcreteValue;

use super::{annotation, entry, env, eval, SITE};

fn integers(values: &[i64]) -> Vec<ConcreteValue> {
    values.iter().map(|v| ConcreteValue::integer(*v)).collect()
}

fn page_values(value: ConcreteValue) -> Vec<ConcreteValue> {
    match value {
        ConcreteValue::Page(PageValue { values, .. }) => values,
        other => panic!("expected a page, got {:?}", other),
    }
}

#[tokio::test]
async fn test_date_parsing() {
    let env = env(InMemoryGraph::new(SITE)).await;

    let date = eval(&env.ctx, "date(\"2020-01-10\")").await;
    assert_eq!(date.to_json(), json!({"type": "Date", "value": "2020-01-10"}));

    let invalid = eval(&env.ctx, "date(\"2070-02-29\")").await;
    let ConcreteValue::Error(error) = invalid else {
        panic!("expected an error value, got {:?}", invalid);
    };
    assert_eq!(error.error.to_string(), "Invalid date.");
}

#[tokio::test]
async fn test_value_inherited_from_closest_ancestor() {
    let graph = InMemoryGraph::new(SITE)
        .with_entry_type("t", "Thing")
        .with_entry("a", "A", "t")
        .with_entry("b", "B", "t")
        .with_entry("c", "C", "t")
        .with_property("isA", "Is a", PropertyKind::IsA)
        .with_property_record(PropertyRecord {
            id: PropertyId::new("prop1"),
            key: "prop1".to_string(),
            name: "Prop 1".to_string(),
            kind: PropertyKind::Value,
            inheritable: true,
            default: None,
        })
        .with_relationship("c", "isA", "b")
        .with_relationship("b", "isA", "a")
        .with_value("a", "prop1", "\"from A\"");
    let env = env(graph).await;

    let value = eval(&env.ctx, "get([[/entry/c]], prop=[[/prop/prop1]])").await;
    assert_eq!(value.unannotated(), &ConcreteValue::string("from A"));
    assert_eq!(annotation(&value, "inheritedFrom"), Some(&entry("a")));

    // Looking the property up by key gives the same answer.
    let by_key = eval(&env.ctx, "[[/entry/c]].get(prop=\"prop1\")").await;
    assert_eq!(by_key, value);

    // On the holder itself there is no provenance annotation.
    let own = eval(&env.ctx, "get([[/entry/a]], prop=[[/prop/prop1]])").await;
    assert_eq!(own, ConcreteValue::string("from A"));
}

#[tokio::test]
async fn test_sort_descending() {
    let env = env(InMemoryGraph::new(SITE)).await;
    let sorted = eval(&env.ctx, "[18,5,64,0,-3,-18].sort(reverse=true)").await;
    assert_eq!(page_values(sorted), integers(&[64, 18, 5, 0, -3, -18]));
}

#[tokio::test]
async fn test_slice_of_string() {
    let env = env(InMemoryGraph::new(SITE)).await;
    let page = eval(&env.ctx, "slice(\"abcdefghijk\", start=3, size=4)").await;
    let ConcreteValue::Page(page) = page else {
        panic!("expected a page");
    };
    assert_eq!(
        page.values,
        ["d", "e", "f", "g"]
            .iter()
            .map(|s| ConcreteValue::string(*s))
            .collect::<Vec<_>>()
    );
    assert_eq!(page.started_at, 3);
    assert_eq!(page.page_size, 4);
    assert_eq!(page.total_count, 11);
}

#[tokio::test]
async fn test_annotations_merge() {
    let env = env(InMemoryGraph::new(SITE)).await;
    let value = eval(&env.ctx, "123.annotate(a=1,b=1).annotate(a=2,c=2)").await;
    assert_eq!(value.unannotated(), &ConcreteValue::integer(123));
    assert_eq!(annotation(&value, "a"), Some(&ConcreteValue::integer(2)));
    assert_eq!(annotation(&value, "b"), Some(&ConcreteValue::integer(1)));
    assert_eq!(annotation(&value, "c"), Some(&ConcreteValue::integer(2)));
}

#[tokio::test]
async fn test_range_across_numeric_types() {
    let env = env(InMemoryGraph::new(SITE)).await;
    let range = eval(&env.ctx, "range([3,15,-2.0,12.0])").await;
    assert_eq!(
        range,
        ConcreteValue::Range(Box::new(RangeValue {
            min: ConcreteValue::quantity(Decimal::from_str("-2.0").unwrap(), None),
            max: ConcreteValue::integer(15),
        }))
    );
}

fn evaluation_error(value: ConcreteValue) -> EvaluationError {
    match value {
        ConcreteValue::Error(ErrorValue {
            error: LookupError::Evaluation(error),
        }) => error,
        other => panic!("expected an evaluation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_range_rejects_empty_and_mixed_input() {
    let env = env(InMemoryGraph::new(SITE)).await;

    let empty = eval(&env.ctx, "range([])").await;
    assert_eq!(evaluation_error(empty), EvaluationError::EmptyRange);

    let only_nulls = eval(&env.ctx, "range([null, null])").await;
    assert_eq!(evaluation_error(only_nulls), EvaluationError::EmptyRange);

    let mixed = eval(&env.ctx, "range([1, \"a\"])").await;
    assert!(matches!(
        evaluation_error(mixed),
        EvaluationError::Incomparable { .. }
    ));
}

#[tokio::test]
async fn test_range_expands_nested_ranges() {
    let env = env(InMemoryGraph::new(SITE)).await;
    let range = eval(&env.ctx, "range([range([1, 5]), 9, null])").await;
    assert_eq!(
        range,
        ConcreteValue::Range(Box::new(RangeValue {
            min: ConcreteValue::integer(1),
            max: ConcreteValue::integer(9),
        }))
    );
}
