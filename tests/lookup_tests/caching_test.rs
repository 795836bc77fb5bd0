use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

use lookup::error::{Error, LookupError};
use lookup::{ConcreteValue, Value};

use super::{env, eval, taxonomy};

#[tokio::test]
async fn test_repeated_evaluation_hits_the_cache() {
    let env = env(taxonomy()).await;

    let first = eval(&env.ctx, "allEntries().count()").await;
    let executed = env.graph.queries_executed();
    assert_eq!(executed, 1);

    let second = eval(&env.ctx, "allEntries().count()").await;
    assert_eq!(first, second);
    assert_eq!(env.graph.queries_executed(), executed);
    assert!(env.ctx.cached_len() > 0);
}

#[tokio::test]
async fn test_bound_variables_bypass_the_cache() {
    let env = env(taxonomy()).await;
    let scope = env
        .ctx
        .child_context_with_variables(BTreeMap::from([(
            "v".to_string(),
            Value::from(ConcreteValue::integer(7)),
        )]))
        .unwrap();

    let before = env.ctx.cached_len();
    assert_eq!(eval(&scope, "v").await, ConcreteValue::integer(7));
    assert_eq!(env.ctx.cached_len(), before);

    let undefined = eval(&env.ctx, "v").await;
    assert!(matches!(undefined, ConcreteValue::Error(_)));
}

#[test]
fn test_reserved_names_cannot_be_bound() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let env = runtime.block_on(env(taxonomy()));
    let result = env.ctx.child_context_with_variables(BTreeMap::from([(
        "this".to_string(),
        Value::null(),
    )]));
    assert!(result.is_err());
}

#[tokio::test]
async fn test_errors_are_captured_per_value() {
    let env = env(taxonomy()).await;
    let list = eval(&env.ctx, "[1, date(\"x\"), 3]").await;
    let ConcreteValue::List(items) = list else {
        panic!("expected a list");
    };
    assert_eq!(items[0], ConcreteValue::integer(1));
    assert!(matches!(items[1], ConcreteValue::Error(_)));
    assert_eq!(items[2], ConcreteValue::integer(3));
    assert_eq!(
        items[1].to_json()["errorClass"],
        serde_json::json!("EvaluationError")
    );
}

#[tokio::test]
async fn test_parse_errors_are_returned() {
    let env = env(taxonomy()).await;
    let result = env.ctx.evaluate_text("frobnicate()").await;
    assert!(matches!(result, Err(Error::Lookup(LookupError::Parse(_)))));

    let result = env.ctx.evaluate_text("count(1, 2)").await;
    assert!(matches!(result, Err(Error::Lookup(LookupError::Parse(_)))));
}
