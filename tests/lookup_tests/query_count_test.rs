use serde_json::json;
use std::sync::Arc;

use lookup::error::{Error, StoreError};
use lookup::model::SiteId;
use lookup::provider::{
    MockGraphTransaction, MockInheritanceResolver, MockPermissionProvider, MockPluginRegistry,
    Providers,
};
use lookup::query::{Predicate, Row, Terminal};
use lookup::{ConcreteValue, EvalContext, LookupConfig};

fn row(id: &str) -> Row {
    Row::from([
        ("id".to_string(), json!(id)),
        ("annotations".to_string(), json!({})),
    ])
}

async fn context(transaction: MockGraphTransaction) -> EvalContext {
    let mut permissions = MockPermissionProvider::new();
    permissions
        .expect_predicate_for()
        .returning(|_, _, _| Ok(Predicate::True));
    permissions
        .expect_has_permission()
        .returning(|_, _, _| Ok(true));
    let mut plugins = MockPluginRegistry::new();
    plugins
        .expect_functions_for_site()
        .returning(|_| Ok(Vec::new()));

    let providers = Providers {
        transaction: Arc::new(transaction),
        permissions: Arc::new(permissions),
        inheritance: Arc::new(MockInheritanceResolver::new()),
        plugins: Arc::new(plugins),
    };
    EvalContext::new(&providers, LookupConfig::default(), SiteId::new("site"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_short_first_page_skips_the_count_query() {
    let mut transaction = MockGraphTransaction::new();
    transaction
        .expect_execute()
        .withf(|query| query.terminal == Terminal::Page { skip: 0, limit: 10 })
        .times(1)
        .returning(|_| Ok(vec![row("a"), row("b"), row("c")]));

    let ctx = context(transaction).await;
    let value = ctx
        .evaluate_text("allEntries()")
        .await
        .unwrap()
        .make_concrete()
        .await
        .unwrap();
    let ConcreteValue::Page(page) = value else {
        panic!("expected a page");
    };
    assert_eq!(page.values.len(), 3);
    assert_eq!(page.total_count, 3);
}

#[tokio::test]
async fn test_full_first_page_runs_a_count_query() {
    let mut transaction = MockGraphTransaction::new();
    transaction
        .expect_execute()
        .withf(|query| matches!(query.terminal, Terminal::Page { .. }))
        .times(1)
        .returning(|_| Ok((0..10).map(|i| row(&format!("e{}", i))).collect()));
    transaction
        .expect_execute()
        .withf(|query| query.terminal == Terminal::Count)
        .times(1)
        .returning(|_| Ok(vec![Row::from([("count".to_string(), json!(42))])]));

    let ctx = context(transaction).await;
    let value = ctx
        .evaluate_text("allEntries()")
        .await
        .unwrap()
        .make_concrete()
        .await
        .unwrap();
    let ConcreteValue::Page(page) = value else {
        panic!("expected a page");
    };
    assert_eq!(page.values.len(), 10);
    assert_eq!(page.total_count, 42);
}

#[tokio::test]
async fn test_store_errors_are_not_captured() {
    let mut transaction = MockGraphTransaction::new();
    transaction
        .expect_execute()
        .returning(|_| Err(StoreError::Unavailable("connection reset".to_string())));

    let ctx = context(transaction).await;
    let result = ctx.evaluate_text("allEntries().count()").await;
    assert!(matches!(result, Err(Error::Store(StoreError::Unavailable(_)))));
}
