use pretty_assertions::assert_eq;

use lookup::provider::in_memory::InMemoryGraph;
use lookup::ConcreteValue;

use super::{entry_ids, env, SITE};

fn many_entries(count: usize) -> InMemoryGraph {
    (0..count).fold(
        InMemoryGraph::new(SITE).with_entry_type("t", "Thing"),
        |graph, i| graph.with_entry(&format!("e{:02}", i), &format!("Entry {:02}", i), "t"),
    )
}

#[tokio::test]
async fn test_slices_concatenate_to_the_whole() {
    let env = env(many_entries(25)).await;
    let all = env.ctx.evaluate_text("allEntries()").await.unwrap();
    assert!(all.is_lazy());

    assert_eq!(all.get_count().await.unwrap(), 25);

    let whole = all.get_slice(0, 25).await.unwrap();
    let mut pieces = Vec::new();
    for offset in [0, 10, 20] {
        pieces.extend(all.get_slice(offset, 10).await.unwrap());
    }
    assert_eq!(pieces, whole);
    assert!(all.get_slice(25, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forcing_is_idempotent() {
    let env = env(many_entries(25)).await;
    let all = env.ctx.evaluate_text("allEntries()").await.unwrap();

    let first = all.make_concrete().await.unwrap();
    let second = all.make_concrete().await.unwrap();
    assert_eq!(first, second);

    let ConcreteValue::Page(page) = first else {
        panic!("expected a page");
    };
    assert_eq!(page.values.len(), 10);
    assert_eq!(page.page_size, 10);
    assert_eq!(page.total_count, 25);
    assert_eq!(
        page.source.map(|source| source.expression.to_string()),
        Some("allEntries()".to_string())
    );
}

#[tokio::test]
async fn test_context_page_size() {
    let env = env(many_entries(7)).await;
    let ctx = env.ctx.detached().with_page_size(3);
    let page = ctx
        .evaluate_text("allEntries()")
        .await
        .unwrap()
        .make_concrete()
        .await
        .unwrap();
    assert_eq!(entry_ids(&page), vec!["e00", "e01", "e02"]);
    let ConcreteValue::Page(page) = page else {
        panic!("expected a page");
    };
    assert_eq!(page.total_count, 7);
}

#[tokio::test]
async fn test_slice_function_pages_lazily() {
    let env = env(many_entries(25)).await;
    let page = super::eval(&env.ctx, "allEntries().slice(start=20, end=-1)").await;
    assert_eq!(entry_ids(&page), vec!["e20", "e21", "e22", "e23"]);
    let ConcreteValue::Page(page) = page else {
        panic!("expected a page");
    };
    assert_eq!(page.started_at, 20);
    assert_eq!(page.total_count, 25);
}

#[tokio::test]
async fn test_length_of_a_lazy_set_counts_every_entry() {
    let env = env(many_entries(7)).await;
    let ctx = env.ctx.detached().with_page_size(2);
    assert_eq!(
        super::eval(&ctx, "allEntries().length").await,
        ConcreteValue::integer(7)
    );
    assert_eq!(
        super::eval(&ctx, "allEntries().totalCount").await,
        ConcreteValue::integer(7)
    );
    assert_eq!(
        super::eval(&ctx, "allEntries().slice(start=0, size=3).length").await,
        ConcreteValue::integer(3)
    );
}
