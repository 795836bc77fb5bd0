use pretty_assertions::assert_eq;

use lookup::model::{PropertyId, PropertyKind, PropertyRecord, UserId};
use lookup::provider::in_memory::{AccessPolicy, InMemoryGraph};
use lookup::ConcreteValue;

use super::{annotation, entry_ids, env, eval, taxonomy, SITE};

fn cycle() -> InMemoryGraph {
    InMemoryGraph::new(SITE)
        .with_entry_type("t", "Thing")
        .with_entry("a", "A", "t")
        .with_entry("b", "B", "t")
        .with_entry("c", "C", "t")
        .with_property("isA", "Is a", PropertyKind::IsA)
        .with_relationship("a", "isA", "b")
        .with_relationship("b", "isA", "c")
        .with_relationship("c", "isA", "a")
}

fn distances(value: &ConcreteValue) -> Vec<Option<ConcreteValue>> {
    let ConcreteValue::Page(page) = value else {
        panic!("expected a page");
    };
    page.values
        .iter()
        .map(|item| annotation(item, "distance").cloned())
        .collect()
}

#[tokio::test]
async fn test_cyclic_ancestors_visit_each_entry_once() {
    let env = env(cycle()).await;

    let ancestors = eval(&env.ctx, "[[/entry/a]].ancestors()").await;
    assert_eq!(entry_ids(&ancestors), vec!["b", "c"]);
    assert_eq!(
        distances(&ancestors),
        vec![
            Some(ConcreteValue::integer(1)),
            Some(ConcreteValue::integer(2))
        ]
    );

    let count = eval(&env.ctx, "[[/entry/a]].ancestors().count()").await;
    assert_eq!(count, ConcreteValue::integer(2));

    let with_self = eval(&env.ctx, "[[/entry/a]].andAncestors()").await;
    assert_eq!(entry_ids(&with_self), vec!["a", "b", "c"]);
    assert_eq!(distances(&with_self)[0], Some(ConcreteValue::integer(0)));
}

#[tokio::test]
async fn test_traversal_depth_is_bounded() {
    let config = lookup::LookupConfig {
        max_traversal_depth: 1,
        ..Default::default()
    };
    let env = super::env_with_config(cycle(), config).await;
    let ancestors = eval(&env.ctx, "[[/entry/a]].ancestors()").await;
    assert_eq!(entry_ids(&ancestors), vec!["b"]);
}

#[tokio::test]
async fn test_descendants_are_ordered_by_distance_then_name() {
    let env = env(taxonomy()).await;
    let descendants = eval(&env.ctx, "[[/entry/life]].descendants()").await;
    assert_eq!(entry_ids(&descendants), vec!["plants", "maple", "oak"]);
}

#[tokio::test]
async fn test_restricted_entries_need_privilege() {
    let env = env(taxonomy()).await;
    let admin = env.ctx.detached().with_user(Some(UserId::new("admin")));
    let descendants = eval(&admin, "[[/entry/life]].descendants()").await;
    assert_eq!(
        entry_ids(&descendants),
        vec!["plants", "hidden", "maple", "oak"]
    );

    let hidden = eval(&env.ctx, "entry(\"hidden\")").await;
    assert!(matches!(hidden, ConcreteValue::Error(_)));
    let hidden = eval(&admin, "entry(\"hidden\")").await;
    assert_eq!(hidden, super::entry("hidden"));
}

#[tokio::test]
async fn test_filter_by_entry_type() {
    let env = env(taxonomy()).await;

    let species = eval(&env.ctx, "allEntries().filter(entryType=[[/etype/species]])").await;
    assert_eq!(entry_ids(&species), vec!["maple", "oak"]);

    let rest = eval(
        &env.ctx,
        "allEntries().filter(excludeEntryType=[ [[/etype/species]] ])",
    )
    .await;
    assert_eq!(entry_ids(&rest), vec!["life", "plants"]);

    let distant_species = eval(
        &env.ctx,
        "[[/entry/life]].descendants().filter(entryType=[[/etype/species]])",
    )
    .await;
    assert_eq!(entry_ids(&distant_species), vec!["maple", "oak"]);
    assert_eq!(
        distances(&distant_species),
        vec![
            Some(ConcreteValue::integer(2)),
            Some(ConcreteValue::integer(2))
        ]
    );
}

#[tokio::test]
async fn test_set_operations() {
    let env = env(taxonomy()).await;

    let both = eval(
        &env.ctx,
        "[[/entry/life]].descendants().intersection(with=allEntries().filter(entryType=[[/etype/species]]))",
    )
    .await;
    assert_eq!(entry_ids(&both), vec!["maple", "oak"]);
    assert_eq!(
        distances(&both),
        vec![
            Some(ConcreteValue::integer(2)),
            Some(ConcreteValue::integer(2))
        ]
    );

    let without = eval(
        &env.ctx,
        "[[/entry/life]].descendants().difference(without=[[/entry/plants]])",
    )
    .await;
    assert_eq!(entry_ids(&without), vec!["maple", "oak"]);

    let either = eval(&env.ctx, "[[/entry/oak]].union(with=[[/entry/life]])").await;
    assert_eq!(entry_ids(&either), vec!["life", "oak"]);
}

#[tokio::test]
async fn test_inherited_from_hides_restricted_ancestors() {
    let graph = InMemoryGraph::new(SITE)
        .with_entry_type("t", "Thing")
        .with_entry_type("secret", "Secret")
        .with_entry("vault", "Vault", "secret")
        .with_entry("child", "Child", "t")
        .with_entry("other", "Other", "t")
        .with_property("parent", "Parent", PropertyKind::IsA)
        .with_property_record(PropertyRecord {
            id: PropertyId::new("linked"),
            key: "linked".to_string(),
            name: "Linked".to_string(),
            kind: PropertyKind::Relationship,
            inheritable: true,
            default: None,
        })
        .with_relationship("child", "parent", "vault")
        .with_relationship("vault", "linked", "other")
        .with_policy(AccessPolicy {
            restricted_types: vec!["secret".into()],
            privileged_users: vec![UserId::new("admin")],
            hidden_properties: vec![],
        });
    let env = env(graph).await;
    let expression = "[[/entry/child]].get(prop=[[/prop/linked]])";

    let linked = eval(&env.ctx, expression).await;
    assert_eq!(entry_ids(&linked), vec!["other"]);
    let ConcreteValue::Page(page) = &linked else {
        panic!("expected a page");
    };
    assert_eq!(annotation(&page.values[0], "inheritedFrom"), None);

    let admin = env.ctx.detached().with_user(Some(UserId::new("admin")));
    let linked = eval(&admin, expression).await;
    let ConcreteValue::Page(page) = &linked else {
        panic!("expected a page");
    };
    assert_eq!(
        annotation(&page.values[0], "inheritedFrom"),
        Some(&super::entry("vault"))
    );
}
