mod caching_test;
mod functions_test;
mod pagination_test;
mod query_count_test;
mod round_trip_test;
mod scenario_test;
mod traversal_test;

use std::sync::Arc;

use lookup::model::{EntryId, PropertyId, PropertyKind, PropertyRecord, SiteId, UserId};
use lookup::provider::in_memory::{AccessPolicy, InMemoryGraph};
use lookup::provider::Providers;
use lookup::{ConcreteValue, EvalContext, LookupConfig};

pub const SITE: &str = "site";

pub struct TestEnv {
    pub graph: Arc<InMemoryGraph>,
    pub ctx: EvalContext,
}

pub async fn env(graph: InMemoryGraph) -> TestEnv {
    env_with_config(graph, LookupConfig::default()).await
}

pub async fn env_with_config(graph: InMemoryGraph, config: LookupConfig) -> TestEnv {
    let graph = Arc::new(graph);
    let providers = Providers::from_backend(graph.clone());
    let ctx = EvalContext::new(&providers, config, SiteId::new(SITE))
        .await
        .expect("context");
    TestEnv { graph, ctx }
}

/// Evaluates `text` and forces the result into one page.
pub async fn eval(ctx: &EvalContext, text: &str) -> ConcreteValue {
    ctx.evaluate_text(text)
        .await
        .unwrap_or_else(|e| panic!("{} failed: {}", text, e))
        .make_concrete()
        .await
        .unwrap_or_else(|e| panic!("{} could not be forced: {}", text, e))
}

/// Ids of the entries in a page or list, annotations stripped.
pub fn entry_ids(value: &ConcreteValue) -> Vec<String> {
    let items = match value {
        ConcreteValue::Page(page) => &page.values,
        ConcreteValue::List(items) => items,
        other => panic!("expected a page or a list, got {:?}", other),
    };
    items
        .iter()
        .map(|item| match item.unannotated() {
            ConcreteValue::Entry(id) => id.to_string(),
            other => panic!("expected an entry, got {:?}", other),
        })
        .collect()
}

pub fn annotation<'a>(value: &'a ConcreteValue, name: &str) -> Option<&'a ConcreteValue> {
    match value {
        ConcreteValue::Annotated(annotated) => annotated.annotation(name),
        _ => None,
    }
}

/// A small taxonomy:
///
/// ```text
/// life ← plants ← oak
///               ← maple
///               ← hidden (restricted type)
/// ```
pub fn taxonomy() -> InMemoryGraph {
    InMemoryGraph::new(SITE)
        .with_entry_type("genus", "Genus")
        .with_entry_type("species", "Species")
        .with_entry_type("secret", "Secret")
        .with_entry("life", "Life", "genus")
        .with_entry("plants", "Plants", "genus")
        .with_entry("oak", "Oak", "species")
        .with_entry("maple", "Maple", "species")
        .with_entry("hidden", "Hidden", "secret")
        .with_property("parent", "Parent", PropertyKind::IsA)
        .with_property("related", "Related to", PropertyKind::Relationship)
        .with_property("leaf", "Leaf shape", PropertyKind::Value)
        .with_property_record(PropertyRecord {
            id: PropertyId::new("habitat"),
            key: "habitat".to_string(),
            name: "Habitat".to_string(),
            kind: PropertyKind::Value,
            inheritable: true,
            default: None,
        })
        .with_property_record(PropertyRecord {
            id: PropertyId::new("label"),
            key: "label".to_string(),
            name: "Label".to_string(),
            kind: PropertyKind::Auto,
            inheritable: false,
            default: Some("this.name".to_string()),
        })
        .with_relationship("plants", "parent", "life")
        .with_relationship("oak", "parent", "plants")
        .with_relationship("maple", "parent", "plants")
        .with_relationship("hidden", "parent", "plants")
        .with_relationship("oak", "related", "maple")
        .with_value("life", "habitat", "\"Earth\"")
        .with_value("oak", "leaf", "\"lobed\"")
        .with_policy(AccessPolicy {
            restricted_types: vec!["secret".into()],
            privileged_users: vec![UserId::new("admin")],
            hidden_properties: vec![],
        })
}

pub fn entry(id: &str) -> ConcreteValue {
    ConcreteValue::Entry(EntryId::new(id))
}
