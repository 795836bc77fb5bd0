use pretty_assertions::assert_eq;
use serde_json::json;

use lookup::model::{EntryId, EntryTypeId, PropertyId, PropertyKind, PropertyRecord};
use lookup::provider::in_memory::InMemoryGraph;
use lookup::LookupConfig;
use lookup::value::{GraphBorder, GraphRelationship};
use lookup::ConcreteValue;

use super::{annotation, entry, entry_ids, env, env_with_config, eval, taxonomy};

fn error_message(value: &ConcreteValue) -> String {
    match value {
        ConcreteValue::Error(error) => error.error.to_string(),
        other => panic!("expected an error value, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scalar_functions() {
    let env = env(taxonomy()).await;
    let ctx = &env.ctx;

    assert_eq!(eval(ctx, "[1, 2, 3].count()").await, ConcreteValue::integer(3));
    assert_eq!(eval(ctx, "\"héllo\".count()").await, ConcreteValue::integer(5));
    assert_eq!(eval(ctx, "[7, 8].first()").await, ConcreteValue::integer(7));
    assert_eq!(eval(ctx, "[].first()").await, ConcreteValue::Null);
    assert_eq!(eval(ctx, "not(0)").await, ConcreteValue::Boolean(true));
    assert_eq!(eval(ctx, "not(\"x\")").await, ConcreteValue::Boolean(false));
    assert_eq!(
        eval(ctx, "if(true, then=\"yes\", else=\"no\")").await,
        ConcreteValue::string("yes")
    );
    assert_eq!(eval(ctx, "if([], then=1)").await, ConcreteValue::Null);
    assert_eq!(
        eval(ctx, "markdown(\"*hi*\")").await,
        ConcreteValue::Markdown("*hi*".to_string())
    );
    assert_eq!(
        eval(ctx, "date(\"2021-03\")").await.to_json(),
        json!({"type": "PartialDate", "value": "2021-03"})
    );
}

#[tokio::test]
async fn test_if_only_evaluates_the_chosen_branch() {
    let env = env(taxonomy()).await;
    let value = eval(&env.ctx, "if(false, then=date(\"nope\"), else=1)").await;
    assert_eq!(value, ConcreteValue::integer(1));
}

#[tokio::test]
async fn test_count_requires_a_countable_value() {
    let env = env(taxonomy()).await;
    let value = eval(&env.ctx, "count(5)").await;
    assert!(error_message(&value).contains("cannot be converted"));
}

#[tokio::test]
async fn test_records_and_attributes() {
    let env = env(taxonomy()).await;
    let ctx = &env.ctx;

    assert_eq!(eval(ctx, "entry(\"oak\")").await, entry("oak"));
    assert_eq!(eval(ctx, "entry(\"oak\").name").await, ConcreteValue::string("Oak"));
    assert_eq!(
        eval(ctx, "entryType([[/entry/oak]])").await,
        ConcreteValue::EntryType(EntryTypeId::new("species"))
    );
    assert_eq!(
        eval(ctx, "entryType(\"genus\").name").await,
        ConcreteValue::string("Genus")
    );
    assert_eq!(
        eval(ctx, "prop(\"habitat\")").await,
        ConcreteValue::Property(PropertyId::new("habitat"))
    );
    assert_eq!(eval(ctx, "\"abc\".length").await, ConcreteValue::integer(3));
    assert_eq!(eval(ctx, "date(\"2020-01-10\").month").await, ConcreteValue::integer(1));
    assert_eq!(eval(ctx, "[[/entry/oak]].note").await, ConcreteValue::Null);

    let unknown = eval(ctx, "[[/entry/oak]].colour").await;
    assert!(error_message(&unknown).contains("colour"));

    let missing = eval(ctx, "entry(\"nothing\")").await;
    assert_eq!(error_message(&missing), "Entry \"nothing\" not found.");
}

#[tokio::test]
async fn test_this_needs_a_current_entry() {
    let env = env(taxonomy()).await;
    let value = eval(&env.ctx, "this.name").await;
    assert!(matches!(value, ConcreteValue::Error(_)));

    let oak = env.ctx.detached().with_entry(Some(EntryId::new("oak")));
    assert_eq!(eval(&oak, "this.name").await, ConcreteValue::string("Oak"));
    assert_eq!(
        eval(&oak, "this.ancestors().count()").await,
        ConcreteValue::integer(2)
    );
}

#[tokio::test]
async fn test_all_entry_types_sorted_by_name() {
    let env = env(taxonomy()).await;
    let types = eval(&env.ctx, "allEntryTypes()").await;
    assert_eq!(
        types,
        ConcreteValue::List(
            ["genus", "secret", "species"]
                .iter()
                .map(|id| ConcreteValue::EntryType(EntryTypeId::new(*id)))
                .collect()
        )
    );
}

#[tokio::test]
async fn test_value_properties() {
    let env = env(taxonomy()).await;
    let ctx = &env.ctx;

    assert_eq!(
        eval(ctx, "[[/entry/oak]].get(prop=[[/prop/leaf]])").await,
        ConcreteValue::string("lobed")
    );
    assert_eq!(
        eval(ctx, "[[/entry/maple]].get(prop=[[/prop/leaf]])").await,
        ConcreteValue::Null
    );

    let habitat = eval(ctx, "[[/entry/oak]].get(prop=[[/prop/habitat]])").await;
    assert_eq!(habitat.unannotated(), &ConcreteValue::string("Earth"));
    assert_eq!(annotation(&habitat, "inheritedFrom"), Some(&entry("life")));

    assert_eq!(
        eval(ctx, "[[/entry/maple]].get(prop=[[/prop/label]])").await,
        ConcreteValue::string("Maple")
    );

    let on_set = eval(ctx, "allEntries().get(prop=[[/prop/leaf]])").await;
    assert!(error_message(&on_set).contains("not yet supported"));
}

#[tokio::test]
async fn test_relationship_properties() {
    let env = env(taxonomy()).await;
    let ctx = &env.ctx;

    let related = eval(ctx, "[[/entry/oak]].get(prop=[[/prop/related]])").await;
    assert_eq!(entry_ids(&related), vec!["maple"]);
    let ConcreteValue::Page(page) = &related else {
        panic!("expected a page");
    };
    assert_eq!(
        annotation(&page.values[0], "rank"),
        Some(&ConcreteValue::integer(1))
    );
    assert_eq!(annotation(&page.values[0], "note"), None);

    let parents = eval(ctx, "[[/entry/oak]].get(prop=[[/prop/parent]])").await;
    assert_eq!(entry_ids(&parents), vec!["plants"]);

    let pointing_here = eval(ctx, "[[/entry/maple]].reverse(prop=[[/prop/related]])").await;
    assert_eq!(entry_ids(&pointing_here), vec!["oak"]);

    let not_relationship = eval(ctx, "[[/entry/maple]].reverse(prop=[[/prop/leaf]])").await;
    assert!(matches!(not_relationship, ConcreteValue::Error(_)));
}

#[tokio::test]
async fn test_with_detail() {
    let env = env(taxonomy()).await;
    let ctx = &env.ctx;

    let leaf = eval(ctx, "[[/entry/oak]].withDetail(prop=[[/prop/leaf]])").await;
    assert_eq!(leaf.unannotated(), &entry("oak"));
    assert_eq!(
        annotation(&leaf, "detail"),
        Some(&ConcreteValue::string("lobed"))
    );

    let related = eval(ctx, "[[/entry/oak]].withDetail(prop=[[/prop/related]])").await;
    let ConcreteValue::Page(page) = &related else {
        panic!("expected a page, got {:?}", related);
    };
    assert_eq!(page.values.len(), 1);
    let detail = annotation(&page.values[0], "detail").expect("detail annotation");
    assert_eq!(entry_ids(detail), vec!["maple"]);
}

#[tokio::test]
async fn test_map_keeps_count() {
    let env = env(taxonomy()).await;
    let ctx = &env.ctx;

    let names = eval(ctx, "allEntries().filter(entryType=[[/etype/species]]).map(apply=(e -> e.name))").await;
    let ConcreteValue::Page(page) = names else {
        panic!("expected a page");
    };
    assert_eq!(
        page.values,
        vec![ConcreteValue::string("Maple"), ConcreteValue::string("Oak")]
    );
    assert_eq!(page.total_count, 2);

    let doubled = eval(ctx, "[1, 2, 3].map(apply=(x -> [x, x])).count()").await;
    assert_eq!(doubled, ConcreteValue::integer(3));
}

#[tokio::test]
async fn test_sort_by_lambda() {
    let env = env(taxonomy()).await;
    let sorted = eval(
        &env.ctx,
        "allEntries().sort(by=(e -> e.name), reverse=true)",
    )
    .await;
    assert_eq!(entry_ids(&sorted), vec!["plants", "oak", "maple", "life"]);
}

#[tokio::test]
async fn test_slice_from_the_end() {
    let env = env(taxonomy()).await;
    let page = eval(&env.ctx, "[1, 2, 3, 4, 5].slice(start=-2)").await;
    let ConcreteValue::Page(page) = page else {
        panic!("expected a page");
    };
    assert_eq!(
        page.values,
        vec![ConcreteValue::integer(4), ConcreteValue::integer(5)]
    );
    assert_eq!(page.started_at, 3);
    assert_eq!(page.total_count, 5);
}

#[tokio::test]
async fn test_graph_draws_borders() {
    let env = env(taxonomy()).await;
    let value = eval(&env.ctx, "graph([[/entry/plants]].andDescendants())").await;
    let ConcreteValue::Graph(graph) = value else {
        panic!("expected a graph, got {:?}", value);
    };

    let ids: Vec<_> = graph.entries.iter().map(|e| e.id.to_string()).collect();
    assert_eq!(ids, vec!["plants", "maple", "oak"]);
    assert!(graph.entries.iter().all(|e| !e.is_focus));
    assert_eq!(graph.relationships.len(), 3);
    assert!(graph.relationships.contains(&GraphRelationship {
        from: EntryId::new("oak"),
        to: EntryId::new("maple"),
        property: PropertyId::new("related"),
    }));
    assert_eq!(
        graph.borders,
        vec![GraphBorder {
            entry: EntryId::new("plants"),
            property: PropertyId::new("parent"),
            count: 1,
        }]
    );
}

fn auto_property(id: &str, default: &str) -> PropertyRecord {
    PropertyRecord {
        id: PropertyId::new(id),
        key: id.to_string(),
        name: id.to_string(),
        kind: PropertyKind::Auto,
        inheritable: false,
        default: Some(default.to_string()),
    }
}

fn self_referential() -> InMemoryGraph {
    taxonomy()
        .with_property_record(auto_property("loop", "this.get(prop=[[/prop/loop]])"))
        .with_property_record(auto_property("ping", "this.get(prop=[[/prop/pong]])"))
        .with_property_record(auto_property("pong", "this.get(prop=[[/prop/ping]])"))
}

#[tokio::test]
async fn test_circular_defaults_are_errors() {
    let env = env(self_referential()).await;

    let direct = eval(&env.ctx, "[[/entry/oak]].get(prop=[[/prop/loop]])").await;
    assert!(error_message(&direct).contains("Circular reference"));

    let mutual = eval(&env.ctx, "[[/entry/maple]].get(prop=[[/prop/ping]])").await;
    assert!(error_message(&mutual).contains("Circular reference"));

    // The context is still usable afterwards.
    assert_eq!(
        eval(&env.ctx, "[[/entry/oak]].get(prop=[[/prop/label]])").await,
        ConcreteValue::string("Oak")
    );
}

#[tokio::test]
async fn test_nesting_depth_is_bounded() {
    let config = LookupConfig {
        max_evaluation_depth: 3,
        ..Default::default()
    };
    let env = env_with_config(taxonomy(), config).await;

    let shallow = eval(&env.ctx, "[ [1] ]").await;
    assert_eq!(
        shallow,
        ConcreteValue::List(vec![ConcreteValue::List(vec![ConcreteValue::integer(1)])])
    );

    let deep = eval(&env.ctx, "[ [ [ [2] ] ] ]").await;
    let json = deep.to_json().to_string();
    assert!(json.contains("nested more than 3 levels"), "{}", json);
}
