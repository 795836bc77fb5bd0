use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::scalar::iterable;
use crate::ast::FunctionCall;
use crate::error::{Error, EvaluationError, LookupResult};
use crate::eval::EvalContext;
use crate::model::{EntryId, PropertyId};
use crate::value::{ConcreteValue, GraphBorder, GraphEntry, GraphRelationship, GraphValue, Value};

/// Entries of the argument and the relationships among them. Relationships
/// leading outside the drawn entries are summarized as borders.
pub async fn graph(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let arg = call.argument()?;
    let items = iterable(arg, ctx)
        .await?
        .get_slice(0, ctx.config().graph_max_entries)
        .await?;

    let mut entries = Vec::new();
    let mut drawn = BTreeSet::new();
    for item in &items {
        let id = match item.unannotated() {
            ConcreteValue::Entry(id) => id,
            ConcreteValue::Null => continue,
            _ => {
                return Err(EvaluationError::Conversion {
                    expression: arg.debug_string(ctx.config().debug_string_length),
                    target: "a set of entries".to_string(),
                }
                .into())
            }
        };
        if drawn.contains(id) {
            continue;
        }
        let record = match ctx.entry_record(id).await {
            Ok(record) => record,
            Err(Error::Lookup(_)) => continue,
            Err(other) => return Err(other),
        };
        drawn.insert(record.id.clone());
        entries.push(GraphEntry {
            is_focus: ctx.entry_id() == Some(&record.id),
            id: record.id,
            name: record.name,
            entry_type: record.entry_type,
        });
    }

    let ids: Vec<EntryId> = entries.iter().map(|e| e.id.clone()).collect();
    let facts = ctx.transaction().relationships(ctx.site_id(), &ids).await?;

    let mut relationships = Vec::new();
    let mut borders: BTreeMap<(EntryId, PropertyId), usize> = BTreeMap::new();
    let mut visible: BTreeMap<EntryId, bool> = BTreeMap::new();
    for fact in facts {
        let (inside, outside) = match (drawn.contains(&fact.from), drawn.contains(&fact.to)) {
            (true, true) => {
                relationships.push(GraphRelationship {
                    from: fact.from,
                    to: fact.to,
                    property: fact.property,
                });
                continue;
            }
            (true, false) => (fact.from, fact.to),
            (false, true) => (fact.to, fact.from),
            (false, false) => continue,
        };
        let can_view = match visible.get(&outside) {
            Some(can_view) => *can_view,
            None => {
                let can_view = ctx.can_view_entry(&outside).await?;
                visible.insert(outside, can_view);
                can_view
            }
        };
        if can_view {
            *borders.entry((inside, fact.property)).or_default() += 1;
        }
    }
    debug!(
        "graph: {} entries, {} relationships, {} borders",
        entries.len(),
        relationships.len(),
        borders.len()
    );

    Ok(ConcreteValue::Graph(GraphValue {
        entries,
        relationships,
        borders: borders
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|((entry, property), count)| GraphBorder {
                entry,
                property,
                count,
            })
            .collect(),
    })
    .into())
}
