use serde_json::{json, Value as Json};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use super::InMemoryGraph;
use crate::error::StoreError;
use crate::model::EntryId;
use crate::query::{
    Clause, Predicate, QueryFragment, Row, Scalar, SortBy, SortKey, Terminal, TerminatedQuery, Var,
};

/// What a variable is bound to in one row.
#[derive(Debug, Clone, PartialEq)]
enum Binding {
    Entry(EntryId),
    /// Index into the graph's facts.
    Fact(usize),
    Integer(i64),
}

type Bindings = BTreeMap<Var, Binding>;

/// Interprets query fragments row by row against an [`InMemoryGraph`].
pub(super) struct Executor<'a> {
    graph: &'a InMemoryGraph,
}

impl<'a> Executor<'a> {
    pub fn new(graph: &'a InMemoryGraph) -> Self {
        Self { graph }
    }

    pub fn run(&self, query: &TerminatedQuery) -> Result<Vec<Row>, StoreError> {
        let fragment = &query.fragment;
        let rows = self.ordered_entities(fragment)?;
        Ok(match query.terminal {
            Terminal::Count => vec![count_row(rows.len())],
            Terminal::Page { skip, limit } => rows
                .iter()
                .skip(skip)
                .take(limit)
                .map(|row| self.project(fragment, row))
                .collect::<Result<Vec<_>, StoreError>>()?,
        })
    }

    pub fn empty_result(&self, query: &TerminatedQuery) -> Result<Vec<Row>, StoreError> {
        Ok(match query.terminal {
            Terminal::Count => vec![count_row(0)],
            Terminal::Page { .. } => Vec::new(),
        })
    }

    /// Rows after ordering, one per distinct entity; the first row of each
    /// entity in sort order wins.
    fn ordered_entities(&self, fragment: &QueryFragment) -> Result<Vec<Bindings>, StoreError> {
        let rows = self.bindings(fragment)?;
        let mut keyed: Vec<(Vec<Json>, Bindings)> = rows
            .into_iter()
            .map(|row| {
                let keys = fragment
                    .order
                    .iter()
                    .map(|key| self.sort_value(&row, key))
                    .collect();
                (keys, row)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &fragment.order));

        let mut seen = BTreeSet::new();
        Ok(keyed
            .into_iter()
            .filter_map(|(_, row)| match row.get(&fragment.entity) {
                Some(Binding::Entry(id)) if seen.insert(id.clone()) => Some(row),
                _ => None,
            })
            .collect())
    }

    fn bindings(&self, fragment: &QueryFragment) -> Result<Vec<Bindings>, StoreError> {
        if fragment.site != *self.graph.site() {
            return Ok(Vec::new());
        }
        let mut rows = vec![Bindings::new()];
        for clause in &fragment.clauses {
            rows = self.apply(clause, rows)?;
        }
        Ok(rows)
    }

    /// Distinct entity ids of a sub-fragment.
    fn entity_set(&self, fragment: &QueryFragment) -> Result<Vec<EntryId>, StoreError> {
        Ok(self
            .ordered_entities(fragment)?
            .into_iter()
            .filter_map(|row| match row.get(&fragment.entity) {
                Some(Binding::Entry(id)) => Some(id.clone()),
                _ => None,
            })
            .collect())
    }

    fn apply(&self, clause: &Clause, rows: Vec<Bindings>) -> Result<Vec<Bindings>, StoreError> {
        let mut out = Vec::new();
        match clause {
            Clause::MatchEntry { var, id } => {
                if self.graph.entry_by_id(id).is_some() {
                    for row in rows {
                        out.push(bind(row, var, Binding::Entry(id.clone())));
                    }
                }
            }
            Clause::MatchAllEntries { var } => {
                for row in rows {
                    for entry in self.graph.entries() {
                        out.push(bind(row.clone(), var, Binding::Entry(entry.id.clone())));
                    }
                }
            }
            Clause::Traverse {
                from,
                to,
                direction,
                include_self,
                max_depth,
                distance,
            } => {
                for row in rows {
                    let Some(Binding::Entry(start)) = row.get(from) else {
                        continue;
                    };
                    for (entry, hops) in
                        self.graph
                            .traverse(start, *direction, *include_self, *max_depth)
                    {
                        let mut next = bind(row.clone(), to, Binding::Entry(entry));
                        next.insert(distance.clone(), Binding::Integer(hops as i64));
                        out.push(next);
                    }
                }
            }
            Clause::Related {
                from,
                to,
                property,
                direction,
                fact,
            } => {
                for row in rows {
                    let Some(Binding::Entry(start)) = row.get(from) else {
                        continue;
                    };
                    for (index, other) in self.graph.related(start, property, *direction) {
                        let mut next = bind(row.clone(), to, Binding::Entry(other));
                        next.insert(fact.clone(), Binding::Fact(index));
                        out.push(next);
                    }
                }
            }
            Clause::PropertyFacts {
                from,
                to,
                property,
                fact,
                source,
                inherit,
            } => {
                for row in rows {
                    let Some(Binding::Entry(start)) = row.get(from) else {
                        continue;
                    };
                    for applicable in
                        self.graph
                            .applicable_facts(start, property, *inherit, usize::MAX)
                    {
                        let Some(target) = self
                            .graph
                            .fact(applicable.index)
                            .and_then(|f| f.target.clone())
                        else {
                            continue;
                        };
                        let mut next = bind(row.clone(), to, Binding::Entry(target));
                        next.insert(fact.clone(), Binding::Fact(applicable.index));
                        next.insert(source.clone(), Binding::Entry(applicable.holder));
                        out.push(next);
                    }
                }
            }
            Clause::Where(predicate) => {
                out = rows
                    .into_iter()
                    .filter(|row| self.holds(predicate, row))
                    .collect();
            }
            Clause::Intersect { var, other, negate } => {
                let members: BTreeSet<EntryId> = self.entity_set(other)?.into_iter().collect();
                out = rows
                    .into_iter()
                    .filter(|row| {
                        let inside = matches!(row.get(var), Some(Binding::Entry(id)) if members.contains(id));
                        inside != *negate
                    })
                    .collect();
            }
            Clause::Union { var, other } => {
                out = rows;
                for id in self.entity_set(other)? {
                    out.push(bind(Bindings::new(), var, Binding::Entry(id)));
                }
            }
        }
        Ok(out)
    }

    fn holds(&self, predicate: &Predicate, row: &Bindings) -> bool {
        match predicate {
            Predicate::True => true,
            Predicate::False => false,
            Predicate::EntryTypeIn { var, types } => match row.get(var) {
                Some(Binding::Entry(id)) => self
                    .graph
                    .entry_by_id(id)
                    .is_some_and(|entry| types.contains(&entry.entry_type)),
                _ => false,
            },
            Predicate::EntryIdIn { var, ids } => {
                matches!(row.get(var), Some(Binding::Entry(id)) if ids.contains(id))
            }
            Predicate::Not(inner) => !self.holds(inner, row),
            Predicate::And(terms) => terms.iter().all(|term| self.holds(term, row)),
            Predicate::Or(terms) => terms.iter().any(|term| self.holds(term, row)),
        }
    }

    fn scalar(&self, row: &Bindings, scalar: &Scalar) -> Json {
        let fact = |var: &Var| match row.get(var) {
            Some(Binding::Fact(index)) => self.graph.fact(*index),
            _ => None,
        };
        match scalar {
            Scalar::Var(var) => match row.get(var) {
                Some(Binding::Entry(id)) => json!(id.as_str()),
                Some(Binding::Integer(i)) => json!(i),
                Some(Binding::Fact(index)) => self
                    .graph
                    .fact(*index)
                    .map(|f| json!(f.id.as_str()))
                    .unwrap_or(Json::Null),
                None => Json::Null,
            },
            Scalar::FactRank(var) => fact(var).map(|f| json!(f.rank)).unwrap_or(Json::Null),
            Scalar::FactNote(var) => fact(var).map(|f| json!(f.note)).unwrap_or(Json::Null),
            Scalar::FactSlot(var) => fact(var).map(|f| json!(f.slot)).unwrap_or(Json::Null),
            Scalar::InheritedFrom {
                source,
                origin,
                visible,
            } => match (row.get(source), row.get(origin)) {
                (Some(Binding::Entry(source)), Some(Binding::Entry(origin)))
                    if source != origin && self.holds(visible, row) =>
                {
                    json!(source.as_str())
                }
                _ => Json::Null,
            },
            Scalar::Constant(value) => value.clone(),
        }
    }

    fn sort_value(&self, row: &Bindings, key: &SortKey) -> Json {
        match &key.by {
            SortBy::Scalar(scalar) => self.scalar(row, scalar),
            SortBy::EntryName(var) => match row.get(var) {
                Some(Binding::Entry(id)) => self
                    .graph
                    .entry_by_id(id)
                    .map(|entry| json!(entry.name))
                    .unwrap_or(Json::Null),
                _ => Json::Null,
            },
            SortBy::EntryId(var) => match row.get(var) {
                Some(Binding::Entry(id)) => json!(id.as_str()),
                _ => Json::Null,
            },
        }
    }

    fn project(&self, fragment: &QueryFragment, row: &Bindings) -> Result<Row, StoreError> {
        let Some(Binding::Entry(id)) = row.get(&fragment.entity) else {
            return Err(StoreError::Query(format!(
                "entity {} is not bound to an entry",
                fragment.entity
            )));
        };
        let annotations: serde_json::Map<String, Json> = fragment
            .annotations
            .iter()
            .map(|(name, annotation)| (name.clone(), self.scalar(row, &annotation.scalar)))
            .collect();
        Ok(Row::from([
            ("id".to_string(), json!(id.as_str())),
            ("annotations".to_string(), Json::Object(annotations)),
        ]))
    }
}

fn bind(mut row: Bindings, var: &Var, binding: Binding) -> Bindings {
    row.insert(var.clone(), binding);
    row
}

fn count_row(count: usize) -> Row {
    Row::from([("count".to_string(), json!(count))])
}

/// Nulls sort last whichever the direction.
fn compare_keys(a: &[Json], b: &[Json], order: &[SortKey]) -> Ordering {
    for ((a, b), key) in a.iter().zip(b).zip(order) {
        let ordering = match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let natural = compare_json(a, b);
                if key.descending {
                    natural.reverse()
                } else {
                    natural
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_json(a: &Json, b: &Json) -> Ordering {
    match (a, b) {
        (Json::Number(a), Json::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Json::String(a), Json::String(b)) => a.cmp(b),
        (Json::Bool(a), Json::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
