//! # Query Fragment IR
//!
//! Lazy entry sets carry a [`QueryFragment`]: an ordered list of clauses over
//! named variables, plus the annotations to project for each result row.
//! Functions extend a fragment by appending clauses; nothing runs until a
//! [`Terminal`] is attached and the transaction executes the query.
//!
//! Rows come back as JSON maps: a count query yields one `{"count": n}` row,
//! a page query yields `{"id": "...", "annotations": {...}}` per entity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::{AsRefStr, Display};

use crate::model::{EntryId, EntryTypeId, PropertyId, SiteId};
use crate::value::ConcreteValue;

pub mod predicate;

pub use predicate::Predicate;

/// A named variable bound by a clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Var(pub String);

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Var(name.into())
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum Direction {
    /// From an entry towards its parents or relationship targets.
    Outgoing,
    /// From an entry towards its children or relationship sources.
    Incoming,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    MatchEntry {
        var: Var,
        id: EntryId,
    },
    MatchAllEntries {
        var: Var,
    },
    /// Walks IS-A relationships from `from`, binding each reachable entry
    /// once with its minimum distance.
    Traverse {
        from: Var,
        to: Var,
        direction: Direction,
        include_self: bool,
        max_depth: usize,
        distance: Var,
    },
    /// Follows one relationship property directly.
    Related {
        from: Var,
        to: Var,
        property: PropertyId,
        direction: Direction,
        fact: Var,
    },
    /// Relationship facts that apply to `from`, optionally inherited from
    /// the closest ancestor that has any. `source` is the entry holding the fact.
    PropertyFacts {
        from: Var,
        to: Var,
        property: PropertyId,
        fact: Var,
        source: Var,
        inherit: bool,
    },
    Where(Predicate),
    /// Keeps rows whose `var` is (or with `negate`, is not) in the entity set of `other`.
    Intersect {
        var: Var,
        other: Box<QueryFragment>,
        negate: bool,
    },
    /// Adds the entities of `other` to the result, bound to `var`.
    Union {
        var: Var,
        other: Box<QueryFragment>,
    },
}

/// A projected scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// An entry id or a scalar bound to the variable.
    Var(Var),
    FactRank(Var),
    FactNote(Var),
    FactSlot(Var),
    /// `source` when it differs from `origin` and satisfies `visible`,
    /// otherwise null.
    InheritedFrom {
        source: Var,
        origin: Var,
        visible: Predicate,
    },
    Constant(serde_json::Value),
}

/// Converts a raw projected scalar back into a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Reviver {
    Integer,
    String,
    Markdown,
    Entry,
}

impl Reviver {
    /// `None` for null or mistyped input, which drops the annotation.
    pub fn revive(&self, raw: &serde_json::Value) -> Option<ConcreteValue> {
        match (self, raw) {
            (_, serde_json::Value::Null) => None,
            (Reviver::Integer, serde_json::Value::Number(n)) => {
                n.as_i64().map(ConcreteValue::integer)
            }
            (Reviver::String, serde_json::Value::String(s)) if !s.is_empty() => {
                Some(ConcreteValue::String(s.clone()))
            }
            (Reviver::Markdown, serde_json::Value::String(s)) if !s.is_empty() => {
                Some(ConcreteValue::Markdown(s.clone()))
            }
            (Reviver::Entry, serde_json::Value::String(s)) => {
                Some(ConcreteValue::Entry(EntryId::new(s.clone())))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub scalar: Scalar,
    pub reviver: Reviver,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortBy {
    Scalar(Scalar),
    EntryName(Var),
    EntryId(Var),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub by: SortBy,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(by: SortBy) -> Self {
        Self {
            by,
            descending: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFragment {
    pub site: SiteId,
    pub clauses: Vec<Clause>,
    pub entity: Var,
    pub annotations: BTreeMap<String, Annotation>,
    pub order: Vec<SortKey>,
    next_var: usize,
}

impl QueryFragment {
    fn empty(site: SiteId) -> Self {
        Self {
            site,
            clauses: Vec::new(),
            entity: Var::new("entry"),
            annotations: BTreeMap::new(),
            order: Vec::new(),
            next_var: 0,
        }
    }

    /// A fragment whose entity is each entry of the site.
    pub fn all_entries(site: SiteId) -> Self {
        let mut fragment = Self::empty(site);
        let var = fragment.new_var("entry");
        fragment.clauses.push(Clause::MatchAllEntries { var: var.clone() });
        fragment.set_entity(var);
        fragment
    }

    /// A fragment whose entity is the single entry `id`.
    pub fn entry(site: SiteId, id: EntryId) -> Self {
        let mut fragment = Self::empty(site);
        let var = fragment.new_var("entry");
        fragment.clauses.push(Clause::MatchEntry {
            var: var.clone(),
            id,
        });
        fragment.set_entity(var);
        fragment
    }

    /// A fragment whose entity is each of `ids`.
    pub fn entries(site: SiteId, ids: Vec<EntryId>) -> Self {
        let mut fragment = Self::empty(site);
        let var = fragment.new_var("entry");
        fragment
            .clauses
            .push(Clause::MatchAllEntries { var: var.clone() });
        fragment.clauses.push(Clause::Where(Predicate::EntryIdIn {
            var: var.clone(),
            ids,
        }));
        fragment.set_entity(var);
        fragment
    }

    /// Allocates a variable name unique within this fragment.
    pub fn new_var(&mut self, prefix: &str) -> Var {
        self.next_var += 1;
        Var(format!("{}{}", prefix, self.next_var))
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Makes `var` the entity and resets ordering to name then id.
    pub fn set_entity(&mut self, var: Var) {
        self.order = vec![
            SortKey::asc(SortBy::EntryName(var.clone())),
            SortKey::asc(SortBy::EntryId(var.clone())),
        ];
        self.entity = var;
    }

    pub fn annotate(&mut self, name: impl Into<String>, scalar: Scalar, reviver: Reviver) {
        self.annotations
            .insert(name.into(), Annotation { scalar, reviver });
    }

    pub fn clear_annotations(&mut self) {
        self.annotations.clear();
    }

    pub fn terminate(&self, terminal: Terminal) -> TerminatedQuery {
        TerminatedQuery {
            fragment: self.clone(),
            terminal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    Count,
    Page { skip: usize, limit: usize },
}

/// A fragment plus its projection, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminatedQuery {
    pub fragment: QueryFragment,
    pub terminal: Terminal,
}

pub type Row = BTreeMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vars_are_unique() {
        let mut fragment = QueryFragment::entry(SiteId::new("s"), EntryId::new("e"));
        let a = fragment.new_var("x");
        let b = fragment.new_var("x");
        assert_ne!(a, b);
        assert_ne!(a, fragment.entity);
    }

    #[test]
    fn test_set_entity_resets_order() {
        let mut fragment = QueryFragment::all_entries(SiteId::new("s"));
        let other = fragment.new_var("other");
        fragment.set_entity(other.clone());
        assert_eq!(
            fragment.order,
            vec![
                SortKey::asc(SortBy::EntryName(other.clone())),
                SortKey::asc(SortBy::EntryId(other)),
            ]
        );
    }

    #[test]
    fn test_revivers() {
        assert_eq!(
            Reviver::Integer.revive(&serde_json::json!(3)),
            Some(ConcreteValue::integer(3))
        );
        assert_eq!(Reviver::String.revive(&serde_json::json!("")), None);
        assert_eq!(Reviver::Entry.revive(&serde_json::Value::Null), None);
        assert_eq!(
            Reviver::Entry.revive(&serde_json::json!("e1")),
            Some(ConcreteValue::Entry(EntryId::new("e1")))
        );
    }
}
