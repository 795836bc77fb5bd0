use super::Var;
use crate::model::{EntryId, EntryTypeId};

/// Boolean condition over bound variables, composable with permission
/// predicates supplied by the [`PermissionProvider`](crate::provider::PermissionProvider).
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    EntryTypeIn { var: Var, types: Vec<EntryTypeId> },
    EntryIdIn { var: Var, ids: Vec<EntryId> },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn not(predicate: Predicate) -> Self {
        match predicate {
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Conjunction that drops `True` terms and short-circuits on `False`.
    pub fn and(predicates: Vec<Predicate>) -> Self {
        let mut terms = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::True => {}
                Predicate::False => return Predicate::False,
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Predicate::True,
            1 => terms.remove(0),
            _ => Predicate::And(terms),
        }
    }

    /// Renames every reference to `from` into `to`.
    pub fn rebind(self, from: &Var, to: &Var) -> Self {
        let swap = |var: Var| if &var == from { to.clone() } else { var };
        match self {
            Predicate::EntryTypeIn { var, types } => Predicate::EntryTypeIn {
                var: swap(var),
                types,
            },
            Predicate::EntryIdIn { var, ids } => Predicate::EntryIdIn { var: swap(var), ids },
            Predicate::Not(inner) => Predicate::Not(Box::new(inner.rebind(from, to))),
            Predicate::And(terms) => {
                Predicate::And(terms.into_iter().map(|t| t.rebind(from, to)).collect())
            }
            Predicate::Or(terms) => {
                Predicate::Or(terms.into_iter().map(|t| t.rebind(from, to)).collect())
            }
            other => other,
        }
    }
}
