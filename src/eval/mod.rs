//! # Evaluation
//!
//! [`EvalContext`] carries the per-request state (collaborators, site, user,
//! current entry, variables and the shared result cache) and
//! [`Expression::evaluate`](crate::ast::Expression::evaluate) walks a tree
//! against it.

pub mod context;
pub mod expression;

pub use context::{EvalContext, SharedContext};
