//! # Expression AST
//!
//! Parsed lookup expressions. Nodes are plain data; evaluation lives in
//! [`crate::eval`] and the function vocabulary in [`crate::functions`].

pub mod expression;
pub mod function;

pub use expression::{Expression, ExpressionKind, Lambda};
pub use function::{ArgumentError, FunctionCall, FunctionRef, Signature};
