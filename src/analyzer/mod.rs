//! # Analyzer
//!
//! Turns the token stream into an [`Expression`](crate::ast::Expression)
//! tree with a small set of hand-written parser combinators. Function calls
//! are resolved against a [`FunctionRegistry`](crate::functions::FunctionRegistry)
//! while parsing, so unknown names and bad argument lists are parse errors.

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;
pub use parsers::parse_lookup_string;
