pub mod common;
pub use common::*;

pub mod expression;
pub use expression::{parse_expression, parse_lookup_string};
