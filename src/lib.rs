//! # Lookup: an expression language over a property graph
//!
//! Lookup expressions query a graph of entries, their properties and the
//! relationships between them, for example
//!
//! ```text
//! this.ancestors().filter(entryType=[[/etype/species]]).count()
//! ```
//!
//! ## Processing Pipeline
//!
//! ```text
//! Text → Tokenizer → Analyzer → Expression → EvalContext → Value → JSON
//! ```
//!
//! * [`tokenizer`] splits text into tokens with `nom`.
//! * [`analyzer`] builds an [`Expression`] with parser combinators,
//!   resolving function names against a [`FunctionRegistry`].
//! * [`eval`] walks the tree. Results are [`Value`]s: concrete values or
//!   lazy ones that wrap a [`query::QueryFragment`] or a generator.
//! * [`value`] holds the value model, casting, comparison and JSON output.
//!
//! ## Collaborators
//!
//! The core never touches storage directly. Graph access, permissions,
//! property inheritance and plugin functions go through the traits in
//! [`provider`]; [`provider::in_memory`] implements them for tests and the
//! command line tool.

pub mod analyzer;
pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod functions;
pub mod model;
pub mod provider;
pub mod query;
pub mod tokenizer;
pub mod value;

// Re-exports
pub use analyzer::parse_lookup_string;
pub use ast::*;
pub use config::LookupConfig;
pub use error::*;
pub use eval::{EvalContext, SharedContext};
pub use functions::{BuiltinFunction, FunctionRegistry};
pub use value::{ConcreteValue, Value, ValueType};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
