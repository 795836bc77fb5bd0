use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::{Error, LookupResult};

/// Tunables for parsing and evaluating lookup expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Page size used when a lazy value is forced without explicit pagination.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound on IS-A hops for ancestor/descendant traversal.
    #[serde(default = "default_max_traversal_depth")]
    pub max_traversal_depth: usize,

    /// Length of the expression text shown in error messages.
    #[serde(default = "default_debug_string_length")]
    pub debug_string_length: usize,

    /// Maximum number of entries `graph()` will render.
    #[serde(default = "default_graph_max_entries")]
    pub graph_max_entries: usize,

    /// Chunk size used when a function has to pull a whole iterable.
    #[serde(default = "default_materialize_chunk_size")]
    pub materialize_chunk_size: usize,

    /// Deepest nesting of expression evaluations, stored expressions included.
    #[serde(default = "default_max_evaluation_depth")]
    pub max_evaluation_depth: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_traversal_depth: default_max_traversal_depth(),
            debug_string_length: default_debug_string_length(),
            graph_max_entries: default_graph_max_entries(),
            materialize_chunk_size: default_materialize_chunk_size(),
            max_evaluation_depth: default_max_evaluation_depth(),
        }
    }
}

impl LookupConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> LookupResult<Self> {
        from_file(path)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> LookupResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

fn default_page_size() -> usize {
    10
}
fn default_max_traversal_depth() -> usize {
    50
}
fn default_debug_string_length() -> usize {
    50
}
fn default_graph_max_entries() -> usize {
    100
}
fn default_materialize_chunk_size() -> usize {
    100
}
fn default_max_evaluation_depth() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LookupConfig = serde_json::from_str(r#"{"default_page_size": 25}"#).unwrap();
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.max_traversal_depth, 50);
        assert_eq!(config.debug_string_length, 50);
        assert_eq!(config.max_evaluation_depth, 64);
    }

    #[test]
    fn test_missing_file() {
        let result = LookupConfig::from_file("/nonexistent/lookup.json");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
