use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use super::{AccessPolicy, InMemoryGraph};
use crate::error::StoreError;
use crate::model::{
    EntryId, EntryRecord, EntryTypeRecord, FactId, PropertyFactRecord, PropertyId, PropertyRecord,
    SiteId,
};

/// A property fact as written in a fixture; the id is generated when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactFixture {
    #[serde(default)]
    pub id: Option<FactId>,
    pub entry: EntryId,
    pub property: PropertyId,
    #[serde(default)]
    pub value_expression: String,
    #[serde(default)]
    pub target: Option<EntryId>,
    #[serde(default = "default_rank")]
    pub rank: i64,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub slot: String,
}

fn default_rank() -> i64 {
    1
}

/// JSON description of a site's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphFixture {
    pub site: SiteId,
    #[serde(default)]
    pub entry_types: Vec<EntryTypeRecord>,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
    #[serde(default)]
    pub properties: Vec<PropertyRecord>,
    #[serde(default)]
    pub facts: Vec<FactFixture>,
    #[serde(default)]
    pub policy: AccessPolicy,
}

impl GraphFixture {
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        serde_json::from_str(text).map_err(|e| StoreError::Fixture(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let file = File::open(path)
            .map_err(|e| StoreError::Fixture(format!("Failed to open fixture: {}", e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::Fixture(format!("Failed to parse fixture: {}", e)))
    }

    /// Builds the graph, rejecting facts about unknown entries or properties.
    pub fn into_graph(self) -> Result<InMemoryGraph, StoreError> {
        for fact in &self.facts {
            let known_entry = |id: &EntryId| self.entries.iter().any(|e| &e.id == id);
            if !known_entry(&fact.entry) {
                return Err(StoreError::Fixture(format!("unknown entry {}", fact.entry)));
            }
            if let Some(target) = &fact.target {
                if !known_entry(target) {
                    return Err(StoreError::Fixture(format!("unknown entry {}", target)));
                }
            }
            if !self.properties.iter().any(|p| p.id == fact.property) {
                return Err(StoreError::Fixture(format!(
                    "unknown property {}",
                    fact.property
                )));
            }
        }

        let mut graph = InMemoryGraph::new(self.site).with_policy(self.policy);
        for entry_type in self.entry_types {
            graph = graph.with_entry_type(entry_type.id.as_str(), &entry_type.name);
        }
        for entry in self.entries {
            graph = graph.with_entry_record(entry);
        }
        for property in self.properties {
            graph = graph.with_property_record(property);
        }
        for fact in self.facts {
            graph = graph.with_fact(PropertyFactRecord {
                id: fact
                    .id
                    .unwrap_or_else(|| FactId::new(uuid::Uuid::new_v4().to_string())),
                entry: fact.entry,
                property: fact.property,
                value_expression: fact.value_expression,
                target: fact.target,
                rank: fact.rank,
                note: fact.note,
                slot: fact.slot,
            });
        }
        Ok(graph)
    }
}
