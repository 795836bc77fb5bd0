//! Records of the property graph as seen through the collaborator traits.
//!
//! The expression core never owns these records; it receives them from a
//! [`GraphTransaction`](crate::provider::GraphTransaction) and refers to
//! graph objects by their typed ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumString};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

id_type!(
    /// Stable id of an entry.
    EntryId
);
id_type!(SiteId);
id_type!(UserId);
id_type!(EntryTypeId);
id_type!(
    /// Stable id of a property definition.
    PropertyId
);
id_type!(FactId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub id: EntryId,
    /// Human-friendly unique key, usable instead of the id in `entry("...")`.
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub entry_type: EntryTypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryTypeRecord {
    pub id: EntryTypeId,
    pub name: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
pub enum PropertyKind {
    /// Plain value; facts hold a literal expression.
    Value,
    /// The parent relationship that ancestor/descendant traversal follows.
    IsA,
    /// Relationship to another entry.
    Relationship,
    /// Computed; the property default is evaluated for each entry.
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: PropertyId,
    pub key: String,
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default)]
    pub inheritable: bool,
    /// Default expression, evaluated in the entry's context when no fact applies.
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFactRecord {
    pub id: FactId,
    pub entry: EntryId,
    pub property: PropertyId,
    /// Literal expression holding the value (value properties).
    #[serde(default)]
    pub value_expression: String,
    /// Target entry (relationship and IS-A properties).
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

/// Where an applicable property fact was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactSource {
    ThisEntry,
    Ancestor { entry: EntryId, distance: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFact {
    pub fact: PropertyFactRecord,
    pub source: FactSource,
}

/// A relationship fact between two entries, used to draw graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    pub fact: FactId,
    pub property: PropertyId,
    pub from: EntryId,
    pub to: EntryId,
}
