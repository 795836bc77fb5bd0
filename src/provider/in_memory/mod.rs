//! A complete backend over an immutable in-memory snapshot of one site.
//!
//! [`InMemoryGraph`] implements every collaborator trait, interpreting the
//! query fragment IR directly. It backs the command line tool and the
//! integration tests.

mod executor;
mod fixture;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub use fixture::{FactFixture, GraphFixture};

use super::{
    GraphTransaction, InheritanceResolver, Permission, PermissionObject, PermissionProvider,
    PluginFunction, PluginRegistry, Subject,
};
use crate::error::StoreError;
use crate::model::{
    EntryId, EntryRecord, EntryTypeId, EntryTypeRecord, FactId, FactSource, PropertyFactRecord,
    PropertyId, PropertyKind, PropertyRecord, RelationshipRecord, ResolvedFact, SiteId, UserId,
};
use crate::query::{Direction, Predicate, Row, TerminatedQuery, Var};

/// Who may see what. Entries of a restricted type are visible only to
/// privileged users; hidden properties are visible to nobody.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessPolicy {
    pub restricted_types: Vec<EntryTypeId>,
    pub privileged_users: Vec<UserId>,
    pub hidden_properties: Vec<PropertyId>,
}

impl AccessPolicy {
    fn sees_everything(&self, user: Option<&UserId>) -> bool {
        self.restricted_types.is_empty()
            || user.is_some_and(|user| self.privileged_users.contains(user))
    }
}

/// A fact that applies to an entry, with the entry that holds it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ApplicableFact {
    pub index: usize,
    pub holder: EntryId,
    pub distance: usize,
}

pub struct InMemoryGraph {
    site: SiteId,
    entries: BTreeMap<EntryId, EntryRecord>,
    entry_types: BTreeMap<EntryTypeId, EntryTypeRecord>,
    properties: BTreeMap<PropertyId, PropertyRecord>,
    facts: Vec<PropertyFactRecord>,
    policy: AccessPolicy,
    plugins: Vec<Arc<dyn PluginFunction>>,
    queries_executed: AtomicUsize,
}

impl InMemoryGraph {
    pub fn new(site: impl Into<SiteId>) -> Self {
        Self {
            site: site.into(),
            entries: BTreeMap::new(),
            entry_types: BTreeMap::new(),
            properties: BTreeMap::new(),
            facts: Vec::new(),
            policy: AccessPolicy::default(),
            plugins: Vec::new(),
            queries_executed: AtomicUsize::new(0),
        }
    }

    pub fn site(&self) -> &SiteId {
        &self.site
    }

    pub fn with_entry_type(mut self, id: &str, name: &str) -> Self {
        self.entry_types.insert(
            EntryTypeId::new(id),
            EntryTypeRecord {
                id: EntryTypeId::new(id),
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_entry_record(mut self, record: EntryRecord) -> Self {
        self.entries.insert(record.id.clone(), record);
        self
    }

    /// Adds an entry whose key equals its id.
    pub fn with_entry(self, id: &str, name: &str, entry_type: &str) -> Self {
        self.with_entry_record(EntryRecord {
            id: EntryId::new(id),
            key: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            entry_type: EntryTypeId::new(entry_type),
        })
    }

    pub fn with_property_record(mut self, record: PropertyRecord) -> Self {
        self.properties.insert(record.id.clone(), record);
        self
    }

    /// Adds a non-inheritable property without a default; its key equals its id.
    pub fn with_property(self, id: &str, name: &str, kind: PropertyKind) -> Self {
        self.with_property_record(PropertyRecord {
            id: PropertyId::new(id),
            key: id.to_string(),
            name: name.to_string(),
            kind,
            inheritable: false,
            default: None,
        })
    }

    pub fn with_fact(mut self, fact: PropertyFactRecord) -> Self {
        self.facts.push(fact);
        self
    }

    pub fn with_relationship(self, entry: &str, property: &str, target: &str) -> Self {
        self.with_fact(PropertyFactRecord {
            id: FactId::new(uuid::Uuid::new_v4().to_string()),
            entry: EntryId::new(entry),
            property: PropertyId::new(property),
            value_expression: String::new(),
            target: Some(EntryId::new(target)),
            rank: 1,
            note: String::new(),
            slot: String::new(),
        })
    }

    /// Adds a value fact; `expression` is lookup expression text such as `"42"`.
    pub fn with_value(self, entry: &str, property: &str, expression: &str) -> Self {
        self.with_fact(PropertyFactRecord {
            id: FactId::new(uuid::Uuid::new_v4().to_string()),
            entry: EntryId::new(entry),
            property: PropertyId::new(property),
            value_expression: expression.to_string(),
            target: None,
            rank: 1,
            note: String::new(),
            slot: String::new(),
        })
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn PluginFunction>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Number of queries run through [`GraphTransaction::execute`].
    pub fn queries_executed(&self) -> usize {
        self.queries_executed.load(Ordering::SeqCst)
    }

    pub(crate) fn entry_by_id(&self, id: &EntryId) -> Option<&EntryRecord> {
        self.entries.get(id)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries.values()
    }

    pub(crate) fn fact(&self, index: usize) -> Option<&PropertyFactRecord> {
        self.facts.get(index)
    }

    fn is_kind(&self, property: &PropertyId, kind: PropertyKind) -> bool {
        self.properties
            .get(property)
            .is_some_and(|record| record.kind == kind)
    }

    /// Direct IS-A neighbors of `entry`: parents when outgoing, children when incoming.
    pub(crate) fn is_a_neighbors(&self, entry: &EntryId, direction: Direction) -> Vec<EntryId> {
        self.facts
            .iter()
            .filter(|fact| self.is_kind(&fact.property, PropertyKind::IsA))
            .filter_map(|fact| {
                let target = fact.target.as_ref()?;
                match direction {
                    Direction::Outgoing if &fact.entry == entry => Some(target.clone()),
                    Direction::Incoming if target == entry => Some(fact.entry.clone()),
                    _ => None,
                }
            })
            .collect()
    }

    /// Breadth-first walk over IS-A links, giving each reachable entry once
    /// with its minimum distance. The start is only included when asked for.
    pub(crate) fn traverse(
        &self,
        start: &EntryId,
        direction: Direction,
        include_self: bool,
        max_depth: usize,
    ) -> Vec<(EntryId, usize)> {
        let mut seen = BTreeSet::from([start.clone()]);
        let mut queue = VecDeque::from([(start.clone(), 0usize)]);
        let mut reached = Vec::new();
        if include_self {
            reached.push((start.clone(), 0));
        }
        while let Some((entry, distance)) = queue.pop_front() {
            if distance >= max_depth {
                continue;
            }
            for next in self.is_a_neighbors(&entry, direction) {
                if seen.insert(next.clone()) {
                    reached.push((next.clone(), distance + 1));
                    queue.push_back((next, distance + 1));
                }
            }
        }
        reached
    }

    /// Facts of `property` held by `entry`, or else, when `inherit` is set,
    /// by its closest ancestors that hold any. Ordered by distance then rank.
    pub(crate) fn applicable_facts(
        &self,
        entry: &EntryId,
        property: &PropertyId,
        inherit: bool,
        max_depth: usize,
    ) -> Vec<ApplicableFact> {
        let own = self.facts_of(entry, property, 0);
        if !own.is_empty() || !inherit {
            return own;
        }

        let mut nearest: Vec<ApplicableFact> = Vec::new();
        for (ancestor, distance) in self.traverse(entry, Direction::Outgoing, false, max_depth) {
            if nearest.first().is_some_and(|found| found.distance < distance) {
                break;
            }
            nearest.extend(self.facts_of(&ancestor, property, distance));
        }
        nearest.sort_by_key(|fact| (fact.distance, self.facts[fact.index].rank));
        nearest
    }

    fn facts_of(&self, entry: &EntryId, property: &PropertyId, distance: usize) -> Vec<ApplicableFact> {
        let mut facts: Vec<ApplicableFact> = self
            .facts
            .iter()
            .enumerate()
            .filter(|(_, fact)| &fact.entry == entry && &fact.property == property)
            .map(|(index, _)| ApplicableFact {
                index,
                holder: entry.clone(),
                distance,
            })
            .collect();
        facts.sort_by_key(|fact| self.facts[fact.index].rank);
        facts
    }

    /// Relationship (and IS-A) facts `from -> to` for one property.
    pub(crate) fn related(
        &self,
        entry: &EntryId,
        property: &PropertyId,
        direction: Direction,
    ) -> Vec<(usize, EntryId)> {
        self.facts
            .iter()
            .enumerate()
            .filter(|(_, fact)| &fact.property == property)
            .filter_map(|(index, fact)| {
                let target = fact.target.as_ref()?;
                match direction {
                    Direction::Outgoing if &fact.entry == entry => Some((index, target.clone())),
                    Direction::Incoming if target == entry => Some((index, fact.entry.clone())),
                    _ => None,
                }
            })
            .collect()
    }

    fn can_view(&self, user: Option<&UserId>, entry: &EntryRecord) -> bool {
        self.policy.sees_everything(user) || !self.policy.restricted_types.contains(&entry.entry_type)
    }
}

#[async_trait]
impl GraphTransaction for InMemoryGraph {
    #[tracing::instrument(level = "debug", skip(self, query))]
    async fn execute(&self, query: &TerminatedQuery) -> Result<Vec<Row>, StoreError> {
        self.queries_executed.fetch_add(1, Ordering::SeqCst);
        if query.fragment.site != self.site {
            return executor::Executor::new(self).empty_result(query);
        }
        let rows = executor::Executor::new(self).run(query)?;
        debug!("{:?} returned {} rows", query.terminal, rows.len());
        Ok(rows)
    }

    async fn entry(&self, site: &SiteId, id_or_key: &str) -> Result<Option<EntryRecord>, StoreError> {
        if site != &self.site {
            return Ok(None);
        }
        Ok(self
            .entries
            .get(&EntryId::new(id_or_key))
            .or_else(|| {
                self.entries
                    .values()
                    .find(|entry| !entry.key.is_empty() && entry.key == id_or_key)
            })
            .cloned())
    }

    async fn entry_type(&self, site: &SiteId, id: &str) -> Result<Option<EntryTypeRecord>, StoreError> {
        if site != &self.site {
            return Ok(None);
        }
        Ok(self.entry_types.get(&EntryTypeId::new(id)).cloned())
    }

    async fn entry_types(&self, site: &SiteId) -> Result<Vec<EntryTypeRecord>, StoreError> {
        if site != &self.site {
            return Ok(Vec::new());
        }
        Ok(self.entry_types.values().cloned().collect())
    }

    async fn property(&self, site: &SiteId, id_or_key: &str) -> Result<Option<PropertyRecord>, StoreError> {
        if site != &self.site {
            return Ok(None);
        }
        Ok(self
            .properties
            .get(&PropertyId::new(id_or_key))
            .or_else(|| {
                self.properties
                    .values()
                    .find(|property| !property.key.is_empty() && property.key == id_or_key)
            })
            .cloned())
    }

    async fn relationships(
        &self,
        site: &SiteId,
        entries: &[EntryId],
    ) -> Result<Vec<RelationshipRecord>, StoreError> {
        if site != &self.site {
            return Ok(Vec::new());
        }
        Ok(self
            .facts
            .iter()
            .filter_map(|fact| {
                let target = fact.target.as_ref()?;
                (entries.contains(&fact.entry) || entries.contains(target)).then(|| {
                    RelationshipRecord {
                        fact: fact.id.clone(),
                        property: fact.property.clone(),
                        from: fact.entry.clone(),
                        to: target.clone(),
                    }
                })
            })
            .collect())
    }
}

#[async_trait]
impl PermissionProvider for InMemoryGraph {
    async fn predicate_for(
        &self,
        subject: &Subject,
        permission: Permission,
        var: &Var,
    ) -> Result<Predicate, StoreError> {
        if subject.site != self.site {
            return Ok(Predicate::False);
        }
        match permission {
            Permission::ViewEntry if !self.policy.sees_everything(subject.user.as_ref()) => {
                Ok(Predicate::not(Predicate::EntryTypeIn {
                    var: var.clone(),
                    types: self.policy.restricted_types.clone(),
                }))
            }
            _ => Ok(Predicate::True),
        }
    }

    async fn has_permission(
        &self,
        subject: &Subject,
        permission: Permission,
        object: &PermissionObject,
    ) -> Result<bool, StoreError> {
        if subject.site != self.site {
            return Ok(false);
        }
        Ok(match (permission, object) {
            (Permission::ViewEntry, PermissionObject::Entry(id)) => self
                .entries
                .get(id)
                .is_some_and(|entry| self.can_view(subject.user.as_ref(), entry)),
            (Permission::ViewProperty, PermissionObject::Property(id)) => {
                !self.policy.hidden_properties.contains(id)
            }
            _ => true,
        })
    }
}

#[async_trait]
impl InheritanceResolver for InMemoryGraph {
    async fn get_entry_property(
        &self,
        site: &SiteId,
        entry: &EntryId,
        property: &PropertyId,
    ) -> Result<Vec<ResolvedFact>, StoreError> {
        if site != &self.site {
            return Ok(Vec::new());
        }
        let inheritable = self
            .properties
            .get(property)
            .is_some_and(|record| record.inheritable);
        Ok(self
            .applicable_facts(entry, property, inheritable, usize::MAX)
            .into_iter()
            .map(|applicable| ResolvedFact {
                fact: self.facts[applicable.index].clone(),
                source: if applicable.distance == 0 {
                    FactSource::ThisEntry
                } else {
                    FactSource::Ancestor {
                        entry: applicable.holder,
                        distance: applicable.distance,
                    }
                },
            })
            .collect())
    }
}

#[async_trait]
impl PluginRegistry for InMemoryGraph {
    async fn functions_for_site(
        &self,
        site: &SiteId,
    ) -> Result<Vec<Arc<dyn PluginFunction>>, StoreError> {
        if site != &self.site {
            return Ok(Vec::new());
        }
        Ok(self.plugins.clone())
    }
}
