use async_trait::async_trait;
use std::sync::Arc;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::ast::{FunctionCall, Signature};
use crate::error::{LookupResult, StoreError};
use crate::eval::EvalContext;
use crate::model::{
    EntryId, EntryRecord, EntryTypeRecord, PropertyId, PropertyRecord, RelationshipRecord,
    ResolvedFact, SiteId, UserId,
};
use crate::query::{Predicate, Row, TerminatedQuery, Var};
use crate::value::Value;

/// Executes queries and record lookups within one caller-owned transaction.
///
/// The expression core never opens or commits transactions.
#[mockall::automock]
#[async_trait]
pub trait GraphTransaction: Send + Sync {
    /// Runs a terminated fragment, returning `{count}` or `{id, annotations}` rows.
    async fn execute(&self, query: &TerminatedQuery) -> Result<Vec<Row>, StoreError>;

    /// Looks an entry up by id or by key.
    async fn entry(&self, site: &SiteId, id_or_key: &str)
        -> Result<Option<EntryRecord>, StoreError>;

    async fn entry_type(
        &self,
        site: &SiteId,
        id: &str,
    ) -> Result<Option<EntryTypeRecord>, StoreError>;

    async fn entry_types(&self, site: &SiteId) -> Result<Vec<EntryTypeRecord>, StoreError>;

    /// Looks a property up by id or by key.
    async fn property(
        &self,
        site: &SiteId,
        id_or_key: &str,
    ) -> Result<Option<PropertyRecord>, StoreError>;

    /// Every relationship fact with one end in `entries`.
    async fn relationships(
        &self,
        site: &SiteId,
        entries: &[EntryId],
    ) -> Result<Vec<RelationshipRecord>, StoreError>;
}

/// Who is evaluating: an optional user on a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub site: SiteId,
    pub user: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    ViewEntry,
    ViewProperty,
    ViewSchema,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionObject {
    Site,
    Entry(EntryId),
    Property(PropertyId),
}

#[mockall::automock]
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// A predicate over `var` that holds for the entries `subject` may access.
    async fn predicate_for(
        &self,
        subject: &Subject,
        permission: Permission,
        var: &Var,
    ) -> Result<Predicate, StoreError>;

    async fn has_permission(
        &self,
        subject: &Subject,
        permission: Permission,
        object: &PermissionObject,
    ) -> Result<bool, StoreError>;
}

#[mockall::automock]
#[async_trait]
pub trait InheritanceResolver: Send + Sync {
    /// Facts of `property` that apply to `entry`, ordered by rank. Facts come
    /// either from the entry itself or from its closest ancestor that has any.
    async fn get_entry_property(
        &self,
        site: &SiteId,
        entry: &EntryId,
        property: &PropertyId,
    ) -> Result<Vec<ResolvedFact>, StoreError>;
}

/// A function contributed by a site plugin.
#[async_trait]
pub trait PluginFunction: Send + Sync {
    fn name(&self) -> &str;

    fn signature(&self) -> Signature;

    async fn evaluate(&self, call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value>;
}

#[mockall::automock]
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    async fn functions_for_site(
        &self,
        site: &SiteId,
    ) -> Result<Vec<Arc<dyn PluginFunction>>, StoreError>;
}
