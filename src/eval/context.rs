use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, warn};

use crate::analyzer::{parse_lookup_string, ParseError};
use crate::ast::Expression;
use crate::config::LookupConfig;
use crate::error::{Error, EvaluationError, LookupResult};
use crate::functions::FunctionRegistry;
use crate::model::{EntryId, EntryRecord, SiteId, UserId};
use crate::provider::{
    GraphTransaction, InheritanceResolver, Permission, PermissionObject, PermissionProvider,
    Providers, Subject,
};
use crate::query::{Predicate, Var};
use crate::tokenizer::keyword::is_reserved;
use crate::value::{ConcreteValue, Value};

/// Request-wide handles shared by every context derived from one root.
#[derive(Clone)]
pub struct SharedContext {
    pub transaction: Arc<dyn GraphTransaction>,
    pub permissions: Arc<dyn PermissionProvider>,
    pub inheritance: Arc<dyn InheritanceResolver>,
    pub functions: Arc<FunctionRegistry>,
    pub config: Arc<LookupConfig>,
}

/// Evaluations that have started but not finished in one context tree.
#[derive(Default)]
struct InProgress {
    keys: DashSet<String>,
    depth: AtomicUsize,
}

/// Releases one level of [`InProgress`] when an evaluation ends, however it ends.
struct EvaluationGuard<'a> {
    in_progress: &'a InProgress,
    key: Option<String>,
}

impl Drop for EvaluationGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = &self.key {
            self.in_progress.keys.remove(key);
        }
        self.in_progress.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State for evaluating expressions on behalf of one request.
///
/// Derived contexts (for another entry, or with extra variables) share the
/// result cache of their parent. The cache is not synchronized beyond what
/// `DashMap` gives per key, so one context tree must not be evaluated from
/// several tasks at once.
#[derive(Clone)]
pub struct EvalContext {
    shared: SharedContext,
    site_id: SiteId,
    user_id: Option<UserId>,
    entry_id: Option<EntryId>,
    default_page_size: usize,
    variables: Arc<BTreeMap<String, Value>>,
    cache: Arc<DashMap<String, Value>>,
    in_progress: Arc<InProgress>,
}

impl EvalContext {
    /// Builds a root context, loading the site's plugin functions.
    pub async fn new(providers: &Providers, config: LookupConfig, site: SiteId) -> LookupResult<Self> {
        let plugins = providers.plugins.functions_for_site(&site).await?;
        let shared = SharedContext {
            transaction: providers.transaction.clone(),
            permissions: providers.permissions.clone(),
            inheritance: providers.inheritance.clone(),
            functions: Arc::new(FunctionRegistry::with_plugins(plugins)),
            config: Arc::new(config),
        };
        Ok(Self::from_shared(shared, site))
    }

    pub fn from_shared(shared: SharedContext, site: SiteId) -> Self {
        let default_page_size = shared.config.default_page_size;
        Self {
            shared,
            site_id: site,
            user_id: None,
            entry_id: None,
            default_page_size,
            variables: Arc::new(BTreeMap::new()),
            cache: Arc::new(DashMap::new()),
            in_progress: Arc::new(InProgress::default()),
        }
    }

    pub fn with_user(mut self, user: Option<UserId>) -> Self {
        self.user_id = user;
        self
    }

    pub fn with_entry(mut self, entry: Option<EntryId>) -> Self {
        self.entry_id = entry;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn entry_id(&self) -> Option<&EntryId> {
        self.entry_id.as_ref()
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn config(&self) -> &LookupConfig {
        &self.shared.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.shared.functions
    }

    pub fn transaction(&self) -> &dyn GraphTransaction {
        self.shared.transaction.as_ref()
    }

    pub fn inheritance(&self) -> &dyn InheritanceResolver {
        self.shared.inheritance.as_ref()
    }

    pub fn permissions(&self) -> &dyn PermissionProvider {
        self.shared.permissions.as_ref()
    }

    pub fn subject(&self) -> Subject {
        Subject {
            site: self.site_id.clone(),
            user: self.user_id.clone(),
        }
    }

    pub fn this_entry(&self) -> Result<&EntryId, EvaluationError> {
        self.entry_id.as_ref().ok_or(EvaluationError::NoCurrentEntry)
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Same context with `entry` as `this`; shares cache and variables.
    pub fn get_context_for(&self, entry: &EntryId) -> EvalContext {
        if self.entry_id.as_ref() == Some(entry) {
            return self.clone();
        }
        let mut child = self.clone();
        child.entry_id = Some(entry.clone());
        child
    }

    /// Same context with `variables` bound on top of the existing ones.
    pub fn child_context_with_variables(
        &self,
        variables: BTreeMap<String, Value>,
    ) -> Result<EvalContext, EvaluationError> {
        if let Some(name) = variables.keys().find(|name| is_reserved(name)) {
            return Err(EvaluationError::message(format!(
                "\"{}\" is reserved and cannot be used as a variable name.",
                name
            )));
        }
        let mut merged = (*self.variables).clone();
        merged.extend(variables);
        let mut child = self.clone();
        child.variables = Arc::new(merged);
        Ok(child)
    }

    /// A context for evaluating stored expressions (such as property
    /// defaults) of `entry`, without any of the caller's variables.
    pub fn entry_scope(&self, entry: &EntryId) -> EvalContext {
        let mut child = self.get_context_for(entry);
        if !child.variables.is_empty() {
            child.variables = Arc::new(BTreeMap::new());
        }
        child
    }

    /// A copy with its own empty cache, for lazy values to hold on to.
    /// Nesting is still tracked together with the parent.
    pub fn detached(&self) -> EvalContext {
        let mut copy = self.clone();
        copy.cache = Arc::new(DashMap::new());
        copy
    }

    pub fn parse(&self, text: &str) -> Result<Expression, ParseError> {
        parse_lookup_string(text, self.functions())
    }

    fn cache_key(&self, expr: &Expression) -> String {
        format!(
            "{}:{}",
            self.entry_id.as_ref().map(|e| e.as_str()).unwrap_or(""),
            expr
        )
    }

    /// Marks `key` as being evaluated. Fails when `key` is already being
    /// evaluated further up, or when nesting is too deep.
    fn enter(
        &self,
        expr: &Expression,
        key: Option<&String>,
    ) -> Result<EvaluationGuard<'_>, EvaluationError> {
        let depth = self.in_progress.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let mut guard = EvaluationGuard {
            in_progress: &self.in_progress,
            key: None,
        };
        let max_depth = self.config().max_evaluation_depth;
        if depth > max_depth {
            return Err(EvaluationError::TooDeep(max_depth));
        }
        if let Some(key) = key {
            if !self.in_progress.keys.insert(key.clone()) {
                return Err(EvaluationError::CircularReference(
                    expr.debug_string(self.config().debug_string_length),
                ));
            }
            guard.key = Some(key.clone());
        }
        Ok(guard)
    }

    /// Evaluates `expr` with caching.
    ///
    /// Lookup errors become an [`ErrorValue`](crate::value::ErrorValue) in the
    /// result; any other error is returned. Re-entering an expression that is
    /// still being evaluated for the same entry is a lookup error.
    #[tracing::instrument(level = "debug", skip(self, expr), fields(expr = %expr))]
    pub async fn evaluate_expr(&self, expr: &Expression) -> LookupResult<Value> {
        let key = if self.variables.is_empty() {
            Some(self.cache_key(expr))
        } else {
            None
        };

        if let Some(key) = &key {
            let cached = self.cache.get(key).map(|hit| hit.value().clone());
            if let Some(value) = cached {
                debug!("cache hit: {}", key);
                return Ok(value);
            }
        }

        let _guard = match self.enter(expr, key.as_ref()) {
            Ok(guard) => guard,
            Err(error) => {
                warn!("{}", error);
                return Ok(Value::Concrete(ConcreteValue::error(error)));
            }
        };

        let value = match expr.evaluate(self).await {
            Ok(value) => value.with_default_source(expr, self.entry_id.clone()),
            Err(Error::Lookup(error)) => {
                warn!("lookup error in {}: {}", expr.debug_string(self.config().debug_string_length), error);
                Value::Concrete(ConcreteValue::error(error))
            }
            Err(other) => return Err(other),
        };

        if let Some(key) = key {
            self.cache.insert(key, value.clone());
        }
        Ok(value)
    }

    /// Parses and evaluates `text`. Parse errors are returned, not wrapped.
    pub async fn evaluate_text(&self, text: &str) -> LookupResult<Value> {
        let expr = self.parse(text)?;
        self.evaluate_expr(&expr).await
    }

    /// Predicate restricting `var` to entries the subject may view.
    pub async fn view_predicate(&self, var: &Var) -> LookupResult<Predicate> {
        Ok(self
            .permissions()
            .predicate_for(&self.subject(), Permission::ViewEntry, var)
            .await?)
    }

    pub async fn can_view_entry(&self, entry: &EntryId) -> LookupResult<bool> {
        Ok(self
            .permissions()
            .has_permission(
                &self.subject(),
                Permission::ViewEntry,
                &PermissionObject::Entry(entry.clone()),
            )
            .await?)
    }

    /// Fetches an entry the subject may view; missing and hidden entries
    /// are both reported as not found.
    pub async fn entry_record(&self, entry: &EntryId) -> LookupResult<EntryRecord> {
        let record = self
            .transaction()
            .entry(&self.site_id, entry.as_str())
            .await?
            .ok_or_else(|| EvaluationError::not_found("Entry", entry))?;
        if !self.can_view_entry(&record.id).await? {
            return Err(EvaluationError::not_found("Entry", entry).into());
        }
        Ok(record)
    }
}
