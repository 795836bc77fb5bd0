use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{AnnotatedValue, ConcreteValue, PageValue, SourceExpression};
use crate::error::{Error, LookupResult};
use crate::eval::EvalContext;
use crate::model::EntryId;
use crate::query::{QueryFragment, Row, Terminal};

/// A value that has not been computed yet.
#[derive(Clone)]
pub enum LazyValue {
    EntrySet(LazyEntrySetValue),
    Iterable(LazyIterableValue),
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyValue::EntrySet(set) => f
                .debug_struct("LazyEntrySet")
                .field("fragment", &set.fragment)
                .finish(),
            LazyValue::Iterable(iterable) => f
                .debug_struct("LazyIterable")
                .field("source", &iterable.source.describe())
                .finish(),
        }
    }
}

impl LazyValue {
    pub fn has_count(&self) -> bool {
        match self {
            LazyValue::EntrySet(_) => true,
            LazyValue::Iterable(iterable) => iterable.source.has_count(),
        }
    }

    pub async fn get_count(&self) -> LookupResult<usize> {
        match self {
            LazyValue::EntrySet(set) => set.get_count().await,
            LazyValue::Iterable(iterable) => iterable.source.get_count().await,
        }
    }

    pub async fn get_slice(&self, offset: usize, count: usize) -> LookupResult<Vec<ConcreteValue>> {
        match self {
            LazyValue::EntrySet(set) => set.get_slice(offset, count).await,
            LazyValue::Iterable(iterable) => iterable.source.get_slice(offset, count).await,
        }
    }

    pub async fn make_concrete(&self) -> LookupResult<ConcreteValue> {
        let page_size = self.page_size();
        let values = self.get_slice(0, page_size).await?;
        let total_count = if values.len() < page_size {
            values.len()
        } else {
            self.get_count().await?
        };
        Ok(ConcreteValue::Page(PageValue {
            values,
            started_at: 0,
            page_size,
            total_count,
            source: self.source_expression().cloned(),
        }))
    }

    fn page_size(&self) -> usize {
        match self {
            LazyValue::EntrySet(set) => set.ctx.default_page_size(),
            LazyValue::Iterable(iterable) => iterable.page_size,
        }
    }

    pub fn source_expression(&self) -> Option<&SourceExpression> {
        match self {
            LazyValue::EntrySet(set) => set.source.as_ref(),
            LazyValue::Iterable(iterable) => iterable.source_expression.as_ref(),
        }
    }

    pub fn with_source_expression(self, source: SourceExpression) -> Self {
        match self {
            LazyValue::EntrySet(mut set) => {
                set.source = Some(source);
                LazyValue::EntrySet(set)
            }
            LazyValue::Iterable(mut iterable) => {
                iterable.source_expression = Some(source);
                LazyValue::Iterable(iterable)
            }
        }
    }
}

/// A set of entries described by an unexecuted query fragment.
#[derive(Clone)]
pub struct LazyEntrySetValue {
    ctx: EvalContext,
    fragment: QueryFragment,
    source: Option<SourceExpression>,
}

impl LazyEntrySetValue {
    pub fn new(ctx: &EvalContext, fragment: QueryFragment) -> Self {
        Self {
            ctx: ctx.detached(),
            fragment,
            source: None,
        }
    }

    pub fn fragment(&self) -> &QueryFragment {
        &self.fragment
    }

    pub fn into_fragment(self) -> QueryFragment {
        self.fragment
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_count(&self) -> LookupResult<usize> {
        let query = self.fragment.terminate(Terminal::Count);
        let rows = self.ctx.transaction().execute(&query).await?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|count| count.as_u64())
            .ok_or_else(|| Error::internal("count query returned no count"))?;
        debug!("count = {}", count);
        Ok(count as usize)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_slice(&self, offset: usize, count: usize) -> LookupResult<Vec<ConcreteValue>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let query = self.fragment.terminate(Terminal::Page {
            skip: offset,
            limit: count,
        });
        let rows = self.ctx.transaction().execute(&query).await?;
        debug!("slice [{}, +{}) returned {} rows", offset, count, rows.len());
        rows.iter().map(|row| self.revive_row(row)).collect()
    }

    fn revive_row(&self, row: &Row) -> LookupResult<ConcreteValue> {
        let id = row
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| Error::internal("entry row without an id"))?;
        let entity = ConcreteValue::Entry(EntryId::new(id));

        let raw = row.get("annotations").and_then(|a| a.as_object());
        let annotations: BTreeMap<String, ConcreteValue> = self
            .fragment
            .annotations
            .iter()
            .filter_map(|(name, annotation)| {
                let value = raw.and_then(|raw| raw.get(name))?;
                annotation
                    .reviver
                    .revive(value)
                    .map(|revived| (name.clone(), revived))
            })
            .collect();

        if annotations.is_empty() {
            Ok(entity)
        } else {
            Ok(ConcreteValue::Annotated(AnnotatedValue::new(entity, annotations)?))
        }
    }
}

/// Pull-based source behind a [`LazyIterableValue`].
#[async_trait]
pub trait IterableSource: Send + Sync {
    fn describe(&self) -> String;

    fn has_count(&self) -> bool {
        true
    }

    async fn get_count(&self) -> LookupResult<usize>;

    async fn get_slice(&self, offset: usize, count: usize) -> LookupResult<Vec<ConcreteValue>>;
}

/// A generated sequence, such as the output of `map()` or `sort()`.
#[derive(Clone)]
pub struct LazyIterableValue {
    source: Arc<dyn IterableSource>,
    source_expression: Option<SourceExpression>,
    page_size: usize,
}

impl LazyIterableValue {
    pub fn new(source: Arc<dyn IterableSource>, page_size: usize) -> Self {
        Self {
            source,
            source_expression: None,
            page_size,
        }
    }
}
