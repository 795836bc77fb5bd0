//! # Value Model
//!
//! Evaluation produces a [`Value`]: either a [`ConcreteValue`] that is fully
//! known, or a [`LazyValue`] that still has to run a query or pull from a
//! generator. Both share the countable and iterable capabilities; lazy values
//! are forced with [`Value::make_concrete`], which yields one default-sized
//! page.

use std::sync::Arc;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::ast::Expression;
use crate::error::{EvaluationError, LookupResult};
use crate::model::EntryId;

pub mod annotated;
pub mod attribute;
pub mod cast;
pub mod compare;
pub mod concrete;
pub mod json;
pub mod lazy;

pub use annotated::AnnotatedValue;
pub use compare::{compare_values, sort_values};
pub use concrete::{
    ConcreteValue, ErrorValue, GraphBorder, GraphEntry, GraphRelationship, GraphValue, PageValue,
    PartialDateValue, QuantityValue, RangeValue, SourceExpression,
};
pub use lazy::{IterableSource, LazyEntrySetValue, LazyIterableValue, LazyValue};

/// Tag of every value variant, used for casting and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
pub enum ValueType {
    Null,
    Boolean,
    Integer,
    Quantity,
    String,
    Markdown,
    Date,
    PartialDate,
    Entry,
    Property,
    EntryType,
    List,
    Range,
    Page,
    Annotated,
    Graph,
    Error,
    LazyEntrySet,
    LazyIterable,
}

#[derive(Debug, Clone)]
pub enum Value {
    Concrete(ConcreteValue),
    Lazy(LazyValue),
}

impl From<ConcreteValue> for Value {
    fn from(value: ConcreteValue) -> Self {
        Value::Concrete(value)
    }
}

impl From<LazyValue> for Value {
    fn from(value: LazyValue) -> Self {
        Value::Lazy(value)
    }
}

impl Value {
    pub fn null() -> Self {
        Value::Concrete(ConcreteValue::Null)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Concrete(value) => value.value_type(),
            Value::Lazy(LazyValue::EntrySet(_)) => ValueType::LazyEntrySet,
            Value::Lazy(LazyValue::Iterable(_)) => ValueType::LazyIterable,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Value::Lazy(_))
    }

    pub fn as_concrete(&self) -> Option<&ConcreteValue> {
        match self {
            Value::Concrete(value) => Some(value),
            Value::Lazy(_) => None,
        }
    }

    pub fn has_count(&self) -> bool {
        match self {
            Value::Concrete(value) => value.has_count(),
            Value::Lazy(lazy) => lazy.has_count(),
        }
    }

    pub fn is_iterable(&self) -> bool {
        match self {
            Value::Concrete(value) => value.is_iterable(),
            Value::Lazy(_) => true,
        }
    }

    pub async fn get_count(&self) -> LookupResult<usize> {
        match self {
            Value::Concrete(value) => value
                .count()
                .ok_or_else(|| not_capable(self.value_type(), "counted").into()),
            Value::Lazy(lazy) => lazy.get_count().await,
        }
    }

    pub async fn get_slice(&self, offset: usize, count: usize) -> LookupResult<Vec<ConcreteValue>> {
        match self {
            Value::Concrete(value) => value
                .slice(offset, count)
                .ok_or_else(|| not_capable(self.value_type(), "iterated").into()),
            Value::Lazy(lazy) => lazy.get_slice(offset, count).await,
        }
    }

    /// Pulls every item, `chunk_size` at a time.
    pub async fn collect_all(&self, chunk_size: usize) -> LookupResult<Vec<ConcreteValue>> {
        let chunk_size = chunk_size.max(1);
        let mut items = Vec::new();
        loop {
            let chunk = self.get_slice(items.len(), chunk_size).await?;
            let done = chunk.len() < chunk_size;
            items.extend(chunk);
            if done {
                return Ok(items);
            }
        }
    }

    /// Forces a lazy value into its first page; concrete values are returned as is.
    pub async fn make_concrete(&self) -> LookupResult<ConcreteValue> {
        match self {
            Value::Concrete(value) => Ok(value.clone()),
            Value::Lazy(lazy) => lazy.make_concrete().await,
        }
    }

    pub fn source_expression(&self) -> Option<&SourceExpression> {
        match self {
            Value::Concrete(ConcreteValue::Page(page)) => page.source.as_ref(),
            Value::Concrete(_) => None,
            Value::Lazy(lazy) => lazy.source_expression(),
        }
    }

    /// Replaces the source expression of lazy values and pages.
    pub fn with_source_expression(self, source: SourceExpression) -> Self {
        match self {
            Value::Lazy(lazy) => Value::Lazy(lazy.with_source_expression(source)),
            Value::Concrete(ConcreteValue::Page(mut page)) => {
                page.source = Some(source);
                Value::Concrete(ConcreteValue::Page(page))
            }
            other => other,
        }
    }

    /// Records `expression` as the source of a lazy value that has none yet.
    pub fn with_default_source(self, expression: &Expression, entry: Option<EntryId>) -> Self {
        match &self {
            Value::Lazy(lazy) if lazy.source_expression().is_none() => {
                self.with_source_expression(SourceExpression {
                    expression: Arc::new(expression.clone()),
                    entry,
                })
            }
            _ => self,
        }
    }
}

fn not_capable(value_type: ValueType, action: &str) -> EvaluationError {
    EvaluationError::message(format!("A {} value cannot be {}.", value_type, action))
}
