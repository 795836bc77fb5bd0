use chrono::NaiveDate;
use num_bigint::BigInt;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

use super::annotated::AnnotatedValue;
use super::ValueType;
use crate::ast::Expression;
use crate::error::LookupError;
use crate::model::{EntryId, EntryTypeId, PropertyId};

/// A fully known value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcreteValue {
    Null,
    Boolean(bool),
    Integer(BigInt),
    Quantity(QuantityValue),
    String(String),
    Markdown(String),
    Date(NaiveDate),
    PartialDate(PartialDateValue),
    Entry(EntryId),
    Property(PropertyId),
    EntryType(EntryTypeId),
    List(Vec<ConcreteValue>),
    Range(Box<RangeValue>),
    Page(PageValue),
    Annotated(AnnotatedValue),
    Graph(GraphValue),
    Error(ErrorValue),
}

/// A decimal magnitude with optional units. Unitless quantities are plain
/// decimal numbers such as `-2.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityValue {
    pub magnitude: Decimal,
    pub units: Option<String>,
}

/// A year, or a year and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDateValue {
    pub year: i32,
    pub month: Option<u32>,
}

impl PartialDateValue {
    /// The first day covered, used to compare against full dates.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), 1)
    }
}

impl fmt::Display for PartialDateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(month) => write!(f, "{:04}-{:02}", self.year, month),
            None => write!(f, "{:04}", self.year),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeValue {
    pub min: ConcreteValue,
    pub max: ConcreteValue,
}

/// The expression (and current entry) that produced a value, kept so the
/// caller can fetch more of it later.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceExpression {
    pub expression: Arc<Expression>,
    pub entry: Option<EntryId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageValue {
    pub values: Vec<ConcreteValue>,
    pub started_at: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub source: Option<SourceExpression>,
}

impl PageValue {
    /// A page holding every value of a fully known sequence.
    pub fn complete(values: Vec<ConcreteValue>) -> Self {
        let total_count = values.len();
        Self {
            values,
            started_at: 0,
            page_size: total_count,
            total_count,
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEntry {
    pub id: EntryId,
    pub name: String,
    pub entry_type: EntryTypeId,
    pub is_focus: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphRelationship {
    pub from: EntryId,
    pub to: EntryId,
    pub property: PropertyId,
}

/// Relationships of a drawn entry that lead to entries left out of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphBorder {
    pub entry: EntryId,
    pub property: PropertyId,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphValue {
    pub entries: Vec<GraphEntry>,
    pub relationships: Vec<GraphRelationship>,
    pub borders: Vec<GraphBorder>,
}

/// A lookup error captured in place of a value.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub error: LookupError,
}

impl ConcreteValue {
    pub fn integer(value: impl Into<BigInt>) -> Self {
        ConcreteValue::Integer(value.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        ConcreteValue::String(value.into())
    }

    pub fn quantity(magnitude: Decimal, units: Option<String>) -> Self {
        ConcreteValue::Quantity(QuantityValue { magnitude, units })
    }

    pub fn error(error: impl Into<LookupError>) -> Self {
        ConcreteValue::Error(ErrorValue {
            error: error.into(),
        })
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            ConcreteValue::Null => ValueType::Null,
            ConcreteValue::Boolean(_) => ValueType::Boolean,
            ConcreteValue::Integer(_) => ValueType::Integer,
            ConcreteValue::Quantity(_) => ValueType::Quantity,
            ConcreteValue::String(_) => ValueType::String,
            ConcreteValue::Markdown(_) => ValueType::Markdown,
            ConcreteValue::Date(_) => ValueType::Date,
            ConcreteValue::PartialDate(_) => ValueType::PartialDate,
            ConcreteValue::Entry(_) => ValueType::Entry,
            ConcreteValue::Property(_) => ValueType::Property,
            ConcreteValue::EntryType(_) => ValueType::EntryType,
            ConcreteValue::List(_) => ValueType::List,
            ConcreteValue::Range(_) => ValueType::Range,
            ConcreteValue::Page(_) => ValueType::Page,
            ConcreteValue::Annotated(_) => ValueType::Annotated,
            ConcreteValue::Graph(_) => ValueType::Graph,
            ConcreteValue::Error(_) => ValueType::Error,
        }
    }

    /// The value with any annotations stripped.
    pub fn unannotated(&self) -> &ConcreteValue {
        match self {
            ConcreteValue::Annotated(annotated) => &annotated.value,
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.unannotated(), ConcreteValue::Null)
    }

    pub fn has_count(&self) -> bool {
        self.count().is_some()
    }

    pub fn is_iterable(&self) -> bool {
        self.has_count()
    }

    /// Number of items for countable values.
    pub fn count(&self) -> Option<usize> {
        match self {
            ConcreteValue::String(s) => Some(s.chars().count()),
            ConcreteValue::List(items) => Some(items.len()),
            ConcreteValue::Page(page) => Some(page.values.len()),
            ConcreteValue::Annotated(annotated) => annotated.value.count(),
            _ => None,
        }
    }

    /// Items `[offset, offset + count)` of an iterable value, clamped to its end.
    pub fn slice(&self, offset: usize, count: usize) -> Option<Vec<ConcreteValue>> {
        match self {
            ConcreteValue::String(s) => Some(
                s.chars()
                    .skip(offset)
                    .take(count)
                    .map(|c| ConcreteValue::String(c.to_string()))
                    .collect(),
            ),
            ConcreteValue::List(items) => Some(window(items, offset, count)),
            ConcreteValue::Page(page) => Some(window(&page.values, offset, count)),
            ConcreteValue::Annotated(annotated) => annotated.value.slice(offset, count),
            _ => None,
        }
    }

    /// Parseable expression text for values that have a literal form.
    pub fn literal_expression(&self) -> Option<String> {
        match self {
            ConcreteValue::Page(_)
            | ConcreteValue::Range(_)
            | ConcreteValue::Graph(_)
            | ConcreteValue::Error(_) => None,
            other => Some(Expression::Literal(other.clone()).to_string()),
        }
    }
}

fn window(items: &[ConcreteValue], offset: usize, count: usize) -> Vec<ConcreteValue> {
    items.iter().skip(offset).take(count).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_is_iterable_by_character() {
        let s = ConcreteValue::string("héllo");
        assert_eq!(s.count(), Some(5));
        assert_eq!(
            s.slice(1, 2),
            Some(vec![ConcreteValue::string("é"), ConcreteValue::string("l")])
        );
    }

    #[test]
    fn test_slice_clamps_to_end() {
        let list = ConcreteValue::List(vec![ConcreteValue::integer(1), ConcreteValue::integer(2)]);
        assert_eq!(list.slice(1, 10), Some(vec![ConcreteValue::integer(2)]));
        assert_eq!(list.slice(5, 10), Some(vec![]));
        assert_eq!(ConcreteValue::integer(1).slice(0, 1), None);
    }

    #[test]
    fn test_partial_date_comparison() {
        let partial = PartialDateValue {
            year: 2020,
            month: Some(3),
        };
        assert_eq!(partial.first_day(), NaiveDate::from_ymd_opt(2020, 3, 1));
        assert_eq!(partial.to_string(), "2020-03");
    }

    #[test]
    fn test_literal_expression() {
        assert_eq!(
            ConcreteValue::Entry(EntryId::new("e1")).literal_expression(),
            Some("[[/entry/e1]]".to_string())
        );
        assert_eq!(
            ConcreteValue::Page(PageValue::complete(vec![])).literal_expression(),
            None
        );
    }
}
