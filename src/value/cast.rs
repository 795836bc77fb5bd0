use async_recursion::async_recursion;
use num_bigint::BigInt;
use num_traits::Zero;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{ConcreteValue, LazyEntrySetValue, LazyValue, PageValue, Value, ValueType};
use crate::error::{Error, LookupResult};
use crate::eval::EvalContext;
use crate::model::EntryId;
use crate::query::{Clause, QueryFragment};

impl Value {
    /// Converts the value to `target`, or `None` when no conversion exists.
    ///
    /// An error value re-raises its error instead of converting.
    #[async_recursion]
    pub async fn cast_to(&self, target: ValueType, ctx: &EvalContext) -> LookupResult<Option<Value>> {
        if let Value::Concrete(ConcreteValue::Error(error)) = self {
            return Err(Error::Lookup(error.error.clone()));
        }
        if self.value_type() == target {
            return Ok(Some(self.clone()));
        }

        match self {
            Value::Concrete(value) => cast_concrete(value, target, ctx).await,
            Value::Lazy(lazy) => match target {
                ValueType::Boolean => Ok(Some(ConcreteValue::Boolean(lazy.get_count().await? != 0).into())),
                ValueType::Page => Ok(Some(lazy.make_concrete().await?.into())),
                ValueType::List => {
                    let chunk = ctx.config().materialize_chunk_size;
                    let items = self.collect_all(chunk).await?;
                    Ok(Some(ConcreteValue::List(items).into()))
                }
                ValueType::LazyEntrySet | ValueType::LazyIterable => Ok(None),
                other => {
                    let page = Value::Concrete(lazy.make_concrete().await?);
                    page.cast_to(other, ctx).await
                }
            },
        }
    }
}

/// Whether a value that cannot be counted reads as true.
pub fn is_truthy(value: &ConcreteValue) -> bool {
    match value.unannotated() {
        ConcreteValue::Null => false,
        ConcreteValue::Boolean(b) => *b,
        ConcreteValue::Integer(i) => !i.is_zero(),
        ConcreteValue::Quantity(q) => !q.magnitude.is_zero(),
        ConcreteValue::Markdown(s) => !s.is_empty(),
        other => other.count().map_or(true, |count| count != 0),
    }
}

pub fn integer_to_decimal(value: &BigInt) -> Option<Decimal> {
    Decimal::from_str(&value.to_string()).ok()
}

async fn cast_concrete(
    value: &ConcreteValue,
    target: ValueType,
    ctx: &EvalContext,
) -> LookupResult<Option<Value>> {
    if target == ValueType::Boolean {
        return Ok(Some(ConcreteValue::Boolean(is_truthy(value)).into()));
    }

    let cast = match (value, target) {
        (ConcreteValue::Annotated(annotated), _) => {
            return Value::Concrete((*annotated.value).clone())
                .cast_to(target, ctx)
                .await;
        }
        (ConcreteValue::Integer(i), ValueType::Quantity) => {
            integer_to_decimal(i).map(|magnitude| ConcreteValue::quantity(magnitude, None))
        }
        (ConcreteValue::Integer(i), ValueType::String) => Some(ConcreteValue::String(i.to_string())),
        (ConcreteValue::Quantity(q), ValueType::Integer) if q.units.is_none() && q.magnitude.fract().is_zero() => {
            BigInt::from_str(&q.magnitude.trunc().to_string())
                .ok()
                .map(ConcreteValue::Integer)
        }
        (ConcreteValue::Quantity(q), ValueType::String) => Some(ConcreteValue::String(match &q.units {
            Some(units) => format!("{} {}", q.magnitude, units),
            None => q.magnitude.to_string(),
        })),
        (ConcreteValue::Boolean(b), ValueType::String) => Some(ConcreteValue::String(b.to_string())),
        (ConcreteValue::String(s), ValueType::Markdown) => Some(ConcreteValue::Markdown(s.clone())),
        (ConcreteValue::Markdown(s), ValueType::String) => Some(ConcreteValue::String(s.clone())),
        (ConcreteValue::Date(d), ValueType::String) => {
            Some(ConcreteValue::String(d.format("%Y-%m-%d").to_string()))
        }
        (ConcreteValue::PartialDate(d), ValueType::String) => Some(ConcreteValue::String(d.to_string())),
        (ConcreteValue::String(s), ValueType::List) => Some(ConcreteValue::List(
            s.chars().map(|c| ConcreteValue::String(c.to_string())).collect(),
        )),
        (ConcreteValue::List(items), ValueType::Page) => {
            Some(ConcreteValue::Page(PageValue::complete(items.clone())))
        }
        (ConcreteValue::Page(page), ValueType::List) => Some(ConcreteValue::List(page.values.clone())),
        (ConcreteValue::Entry(id), ValueType::LazyEntrySet) => {
            return entry_set(vec![id.clone()], ctx).await.map(Some);
        }
        (ConcreteValue::List(items), ValueType::LazyEntrySet) => {
            return match entry_ids(items) {
                Some(ids) => entry_set(ids, ctx).await.map(Some),
                None => Ok(None),
            };
        }
        (ConcreteValue::Page(page), ValueType::LazyEntrySet) => {
            return match entry_ids(&page.values) {
                Some(ids) => entry_set(ids, ctx).await.map(Some),
                None => Ok(None),
            };
        }
        _ => None,
    };
    Ok(cast.map(Value::Concrete))
}

fn entry_ids(items: &[ConcreteValue]) -> Option<Vec<EntryId>> {
    items
        .iter()
        .map(|item| match item.unannotated() {
            ConcreteValue::Entry(id) => Some(id.clone()),
            _ => None,
        })
        .collect()
}

async fn entry_set(ids: Vec<EntryId>, ctx: &EvalContext) -> LookupResult<Value> {
    let mut fragment = if ids.len() == 1 {
        QueryFragment::entry(ctx.site_id().clone(), ids[0].clone())
    } else {
        QueryFragment::entries(ctx.site_id().clone(), ids)
    };
    let entity = fragment.entity.clone();
    fragment.push(Clause::Where(ctx.view_predicate(&entity).await?));
    Ok(Value::Lazy(LazyValue::EntrySet(LazyEntrySetValue::new(
        ctx, fragment,
    ))))
}
