use async_recursion::async_recursion;
use chrono::Datelike;

use super::{ConcreteValue, Value};
use crate::error::{EvaluationError, LookupResult};
use crate::eval::EvalContext;

/// Attributes that read as null on values that do not have them.
const LENIENT_ATTRIBUTES: [&str; 5] = ["name", "id", "slot", "note", "detail"];

fn string_or_null(s: &str) -> ConcreteValue {
    if s.is_empty() {
        ConcreteValue::Null
    } else {
        ConcreteValue::String(s.to_string())
    }
}

/// Looks up `name` in the attribute table of `value`.
#[async_recursion]
pub async fn get_attribute(value: &ConcreteValue, name: &str, ctx: &EvalContext) -> LookupResult<Value> {
    let found = match value {
        ConcreteValue::Annotated(annotated) => match annotated.annotation(name) {
            Some(annotation) => Some(annotation.clone()),
            None => return get_attribute(&annotated.value, name, ctx).await,
        },
        ConcreteValue::Entry(id) => {
            let record = ctx.entry_record(id).await?;
            match name {
                "id" => Some(ConcreteValue::String(record.id.to_string())),
                "name" => Some(ConcreteValue::String(record.name)),
                "key" => Some(string_or_null(&record.key)),
                "description" => Some(ConcreteValue::Markdown(record.description)),
                "type" => Some(ConcreteValue::EntryType(record.entry_type)),
                _ => None,
            }
        }
        ConcreteValue::EntryType(id) => match name {
            "id" => Some(ConcreteValue::String(id.to_string())),
            "name" => {
                let record = ctx
                    .transaction()
                    .entry_type(ctx.site_id(), id.as_str())
                    .await?
                    .ok_or_else(|| EvaluationError::not_found("Entry type", id))?;
                Some(ConcreteValue::String(record.name))
            }
            _ => None,
        },
        ConcreteValue::Property(id) => match name {
            "id" => Some(ConcreteValue::String(id.to_string())),
            "key" | "name" => {
                let record = ctx
                    .transaction()
                    .property(ctx.site_id(), id.as_str())
                    .await?
                    .ok_or_else(|| EvaluationError::not_found("Property", id))?;
                Some(ConcreteValue::String(if name == "key" {
                    record.key
                } else {
                    record.name
                }))
            }
            _ => None,
        },
        ConcreteValue::String(_) | ConcreteValue::List(_) => match name {
            "length" => value.count().map(|n| ConcreteValue::integer(n as u64)),
            _ => None,
        },
        ConcreteValue::Markdown(s) => match name {
            "length" => Some(ConcreteValue::integer(s.chars().count() as u64)),
            _ => None,
        },
        ConcreteValue::Page(page) => match name {
            "length" => Some(ConcreteValue::integer(page.values.len() as u64)),
            "totalCount" => Some(ConcreteValue::integer(page.total_count as u64)),
            _ => None,
        },
        ConcreteValue::Date(date) => match name {
            "year" => Some(ConcreteValue::integer(date.year())),
            "month" => Some(ConcreteValue::integer(date.month())),
            "day" => Some(ConcreteValue::integer(date.day())),
            _ => None,
        },
        ConcreteValue::PartialDate(date) => match name {
            "year" => Some(ConcreteValue::integer(date.year)),
            "month" => Some(date.month.map_or(ConcreteValue::Null, ConcreteValue::integer)),
            _ => None,
        },
        ConcreteValue::Quantity(q) => match name {
            "magnitude" => Some(ConcreteValue::quantity(q.magnitude, None)),
            "units" => Some(
                q.units
                    .as_ref()
                    .map_or(ConcreteValue::Null, |u| ConcreteValue::String(u.clone())),
            ),
            _ => None,
        },
        ConcreteValue::Range(range) => match name {
            "min" => Some(range.min.clone()),
            "max" => Some(range.max.clone()),
            _ => None,
        },
        _ => None,
    };

    match found {
        Some(value) => Ok(Value::Concrete(value)),
        None if LENIENT_ATTRIBUTES.contains(&name) => Ok(Value::null()),
        None => Err(EvaluationError::UnknownAttribute {
            attribute: name.to_string(),
            value_type: value.value_type().to_string(),
        }
        .into()),
    }
}
