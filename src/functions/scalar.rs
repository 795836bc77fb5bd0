use async_trait::async_trait;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::FunctionCall;
use crate::error::{EvaluationError, LookupResult};
use crate::eval::EvalContext;
use crate::model::EntryTypeId;
use crate::provider::{Permission, PermissionObject};
use crate::value::{
    compare_values, ConcreteValue, IterableSource, LazyIterableValue, LazyValue,
    PartialDateValue, RangeValue, Value, ValueType,
};

lazy_static! {
    static ref DATE_PATTERN: Regex =
        Regex::new(r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?$").expect("valid date pattern");
}

pub async fn all_entry_types(ctx: &EvalContext) -> LookupResult<Value> {
    let allowed = ctx
        .permissions()
        .has_permission(&ctx.subject(), Permission::ViewSchema, &PermissionObject::Site)
        .await?;
    if !allowed {
        return Err(EvaluationError::PermissionDenied("view the schema".to_string()).into());
    }
    let mut types = ctx.transaction().entry_types(ctx.site_id()).await?;
    types.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(ConcreteValue::List(
        types
            .into_iter()
            .map(|t| ConcreteValue::EntryType(t.id))
            .collect(),
    )
    .into())
}

pub async fn count(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let arg = call.argument()?;
    let value = ctx.evaluate_expr(arg).await?;
    if let Value::Concrete(ConcreteValue::Error(error)) = value {
        return Err(error.error.into());
    }
    if !value.has_count() {
        return Err(EvaluationError::Conversion {
            expression: arg.debug_string(ctx.config().debug_string_length),
            target: "a countable value".to_string(),
        }
        .into());
    }
    Ok(ConcreteValue::integer(value.get_count().await? as u64).into())
}

pub async fn first(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let arg = call.argument()?;
    let value = iterable(arg, ctx).await?;
    let mut items = value.get_slice(0, 1).await?;
    Ok(items.pop().unwrap_or(ConcreteValue::Null).into())
}

/// Evaluates `arg`, requiring an iterable value.
pub(crate) async fn iterable(arg: &crate::ast::Expression, ctx: &EvalContext) -> LookupResult<Value> {
    let value = ctx.evaluate_expr(arg).await?;
    if let Value::Concrete(ConcreteValue::Error(error)) = value {
        return Err(error.error.into());
    }
    if !value.is_iterable() {
        return Err(EvaluationError::Conversion {
            expression: arg.debug_string(ctx.config().debug_string_length),
            target: "an iterable value".to_string(),
        }
        .into());
    }
    Ok(value)
}

pub fn parse_date(text: &str) -> Result<ConcreteValue, EvaluationError> {
    let captures = DATE_PATTERN
        .captures(text.trim())
        .ok_or(EvaluationError::InvalidDate)?;
    let number = |i: usize| captures.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = captures
        .get(1)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or(EvaluationError::InvalidDate)?;
    match (number(2), number(3)) {
        (Some(month), Some(day)) => NaiveDate::from_ymd_opt(year, month, day)
            .map(ConcreteValue::Date)
            .ok_or(EvaluationError::InvalidDate),
        (Some(month), None) if (1..=12).contains(&month) => {
            Ok(ConcreteValue::PartialDate(PartialDateValue {
                year,
                month: Some(month),
            }))
        }
        (None, None) => Ok(ConcreteValue::PartialDate(PartialDateValue { year, month: None })),
        _ => Err(EvaluationError::InvalidDate),
    }
}

pub async fn date(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let value = call
        .argument()?
        .get_value_as_one_of(&[ValueType::Date, ValueType::PartialDate, ValueType::String], ctx)
        .await?;
    match value {
        Value::Concrete(ConcreteValue::String(text)) => Ok(parse_date(&text)?.into()),
        other => Ok(other),
    }
}

pub async fn markdown(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    call.argument()?
        .get_value_as(ValueType::Markdown, ctx)
        .await
}

pub async fn not(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let value = call.argument()?.get_bool(ctx).await?;
    Ok(ConcreteValue::Boolean(!value).into())
}

pub async fn if_then_else(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let condition = call.argument()?.get_bool(ctx).await?;
    let branch = if condition {
        call.arg("then")
    } else {
        call.arg("else")
    };
    match branch {
        Some(expr) => ctx.evaluate_expr(expr).await,
        None => Ok(Value::null()),
    }
}

pub async fn entry(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let value = call
        .argument()?
        .get_value_as_one_of(&[ValueType::Entry, ValueType::String], ctx)
        .await?;
    let id = match value {
        Value::Concrete(ConcreteValue::Entry(id)) => id.to_string(),
        Value::Concrete(ConcreteValue::String(id)) => id,
        _ => return Err(EvaluationError::message("entry() requires an id or key.").into()),
    };
    let record = ctx
        .transaction()
        .entry(ctx.site_id(), &id)
        .await?
        .ok_or_else(|| EvaluationError::not_found("Entry", &id))?;
    if !ctx.can_view_entry(&record.id).await? {
        return Err(EvaluationError::not_found("Entry", &id).into());
    }
    Ok(ConcreteValue::Entry(record.id).into())
}

pub async fn entry_type(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let value = call
        .argument()?
        .get_value_as_one_of(
            &[ValueType::EntryType, ValueType::Entry, ValueType::String],
            ctx,
        )
        .await?;
    let id = match value {
        Value::Concrete(ConcreteValue::EntryType(id)) => return Ok(ConcreteValue::EntryType(id).into()),
        Value::Concrete(ConcreteValue::Entry(entry)) => {
            return Ok(ConcreteValue::EntryType(ctx.entry_record(&entry).await?.entry_type).into())
        }
        Value::Concrete(ConcreteValue::String(id)) => EntryTypeId::new(id),
        _ => return Err(EvaluationError::message("entryType() requires an id.").into()),
    };
    let record = ctx
        .transaction()
        .entry_type(ctx.site_id(), id.as_str())
        .await?
        .ok_or_else(|| EvaluationError::not_found("Entry type", &id))?;
    Ok(ConcreteValue::EntryType(record.id).into())
}

pub async fn prop(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let value = call
        .argument()?
        .get_value_as_one_of(&[ValueType::Property, ValueType::String], ctx)
        .await?;
    let id = match value {
        Value::Concrete(ConcreteValue::Property(id)) => id.to_string(),
        Value::Concrete(ConcreteValue::String(id)) => id,
        _ => return Err(EvaluationError::message("prop() requires an id or key.").into()),
    };
    let record = ctx
        .transaction()
        .property(ctx.site_id(), &id)
        .await?
        .ok_or_else(|| EvaluationError::not_found("Property", &id))?;
    Ok(ConcreteValue::Property(record.id).into())
}

/// Minimum and maximum of the items. Nulls are skipped and nested ranges
/// contribute both of their bounds.
pub async fn range(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let value = iterable(call.argument()?, ctx).await?;
    let items = value.collect_all(ctx.config().materialize_chunk_size).await?;

    let mut bounds: Option<(ConcreteValue, ConcreteValue)> = None;
    for item in items {
        let candidates = match item.unannotated() {
            ConcreteValue::Null => continue,
            ConcreteValue::Range(range) => vec![range.min.clone(), range.max.clone()],
            other => vec![other.clone()],
        };
        for candidate in candidates {
            bounds = Some(match bounds {
                None => (candidate.clone(), candidate),
                Some((min, max)) => {
                    let min = if compare_values(&candidate, &min)? == Ordering::Less {
                        candidate.clone()
                    } else {
                        min
                    };
                    let max = if compare_values(&candidate, &max)? == Ordering::Greater {
                        candidate
                    } else {
                        max
                    };
                    (min, max)
                }
            });
        }
    }

    let (min, max) = bounds.ok_or(EvaluationError::EmptyRange)?;
    Ok(ConcreteValue::Range(Box::new(RangeValue { min, max })).into())
}

/// Attaches the named arguments as annotations. Lists, pages and lazy
/// values are annotated item by item.
pub async fn annotate(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let mut annotations = BTreeMap::new();
    for (key, expr) in call.named() {
        annotations.insert(key.clone(), expr.get_concrete(ctx).await?);
    }
    if annotations.is_empty() {
        return Err(EvaluationError::InvalidAnnotation(
            "at least one annotation is required".to_string(),
        )
        .into());
    }

    let value = ctx.evaluate_expr(call.argument()?).await?;
    match value {
        Value::Concrete(ConcreteValue::Error(error)) => Err(error.error.into()),
        Value::Concrete(ConcreteValue::List(items)) => Ok(ConcreteValue::List(
            annotate_all(items, &annotations)?,
        )
        .into()),
        Value::Concrete(ConcreteValue::Page(mut page)) => {
            page.values = annotate_all(page.values, &annotations)?;
            Ok(ConcreteValue::Page(page).into())
        }
        Value::Concrete(value) => Ok(value.annotate(annotations)?.into()),
        lazy @ Value::Lazy(_) => Ok(Value::Lazy(LazyValue::Iterable(LazyIterableValue::new(
            Arc::new(AnnotatedItems {
                source: lazy,
                annotations,
            }),
            ctx.default_page_size(),
        )))),
    }
}

fn annotate_all(
    items: Vec<ConcreteValue>,
    annotations: &BTreeMap<String, ConcreteValue>,
) -> Result<Vec<ConcreteValue>, EvaluationError> {
    items
        .into_iter()
        .map(|item| item.annotate(annotations.clone()))
        .collect()
}

struct AnnotatedItems {
    source: Value,
    annotations: BTreeMap<String, ConcreteValue>,
}

#[async_trait]
impl IterableSource for AnnotatedItems {
    fn describe(&self) -> String {
        format!("annotate({:?})", self.annotations.keys().collect::<Vec<_>>())
    }

    fn has_count(&self) -> bool {
        self.source.has_count()
    }

    async fn get_count(&self) -> LookupResult<usize> {
        self.source.get_count().await
    }

    async fn get_slice(&self, offset: usize, count: usize) -> LookupResult<Vec<ConcreteValue>> {
        let items = self.source.get_slice(offset, count).await?;
        Ok(annotate_all(items, &self.annotations)?)
    }
}
