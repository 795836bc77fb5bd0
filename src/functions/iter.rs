use async_trait::async_trait;
use num_traits::ToPrimitive;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::scalar::iterable;
use crate::ast::{Expression, FunctionCall, Lambda};
use crate::error::{Error, EvaluationError, LookupResult};
use crate::eval::EvalContext;
use crate::value::{
    sort_values, ConcreteValue, IterableSource, LazyIterableValue, LazyValue, PageValue, Value,
};

/// Binds the lambda's variable to `item` and evaluates its body.
pub(crate) async fn apply_lambda(
    lambda: &Lambda,
    item: &ConcreteValue,
    ctx: &EvalContext,
) -> LookupResult<ConcreteValue> {
    let scope = ctx.child_context_with_variables(BTreeMap::from([(
        lambda.variable.clone(),
        Value::Concrete(item.clone()),
    )]))?;
    scope.evaluate_expr(&lambda.body).await?.make_concrete().await
}

fn lazy_iterable(source: impl IterableSource + 'static, ctx: &EvalContext) -> Value {
    Value::Lazy(LazyValue::Iterable(LazyIterableValue::new(
        Arc::new(source),
        ctx.default_page_size(),
    )))
}

fn required<'a>(call: &'a FunctionCall, key: &str) -> LookupResult<&'a Expression> {
    call.arg(key)
        .ok_or_else(|| Error::internal(format!("{}() called without {}=", call.name(), key)))
}

pub async fn map(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let source = iterable(call.argument()?, ctx).await?;
    let lambda = required(call, "apply")?.as_lambda(ctx)?.clone();
    Ok(lazy_iterable(
        MappedIterable {
            source,
            lambda,
            ctx: ctx.detached(),
        },
        ctx,
    ))
}

struct MappedIterable {
    source: Value,
    lambda: Lambda,
    ctx: EvalContext,
}

#[async_trait]
impl IterableSource for MappedIterable {
    fn describe(&self) -> String {
        format!("map(apply={})", Expression::Lambda(self.lambda.clone()))
    }

    fn has_count(&self) -> bool {
        self.source.has_count()
    }

    async fn get_count(&self) -> LookupResult<usize> {
        self.source.get_count().await
    }

    async fn get_slice(&self, offset: usize, count: usize) -> LookupResult<Vec<ConcreteValue>> {
        let items = self.source.get_slice(offset, count).await?;
        let mut mapped = Vec::with_capacity(items.len());
        for item in &items {
            mapped.push(apply_lambda(&self.lambda, item, &self.ctx).await?);
        }
        Ok(mapped)
    }
}

pub async fn sort(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let source = iterable(call.argument()?, ctx).await?;
    let by = match call.arg("by") {
        Some(expr) => Some(expr.as_lambda(ctx)?.clone()),
        None => None,
    };
    let descending = match call.arg("reverse") {
        Some(expr) => expr.get_bool(ctx).await?,
        None => false,
    };
    Ok(lazy_iterable(
        SortedIterable {
            source,
            by,
            descending,
            ctx: ctx.detached(),
            buffer: OnceCell::new(),
        },
        ctx,
    ))
}

/// Pulls the whole source on first use, then serves slices of the sorted buffer.
struct SortedIterable {
    source: Value,
    by: Option<Lambda>,
    descending: bool,
    ctx: EvalContext,
    buffer: OnceCell<Vec<ConcreteValue>>,
}

impl SortedIterable {
    async fn sorted(&self) -> LookupResult<&Vec<ConcreteValue>> {
        self.buffer.get_or_try_init(|| self.materialize()).await
    }

    async fn materialize(&self) -> LookupResult<Vec<ConcreteValue>> {
        let items = self
            .source
            .collect_all(self.ctx.config().materialize_chunk_size)
            .await?;
        debug!("sorting {} items", items.len());
        let mut keyed = Vec::with_capacity(items.len());
        for item in items {
            let key = match &self.by {
                Some(lambda) => apply_lambda(lambda, &item, &self.ctx).await?,
                None => item.clone(),
            };
            keyed.push((key, item));
        }
        Ok(sort_values(keyed, self.descending)?)
    }
}

#[async_trait]
impl IterableSource for SortedIterable {
    fn describe(&self) -> String {
        match &self.by {
            Some(lambda) => format!(
                "sort(by={}, reverse={})",
                Expression::Lambda(lambda.clone()),
                self.descending
            ),
            None => format!("sort(reverse={})", self.descending),
        }
    }

    fn has_count(&self) -> bool {
        self.source.has_count()
    }

    async fn get_count(&self) -> LookupResult<usize> {
        match self.buffer.get() {
            Some(buffer) => Ok(buffer.len()),
            None => self.source.get_count().await,
        }
    }

    async fn get_slice(&self, offset: usize, count: usize) -> LookupResult<Vec<ConcreteValue>> {
        Ok(self
            .sorted()
            .await?
            .iter()
            .skip(offset)
            .take(count)
            .cloned()
            .collect())
    }
}

async fn index_argument(
    call: &FunctionCall,
    key: &str,
    ctx: &EvalContext,
) -> LookupResult<Option<i64>> {
    match call.arg(key) {
        Some(expr) => {
            let value = expr.get_integer(ctx).await?;
            let index = value.to_i64().ok_or_else(|| {
                EvaluationError::message(format!("slice() {}= is out of range.", key))
            })?;
            Ok(Some(index))
        }
        None => Ok(None),
    }
}

/// Resolves a possibly negative index against `total`, clamped to `0..=total`.
fn resolve_index(index: i64, total: usize) -> usize {
    if index < 0 {
        (total as i64 + index).max(0) as usize
    } else {
        (index as usize).min(total)
    }
}

/// A page of the argument. Negative `start` and `end` count from the end,
/// and `size` caps the number of items.
pub async fn slice(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let arg = call.argument()?;
    let source = iterable(arg, ctx).await?;
    if !source.has_count() {
        return Err(EvaluationError::Conversion {
            expression: arg.debug_string(ctx.config().debug_string_length),
            target: "a countable value".to_string(),
        }
        .into());
    }
    let total = source.get_count().await?;

    let start = index_argument(call, "start", ctx)
        .await?
        .map(|i| resolve_index(i, total))
        .unwrap_or(0);
    let mut end = index_argument(call, "end", ctx)
        .await?
        .map(|i| resolve_index(i, total))
        .unwrap_or(total)
        .max(start);
    let size = match index_argument(call, "size", ctx).await? {
        Some(size) if size < 0 => {
            return Err(EvaluationError::message("slice() size= cannot be negative.").into())
        }
        Some(size) => Some(size as usize),
        None => None,
    };
    if let Some(size) = size {
        end = end.min(start.saturating_add(size));
    }

    let values = source.get_slice(start, end - start).await?;
    Ok(ConcreteValue::Page(PageValue {
        page_size: size.unwrap_or(values.len()),
        values,
        started_at: start,
        total_count: total,
        source: source.source_expression().cloned(),
    })
    .into())
}
