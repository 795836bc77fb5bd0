use async_recursion::async_recursion;
use num_bigint::BigInt;

use super::context::EvalContext;
use crate::ast::{Expression, FunctionCall, FunctionRef, Lambda};
use crate::error::{Error, EvaluationError, LookupResult};
use crate::value::attribute::get_attribute;
use crate::value::{ConcreteValue, LazyEntrySetValue, LazyValue, Value, ValueType};

impl Expression {
    /// Evaluates this node. Sub-expressions go through
    /// [`EvalContext::evaluate_expr`] so they are cached individually.
    #[async_recursion]
    pub async fn evaluate(&self, ctx: &EvalContext) -> LookupResult<Value> {
        match self {
            Expression::Literal(value) => Ok(Value::Concrete(value.clone())),
            Expression::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(ctx.evaluate_expr(item).await?.make_concrete().await?);
                }
                Ok(ConcreteValue::List(values).into())
            }
            Expression::This => Ok(ConcreteValue::Entry(ctx.this_entry()?.clone()).into()),
            Expression::Variable(name) => ctx
                .variable(name)
                .cloned()
                .ok_or_else(|| EvaluationError::UndefinedVariable(name.clone()).into()),
            Expression::Lambda(_) => Err(EvaluationError::message(
                "A lambda can only be used as a function argument.",
            )
            .into()),
            Expression::Attribute { object, name } => {
                let value = ctx.evaluate_expr(object).await?;
                // Sizes of a lazy value cover every item, not only the first page.
                if value.is_lazy() && matches!(name.as_str(), "length" | "totalCount") {
                    let count = value.get_count().await?;
                    return Ok(ConcreteValue::integer(count as u64).into());
                }
                let value = match value {
                    Value::Concrete(ConcreteValue::Error(error)) => {
                        return Err(Error::Lookup(error.error))
                    }
                    value => value.make_concrete().await?,
                };
                get_attribute(&value, name, ctx).await
            }
            Expression::Call(call) => call.evaluate(ctx).await,
        }
    }

    /// Evaluates and converts to `target`.
    pub async fn get_value_as(&self, target: ValueType, ctx: &EvalContext) -> LookupResult<Value> {
        self.get_value_as_one_of(&[target], ctx).await
    }

    /// Evaluates and converts to the first of `targets` that the value
    /// already is, or else the first it can be cast to.
    pub async fn get_value_as_one_of(
        &self,
        targets: &[ValueType],
        ctx: &EvalContext,
    ) -> LookupResult<Value> {
        let value = ctx.evaluate_expr(self).await?;
        if let Value::Concrete(ConcreteValue::Error(error)) = &value {
            return Err(Error::Lookup(error.error.clone()));
        }
        if targets.contains(&value.value_type()) {
            return Ok(value);
        }
        for target in targets {
            if let Some(cast) = value.cast_to(*target, ctx).await? {
                return Ok(cast);
            }
        }
        Err(self.conversion_error(targets, ctx))
    }

    fn conversion_error(&self, targets: &[ValueType], ctx: &EvalContext) -> Error {
        EvaluationError::Conversion {
            expression: self.debug_string(ctx.config().debug_string_length),
            target: targets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" or "),
        }
        .into()
    }

    /// Evaluates and forces the result; error values are re-raised.
    pub async fn get_concrete(&self, ctx: &EvalContext) -> LookupResult<ConcreteValue> {
        match ctx.evaluate_expr(self).await? {
            Value::Concrete(ConcreteValue::Error(error)) => Err(Error::Lookup(error.error)),
            value => value.make_concrete().await,
        }
    }

    pub async fn get_bool(&self, ctx: &EvalContext) -> LookupResult<bool> {
        match self.get_value_as(ValueType::Boolean, ctx).await? {
            Value::Concrete(ConcreteValue::Boolean(b)) => Ok(b),
            _ => Err(self.conversion_error(&[ValueType::Boolean], ctx)),
        }
    }

    pub async fn get_integer(&self, ctx: &EvalContext) -> LookupResult<BigInt> {
        match self.get_value_as(ValueType::Integer, ctx).await? {
            Value::Concrete(ConcreteValue::Integer(i)) => Ok(i),
            _ => Err(self.conversion_error(&[ValueType::Integer], ctx)),
        }
    }

    pub async fn get_string(&self, ctx: &EvalContext) -> LookupResult<String> {
        match self.get_value_as(ValueType::String, ctx).await? {
            Value::Concrete(ConcreteValue::String(s)) => Ok(s),
            _ => Err(self.conversion_error(&[ValueType::String], ctx)),
        }
    }

    pub async fn get_entry_set(&self, ctx: &EvalContext) -> LookupResult<LazyEntrySetValue> {
        match self.get_value_as(ValueType::LazyEntrySet, ctx).await? {
            Value::Lazy(LazyValue::EntrySet(set)) => Ok(set),
            _ => Err(self.conversion_error(&[ValueType::LazyEntrySet], ctx)),
        }
    }

    /// The node as a lambda, for arguments such as `apply=` that are not evaluated.
    pub fn as_lambda(&self, ctx: &EvalContext) -> LookupResult<&Lambda> {
        match self {
            Expression::Lambda(lambda) => Ok(lambda),
            _ => Err(EvaluationError::Conversion {
                expression: self.debug_string(ctx.config().debug_string_length),
                target: "a lambda".to_string(),
            }
            .into()),
        }
    }
}

impl FunctionCall {
    pub async fn evaluate(&self, ctx: &EvalContext) -> LookupResult<Value> {
        match self.function() {
            FunctionRef::Builtin(builtin) => builtin.evaluate(self, ctx).await,
            FunctionRef::Plugin(plugin) => plugin.evaluate(self, ctx).await,
        }
    }

    /// The positional argument; validated to be present for every
    /// function that takes one.
    pub fn argument(&self) -> LookupResult<&Expression> {
        self.positional()
            .ok_or_else(|| Error::internal(format!("{}() called without an argument", self.name())))
    }
}
