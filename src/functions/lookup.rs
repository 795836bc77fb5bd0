//! Functions that build on lazy entry sets. Each one extends the query
//! fragment of its input; nothing is executed until the result is paged.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::{Expression, FunctionCall};
use crate::error::{Error, EvaluationError, LookupResult};
use crate::eval::EvalContext;
use crate::model::{EntryId, EntryTypeId, FactSource, PropertyKind, PropertyRecord, ResolvedFact};
use crate::provider::{Permission, PermissionObject};
use crate::query::{Clause, Direction, Predicate, QueryFragment, Reviver, Scalar, SortBy, SortKey};
use crate::value::{
    ConcreteValue, IterableSource, LazyEntrySetValue, LazyIterableValue, LazyValue, Value,
    ValueType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Ancestors,
    AndAncestors,
    Descendants,
    AndDescendants,
}

impl Traversal {
    fn direction(&self) -> Direction {
        match self {
            Traversal::Ancestors | Traversal::AndAncestors => Direction::Outgoing,
            Traversal::Descendants | Traversal::AndDescendants => Direction::Incoming,
        }
    }

    fn include_self(&self) -> bool {
        matches!(self, Traversal::AndAncestors | Traversal::AndDescendants)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperation {
    Union,
    Intersection,
    Difference,
}

impl SetOperation {
    fn argument(&self) -> &'static str {
        match self {
            SetOperation::Union | SetOperation::Intersection => "with",
            SetOperation::Difference => "without",
        }
    }
}

fn entry_set(ctx: &EvalContext, fragment: QueryFragment) -> Value {
    Value::Lazy(LazyValue::EntrySet(LazyEntrySetValue::new(ctx, fragment)))
}

fn required<'a>(call: &'a FunctionCall, key: &str) -> LookupResult<&'a Expression> {
    call.arg(key)
        .ok_or_else(|| Error::internal(format!("{}() called without {}=", call.name(), key)))
}

pub async fn all_entries(ctx: &EvalContext) -> LookupResult<Value> {
    let mut fragment = QueryFragment::all_entries(ctx.site_id().clone());
    let entity = fragment.entity.clone();
    fragment.push(Clause::Where(ctx.view_predicate(&entity).await?));
    Ok(entry_set(ctx, fragment))
}

/// Ancestors or descendants, nearest first, each annotated with its distance.
pub async fn traverse(
    call: &FunctionCall,
    ctx: &EvalContext,
    traversal: Traversal,
) -> LookupResult<Value> {
    let mut fragment = call.argument()?.get_entry_set(ctx).await?.into_fragment();
    let from = fragment.entity.clone();
    let to = fragment.new_var("node");
    let distance = fragment.new_var("distance");

    fragment.push(Clause::Traverse {
        from,
        to: to.clone(),
        direction: traversal.direction(),
        include_self: traversal.include_self(),
        max_depth: ctx.config().max_traversal_depth,
        distance: distance.clone(),
    });
    fragment.push(Clause::Where(ctx.view_predicate(&to).await?));
    fragment.set_entity(to);
    fragment.clear_annotations();
    fragment.annotate("distance", Scalar::Var(distance.clone()), Reviver::Integer);
    fragment
        .order
        .insert(0, SortKey::asc(SortBy::Scalar(Scalar::Var(distance))));
    Ok(entry_set(ctx, fragment))
}

/// The entry types named by a `filter()` argument: one type or any
/// iterable of types.
async fn entry_types(expr: &Expression, ctx: &EvalContext) -> LookupResult<Vec<EntryTypeId>> {
    let value = expr
        .get_value_as_one_of(&[ValueType::EntryType, ValueType::List], ctx)
        .await?;
    let items = match value {
        Value::Concrete(ConcreteValue::EntryType(id)) => return Ok(vec![id]),
        Value::Concrete(ConcreteValue::List(items)) => items,
        other => other.collect_all(ctx.config().materialize_chunk_size).await?,
    };
    items
        .into_iter()
        .map(|item| match item.unannotated() {
            ConcreteValue::EntryType(id) => Ok(id.clone()),
            _ => Err(EvaluationError::Conversion {
                expression: expr.debug_string(ctx.config().debug_string_length),
                target: "a list of entry types".to_string(),
            }
            .into()),
        })
        .collect()
}

pub async fn filter(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let set = call.argument()?.get_entry_set(ctx).await?;
    let mut fragment = set.into_fragment();
    let entity = fragment.entity.clone();

    if let Some(expr) = call.arg("entryType") {
        fragment.push(Clause::Where(Predicate::EntryTypeIn {
            var: entity.clone(),
            types: entry_types(expr, ctx).await?,
        }));
    }
    if let Some(expr) = call.arg("excludeEntryType") {
        fragment.push(Clause::Where(Predicate::not(Predicate::EntryTypeIn {
            var: entity,
            types: entry_types(expr, ctx).await?,
        })));
    }
    Ok(entry_set(ctx, fragment))
}

pub async fn set_operation(
    call: &FunctionCall,
    ctx: &EvalContext,
    operation: SetOperation,
) -> LookupResult<Value> {
    let mut fragment = call.argument()?.get_entry_set(ctx).await?.into_fragment();
    let other = required(call, operation.argument())?
        .get_entry_set(ctx)
        .await?
        .into_fragment();
    let var = fragment.entity.clone();

    match operation {
        SetOperation::Union => {
            fragment.push(Clause::Union {
                var: var.clone(),
                other: Box::new(other),
            });
            // Rows from the other side carry none of this side's annotations.
            fragment.clear_annotations();
            fragment.set_entity(var);
        }
        SetOperation::Intersection | SetOperation::Difference => {
            fragment.push(Clause::Intersect {
                var,
                other: Box::new(other),
                negate: operation == SetOperation::Difference,
            });
        }
    }
    Ok(entry_set(ctx, fragment))
}

/// Resolves the `prop=` argument and checks the subject may read it.
async fn resolve_property(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<PropertyRecord> {
    let value = required(call, "prop")?
        .get_value_as_one_of(&[ValueType::Property, ValueType::String], ctx)
        .await?;
    let id = match value {
        Value::Concrete(ConcreteValue::Property(id)) => id.to_string(),
        Value::Concrete(ConcreteValue::String(id)) => id,
        _ => return Err(EvaluationError::message("prop= requires a property.").into()),
    };
    let property = ctx
        .transaction()
        .property(ctx.site_id(), &id)
        .await?
        .ok_or_else(|| EvaluationError::not_found("Property", &id))?;
    let allowed = ctx
        .permissions()
        .has_permission(
            &ctx.subject(),
            Permission::ViewProperty,
            &PermissionObject::Property(property.id.clone()),
        )
        .await?;
    if !allowed {
        return Err(EvaluationError::PermissionDenied(format!("view \"{}\"", property.name)).into());
    }
    Ok(property)
}

fn is_relationship(property: &PropertyRecord) -> bool {
    matches!(property.kind, PropertyKind::Relationship | PropertyKind::IsA)
}

/// The argument as a single entry, for value property lookups.
async fn single_entry(call: &FunctionCall, ctx: &EvalContext, what: &str) -> LookupResult<EntryId> {
    let value = ctx.evaluate_expr(call.argument()?).await?;
    match value {
        Value::Concrete(ConcreteValue::Error(error)) => Err(error.error.into()),
        Value::Concrete(value) => match value.unannotated() {
            ConcreteValue::Entry(id) => Ok(id.clone()),
            _ => Err(EvaluationError::NotSupported(format!(
                "{} of a value property for anything but a single entry",
                what
            ))
            .into()),
        },
        Value::Lazy(_) => Err(EvaluationError::NotSupported(format!(
            "{} of a value property for a set of entries",
            what
        ))
        .into()),
    }
}

/// Annotations describing where a fact came from. An ancestor the subject
/// may not view is left out.
async fn fact_annotations(
    resolved: &ResolvedFact,
    ctx: &EvalContext,
) -> LookupResult<BTreeMap<String, ConcreteValue>> {
    let mut annotations = BTreeMap::new();
    if let FactSource::Ancestor { entry, .. } = &resolved.source {
        if ctx.can_view_entry(entry).await? {
            annotations.insert("inheritedFrom".to_string(), ConcreteValue::Entry(entry.clone()));
        }
    }
    if !resolved.fact.note.is_empty() {
        annotations.insert("note".to_string(), ConcreteValue::string(&resolved.fact.note));
    }
    if !resolved.fact.slot.is_empty() {
        annotations.insert("slot".to_string(), ConcreteValue::string(&resolved.fact.slot));
    }
    Ok(annotations)
}

/// Value of a value or auto property for one entry. Stored expressions are
/// evaluated with the entry as `this`.
async fn property_value(
    entry: &EntryId,
    property: &PropertyRecord,
    ctx: &EvalContext,
) -> LookupResult<Value> {
    let scope = ctx.entry_scope(entry);
    let facts = if property.kind == PropertyKind::Auto {
        Vec::new()
    } else {
        ctx.inheritance()
            .get_entry_property(ctx.site_id(), entry, &property.id)
            .await?
    };

    if facts.is_empty() {
        return match &property.default {
            Some(default) => {
                let expr = scope.parse(default)?;
                scope.evaluate_expr(&expr).await
            }
            None => Ok(Value::null()),
        };
    }

    let mut values = Vec::with_capacity(facts.len());
    for resolved in &facts {
        let expr = scope.parse(&resolved.fact.value_expression)?;
        let value = scope.evaluate_expr(&expr).await?.make_concrete().await?;
        let annotations = fact_annotations(resolved, ctx).await?;
        if annotations.is_empty() || matches!(value, ConcreteValue::Error(_)) {
            values.push(value);
        } else {
            values.push(value.annotate(annotations)?);
        }
    }
    if values.len() == 1 {
        Ok(values.remove(0).into())
    } else {
        Ok(ConcreteValue::List(values).into())
    }
}

/// Replaces the entity of `fragment` with the targets of `property`,
/// annotated with the fact's rank, note, slot and inheritance source.
async fn follow_property(
    mut fragment: QueryFragment,
    property: &PropertyRecord,
    ctx: &EvalContext,
) -> LookupResult<QueryFragment> {
    let from = fragment.entity.clone();
    let to = fragment.new_var("target");
    let fact = fragment.new_var("fact");
    let source = fragment.new_var("source");

    fragment.push(Clause::PropertyFacts {
        from: from.clone(),
        to: to.clone(),
        property: property.id.clone(),
        fact: fact.clone(),
        source: source.clone(),
        inherit: property.inheritable,
    });
    fragment.push(Clause::Where(ctx.view_predicate(&to).await?));
    let visible = ctx.view_predicate(&source).await?;
    fragment.set_entity(to);
    fragment.clear_annotations();
    annotate_fact_scalars(&mut fragment, &fact);
    fragment.annotate(
        "inheritedFrom",
        Scalar::InheritedFrom {
            source,
            origin: from,
            visible,
        },
        Reviver::Entry,
    );
    fragment
        .order
        .insert(0, SortKey::asc(SortBy::Scalar(Scalar::FactRank(fact))));
    Ok(fragment)
}

fn annotate_fact_scalars(fragment: &mut QueryFragment, fact: &crate::query::Var) {
    fragment.annotate("rank", Scalar::FactRank(fact.clone()), Reviver::Integer);
    fragment.annotate("note", Scalar::FactNote(fact.clone()), Reviver::String);
    fragment.annotate("slot", Scalar::FactSlot(fact.clone()), Reviver::String);
}

pub async fn get(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let property = resolve_property(call, ctx).await?;
    if is_relationship(&property) {
        let fragment = call.argument()?.get_entry_set(ctx).await?.into_fragment();
        let fragment = follow_property(fragment, &property, ctx).await?;
        Ok(entry_set(ctx, fragment))
    } else {
        let entry = single_entry(call, ctx, "get()").await?;
        property_value(&entry, &property, ctx).await
    }
}

/// Entries whose `prop` relationship points at the given entries.
pub async fn reverse(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let property = resolve_property(call, ctx).await?;
    if !is_relationship(&property) {
        return Err(EvaluationError::message(format!(
            "reverse() requires a relationship property, but \"{}\" holds values.",
            property.name
        ))
        .into());
    }

    let mut fragment = call.argument()?.get_entry_set(ctx).await?.into_fragment();
    let from = fragment.entity.clone();
    let to = fragment.new_var("source");
    let fact = fragment.new_var("fact");
    fragment.push(Clause::Related {
        from,
        to: to.clone(),
        property: property.id.clone(),
        direction: Direction::Incoming,
        fact: fact.clone(),
    });
    fragment.push(Clause::Where(ctx.view_predicate(&to).await?));
    fragment.set_entity(to);
    fragment.clear_annotations();
    annotate_fact_scalars(&mut fragment, &fact);
    fragment
        .order
        .insert(0, SortKey::asc(SortBy::Scalar(Scalar::FactRank(fact))));
    Ok(entry_set(ctx, fragment))
}

/// The first page of `property`'s targets for one entry.
async fn relationship_detail(
    entry: &EntryId,
    property: &PropertyRecord,
    ctx: &EvalContext,
) -> LookupResult<ConcreteValue> {
    let fragment = QueryFragment::entry(ctx.site_id().clone(), entry.clone());
    let fragment = follow_property(fragment, property, ctx).await?;
    entry_set(ctx, fragment).make_concrete().await
}

fn with_detail_annotation(
    item: ConcreteValue,
    detail: ConcreteValue,
) -> Result<ConcreteValue, EvaluationError> {
    item.annotate(BTreeMap::from([("detail".to_string(), detail)]))
}

pub async fn with_detail(call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
    let property = resolve_property(call, ctx).await?;
    if !is_relationship(&property) {
        let entry = single_entry(call, ctx, "withDetail()").await?;
        let detail = property_value(&entry, &property, ctx)
            .await?
            .make_concrete()
            .await?;
        let item = call.argument()?.get_concrete(ctx).await?;
        return Ok(with_detail_annotation(item, detail)?.into());
    }

    let set = call.argument()?.get_entry_set(ctx).await?;
    Ok(Value::Lazy(LazyValue::Iterable(LazyIterableValue::new(
        Arc::new(DetailedEntries {
            entries: Value::Lazy(LazyValue::EntrySet(set)),
            property,
            ctx: ctx.detached(),
        }),
        ctx.default_page_size(),
    ))))
}

/// Entries of a set, each annotated with the targets of a relationship.
struct DetailedEntries {
    entries: Value,
    property: PropertyRecord,
    ctx: EvalContext,
}

#[async_trait]
impl IterableSource for DetailedEntries {
    fn describe(&self) -> String {
        format!("withDetail(prop={})", self.property.id)
    }

    async fn get_count(&self) -> LookupResult<usize> {
        self.entries.get_count().await
    }

    async fn get_slice(&self, offset: usize, count: usize) -> LookupResult<Vec<ConcreteValue>> {
        let items = self.entries.get_slice(offset, count).await?;
        let mut detailed = Vec::with_capacity(items.len());
        for item in items {
            let ConcreteValue::Entry(entry) = item.unannotated().clone() else {
                detailed.push(item);
                continue;
            };
            let detail = relationship_detail(&entry, &self.property, &self.ctx).await?;
            detailed.push(with_detail_annotation(item, detail)?);
        }
        Ok(detailed)
    }
}
