//! # Function Library
//!
//! The built-in vocabulary of the expression language. Each function has a
//! [`Signature`] checked at parse time and an implementation in one of the
//! submodules:
//!
//! * [`scalar`]: scalars, conversions and annotations
//! * [`lookup`]: graph-backed entry sets (traversal, filters, set algebra, properties)
//! * [`iter`]: `map`, `sort` and `slice` over any iterable
//! * [`graph`]: the `graph()` visualization

use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::ast::{FunctionCall, Signature};
use crate::error::LookupResult;
use crate::eval::EvalContext;
use crate::value::Value;

pub mod graph;
pub mod iter;
pub mod lookup;
pub mod registry;
pub mod scalar;

pub use registry::{FunctionDescription, FunctionOrigin, FunctionRegistry};

const ANNOTATION_RESERVED_KEYS: &[&str] = &["key", "value", "id", "type"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum BuiltinFunction {
    AllEntries,
    AllEntryTypes,
    Ancestors,
    AndAncestors,
    Descendants,
    AndDescendants,
    Count,
    First,
    Date,
    Entry,
    EntryType,
    Prop,
    Not,
    Range,
    Markdown,
    Filter,
    Map,
    Sort,
    Slice,
    Get,
    Reverse,
    Annotate,
    WithDetail,
    If,
    Union,
    Intersection,
    Difference,
    Graph,
}

impl BuiltinFunction {
    pub fn all() -> impl Iterator<Item = BuiltinFunction> {
        BuiltinFunction::iter()
    }

    pub fn signature(&self) -> Signature {
        use BuiltinFunction::*;
        match self {
            AllEntries | AllEntryTypes => Signature::NoArgs,
            Ancestors | AndAncestors | Descendants | AndDescendants | Count | First | Date
            | Entry | EntryType | Prop | Not | Range | Markdown | Graph => Signature::OneArg,
            Filter => Signature::multi(&[], &["entryType", "excludeEntryType"]),
            Map => Signature::multi(&["apply"], &[]),
            Sort => Signature::multi(&[], &["by", "reverse"]),
            Slice => Signature::multi(&[], &["start", "end", "size"]),
            Get | Reverse | WithDetail => Signature::multi(&["prop"], &[]),
            Annotate => Signature::MultiArg {
                required: &[],
                optional: &[],
                open: true,
                reserved: ANNOTATION_RESERVED_KEYS,
            },
            If => Signature::multi(&["then"], &["else"]),
            Union | Intersection => Signature::multi(&["with"], &[]),
            Difference => Signature::multi(&["without"], &[]),
        }
    }

    pub fn description(&self) -> &'static str {
        use BuiltinFunction::*;
        match self {
            AllEntries => "Every entry of the site.",
            AllEntryTypes => "Every entry type of the site.",
            Ancestors => "Entries reachable by IS-A relationships, nearest first.",
            AndAncestors => "The entry itself plus its ancestors.",
            Descendants => "Entries that reach this one by IS-A relationships, nearest first.",
            AndDescendants => "The entry itself plus its descendants.",
            Count => "Number of items.",
            First => "The first item, or null.",
            Date => "Parses YYYY-MM-DD, YYYY-MM or YYYY.",
            Entry => "An entry by id or key.",
            EntryType => "An entry type by id, or the type of an entry.",
            Prop => "A property by id or key.",
            Not => "Boolean negation.",
            Range => "Minimum and maximum of the items.",
            Markdown => "Marks a string as Markdown.",
            Filter => "Keeps entries of (or excludes entries of) the given types.",
            Map => "Applies a lambda to each item.",
            Sort => "Sorts items, optionally by a lambda.",
            Slice => "A page of items; negative indexes count from the end.",
            Get => "Value of a property for an entry or set of entries.",
            Reverse => "Entries that point at these entries through a relationship property.",
            Annotate => "Attaches named annotations.",
            WithDetail => "Annotates each entry with the value of a property.",
            If => "Chooses between two values.",
            Union => "Entries in either set.",
            Intersection => "Entries in both sets.",
            Difference => "Entries in the first set but not the second.",
            Graph => "Entries and their relationships, for drawing.",
        }
    }

    pub async fn evaluate(&self, call: &FunctionCall, ctx: &EvalContext) -> LookupResult<Value> {
        use BuiltinFunction::*;
        match self {
            AllEntries => lookup::all_entries(ctx).await,
            AllEntryTypes => scalar::all_entry_types(ctx).await,
            Ancestors => lookup::traverse(call, ctx, lookup::Traversal::Ancestors).await,
            AndAncestors => lookup::traverse(call, ctx, lookup::Traversal::AndAncestors).await,
            Descendants => lookup::traverse(call, ctx, lookup::Traversal::Descendants).await,
            AndDescendants => lookup::traverse(call, ctx, lookup::Traversal::AndDescendants).await,
            Count => scalar::count(call, ctx).await,
            First => scalar::first(call, ctx).await,
            Date => scalar::date(call, ctx).await,
            Entry => scalar::entry(call, ctx).await,
            EntryType => scalar::entry_type(call, ctx).await,
            Prop => scalar::prop(call, ctx).await,
            Not => scalar::not(call, ctx).await,
            Range => scalar::range(call, ctx).await,
            Markdown => scalar::markdown(call, ctx).await,
            Filter => lookup::filter(call, ctx).await,
            Map => iter::map(call, ctx).await,
            Sort => iter::sort(call, ctx).await,
            Slice => iter::slice(call, ctx).await,
            Get => lookup::get(call, ctx).await,
            Reverse => lookup::reverse(call, ctx).await,
            Annotate => scalar::annotate(call, ctx).await,
            WithDetail => lookup::with_detail(call, ctx).await,
            If => scalar::if_then_else(call, ctx).await,
            Union => lookup::set_operation(call, ctx, lookup::SetOperation::Union).await,
            Intersection => lookup::set_operation(call, ctx, lookup::SetOperation::Intersection).await,
            Difference => lookup::set_operation(call, ctx, lookup::SetOperation::Difference).await,
            Graph => graph::graph(call, ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(BuiltinFunction::AllEntries.to_string(), "allEntries");
        assert_eq!(BuiltinFunction::If.to_string(), "if");
        assert_eq!(BuiltinFunction::WithDetail.to_string(), "withDetail");
        assert_eq!(
            "andDescendants".parse::<BuiltinFunction>().unwrap(),
            BuiltinFunction::AndDescendants
        );
    }

    #[test]
    fn test_every_builtin_has_a_description() {
        assert!(BuiltinFunction::all().all(|f| !f.description().is_empty()));
    }
}
