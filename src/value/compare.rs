use num_bigint::Sign;
use std::cmp::Ordering;

use super::cast::integer_to_decimal;
use super::ConcreteValue;
use crate::error::EvaluationError;

/// Orders two concrete values.
///
/// Same-typed numbers, strings, booleans and dates compare naturally.
/// Integers compare with unitless quantities, and partial dates with full
/// dates by their first day. Any other pair is an error naming both types.
pub fn compare_values(a: &ConcreteValue, b: &ConcreteValue) -> Result<Ordering, EvaluationError> {
    let (a, b) = (a.unannotated(), b.unannotated());
    let ordering = match (a, b) {
        (ConcreteValue::Integer(x), ConcreteValue::Integer(y)) => Some(x.cmp(y)),
        (ConcreteValue::Quantity(x), ConcreteValue::Quantity(y)) if x.units == y.units => {
            Some(x.magnitude.cmp(&y.magnitude))
        }
        (ConcreteValue::Integer(x), ConcreteValue::Quantity(y)) if y.units.is_none() => {
            Some(compare_integer_decimal(x, &y.magnitude))
        }
        (ConcreteValue::Quantity(x), ConcreteValue::Integer(y)) if x.units.is_none() => {
            Some(compare_integer_decimal(y, &x.magnitude).reverse())
        }
        (ConcreteValue::String(x), ConcreteValue::String(y))
        | (ConcreteValue::Markdown(x), ConcreteValue::Markdown(y)) => Some(x.cmp(y)),
        (ConcreteValue::Boolean(x), ConcreteValue::Boolean(y)) => Some(x.cmp(y)),
        (ConcreteValue::Date(x), ConcreteValue::Date(y)) => Some(x.cmp(y)),
        (ConcreteValue::PartialDate(x), ConcreteValue::PartialDate(y)) => {
            Some((x.year, x.month.unwrap_or(1)).cmp(&(y.year, y.month.unwrap_or(1))))
        }
        (ConcreteValue::PartialDate(x), ConcreteValue::Date(y)) => x.first_day().map(|d| d.cmp(y)),
        (ConcreteValue::Date(x), ConcreteValue::PartialDate(y)) => y.first_day().map(|d| x.cmp(&d)),
        _ => None,
    };
    ordering.ok_or_else(|| EvaluationError::Incomparable {
        left: a.value_type().to_string(),
        right: b.value_type().to_string(),
    })
}

fn compare_integer_decimal(integer: &num_bigint::BigInt, decimal: &rust_decimal::Decimal) -> Ordering {
    match integer_to_decimal(integer) {
        Some(converted) => converted.cmp(decimal),
        // Too large for a decimal, so larger in magnitude than any decimal.
        None if integer.sign() == Sign::Minus => Ordering::Less,
        None => Ordering::Greater,
    }
}

/// Sorts `items` by their keys. Null keys go last in either direction.
pub fn sort_values<T>(
    items: Vec<(ConcreteValue, T)>,
    descending: bool,
) -> Result<Vec<T>, EvaluationError> {
    let (nulls, mut keyed): (Vec<_>, Vec<_>) = items.into_iter().partition(|(key, _)| key.is_null());

    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| match compare_values(a, b) {
        Ok(ordering) if descending => ordering.reverse(),
        Ok(ordering) => ordering,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    Ok(keyed
        .into_iter()
        .chain(nulls)
        .map(|(_, item)| item)
        .collect())
}
