use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, digit1, space0},
    combinator::{map, map_res, opt, recognize, value},
    error::context,
    multi::fold_many0,
    sequence::{delimited, pair, preceded, tuple},
};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(BigInt),
    /// A number with a fractional part and no units.
    Decimal(Decimal),
    Quantity { magnitude: Decimal, units: String },
    Boolean(bool),
    Null,
    EntryRef(String),
    PropertyRef(String),
    EntryTypeRef(String),
}

enum StringChunk<'a> {
    Text(&'a str),
    Escaped(char),
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_escape(input: &str) -> ParserResult<char> {
    preceded(
        char('\\'),
        alt((
            value('"', char('"')),
            value('\\', char('\\')),
            value('\n', char('n')),
            value('\t', char('t')),
            value('\r', char('r')),
        )),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(
            delimited(
                char('"'),
                fold_many0(
                    alt((
                        map(is_not("\"\\"), StringChunk::Text),
                        map(parse_escape, StringChunk::Escaped),
                    )),
                    String::new,
                    |mut acc, chunk| {
                        match chunk {
                            StringChunk::Text(s) => acc.push_str(s),
                            StringChunk::Escaped(c) => acc.push(c),
                        }
                        acc
                    },
                ),
                char('"'),
            ),
            Literal::String,
        ),
    )(input)
}

fn parse_number_text(input: &str) -> ParserResult<&str> {
    recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)
}

fn parse_units(input: &str) -> ParserResult<&str> {
    preceded(
        space0,
        delimited(
            char('['),
            map(take_while1(|c: char| c != '[' && c != ']'), str::trim),
            char(']'),
        ),
    )(input)
}

/// Integers, unitless decimals and quantities such as `5 [kg]`.
#[tracing::instrument(level = "debug", skip(input))]
fn parse_number_literal(input: &str) -> ParserResult<Literal> {
    context(
        "number literal",
        map_res(
            pair(parse_number_text, opt(parse_units)),
            |(number, units): (&str, Option<&str>)| -> Result<Literal, String> {
                match units {
                    Some(units) => Ok(Literal::Quantity {
                        magnitude: Decimal::from_str(number).map_err(|e| e.to_string())?,
                        units: units.to_string(),
                    }),
                    None if number.contains('.') => Decimal::from_str(number)
                        .map(Literal::Decimal)
                        .map_err(|e| e.to_string()),
                    None => BigInt::from_str(number)
                        .map(Literal::Integer)
                        .map_err(|e| e.to_string()),
                }
            },
        ),
    )(input)
}

fn parse_reference_id(input: &str) -> ParserResult<&str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)
}

/// `[[/entry/ID]]`, `[[/prop/ID]]` and `[[/etype/ID]]`.
#[tracing::instrument(level = "debug", skip(input))]
fn parse_reference_literal(input: &str) -> ParserResult<Literal> {
    context(
        "reference literal",
        delimited(
            tag("[[/"),
            alt((
                map(preceded(tag("entry/"), parse_reference_id), |id: &str| {
                    Literal::EntryRef(id.to_string())
                }),
                map(preceded(tag("prop/"), parse_reference_id), |id: &str| {
                    Literal::PropertyRef(id.to_string())
                }),
                map(preceded(tag("etype/"), parse_reference_id), |id: &str| {
                    Literal::EntryTypeRef(id.to_string())
                }),
            )),
            tag("]]"),
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((
                parse_string_literal,
                parse_reference_literal,
                parse_number_literal,
            )),
            Token::Literal,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_string() {
        let (rest, result) = parse_string_literal("\"hello world\"").unwrap();
        assert_eq!(rest, "");
        assert_eq!(result, Literal::String("hello world".to_string()));
    }

    #[test]
    fn test_escaped_string() {
        let (rest, result) = parse_string_literal(r#""say \"hi\"\n\\ok""#).unwrap();
        assert_eq!(rest, "");
        assert_eq!(result, Literal::String("say \"hi\"\n\\ok".to_string()));
    }

    #[test]
    fn test_empty_string() {
        let (_, result) = parse_string_literal("\"\"").unwrap();
        assert_eq!(result, Literal::String(String::new()));
    }

    #[test]
    fn test_number_literals() {
        let (rest, result) = parse_number_literal("123").unwrap();
        assert_eq!(result, Literal::Integer(BigInt::from(123)));
        assert_eq!(rest, "");

        let (_, result) = parse_number_literal("-18").unwrap();
        assert_eq!(result, Literal::Integer(BigInt::from(-18)));

        let (_, result) = parse_number_literal("-2.0").unwrap();
        assert_eq!(result, Literal::Decimal(Decimal::from_str("-2.0").unwrap()));

        let huge = "123456789012345678901234567890";
        let (_, result) = parse_number_literal(huge).unwrap();
        assert_eq!(result, Literal::Integer(BigInt::from_str(huge).unwrap()));
    }

    #[test]
    fn test_number_followed_by_call() {
        let (rest, result) = parse_number_literal("123.annotate(a=1)").unwrap();
        assert_eq!(result, Literal::Integer(BigInt::from(123)));
        assert_eq!(rest, ".annotate(a=1)");
    }

    #[test]
    fn test_quantity_literal() {
        let (rest, result) = parse_number_literal("15.5 [kg]").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            result,
            Literal::Quantity {
                magnitude: Decimal::from_str("15.5").unwrap(),
                units: "kg".to_string()
            }
        );
    }

    #[test]
    fn test_reference_literals() {
        let (_, result) = parse_reference_literal("[[/entry/_abc-1]]").unwrap();
        assert_eq!(result, Literal::EntryRef("_abc-1".to_string()));
        let (_, result) = parse_reference_literal("[[/prop/p1]]").unwrap();
        assert_eq!(result, Literal::PropertyRef("p1".to_string()));
        let (_, result) = parse_reference_literal("[[/etype/t1]]").unwrap();
        assert_eq!(result, Literal::EntryTypeRef("t1".to_string()));
        assert!(parse_reference_literal("[[/other/x]]").is_err());
    }
}
