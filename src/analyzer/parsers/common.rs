use super::super::{core::*, prelude::*};
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};
use crate::value::ConcreteValue;
use crate::model::{EntryId, EntryTypeId, PropertyId};

// basic tokens
pub fn parse_identifier() -> impl Parser<Token, String> {
    with_context(
        satisfy(
            |token: &Token| match token {
                Token::Identifier(s) => Some(s.clone()),
                _ => None,
            },
            "identifier",
        ),
        "identifier",
    )
}

pub fn parse_this() -> impl Parser<Token, Token> {
    equal(Token::Keyword(Keyword::This))
}

/// A lambda parameter. `this` is accepted here so the caller can reject it
/// with a precise error.
pub fn parse_parameter() -> impl Parser<Token, String> {
    satisfy(
        |token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            Token::Keyword(Keyword::This) => Some(Keyword::This.to_string()),
            _ => None,
        },
        "parameter name",
    )
}

pub fn parse_comma() -> impl Parser<Token, Token> {
    with_context(equal(Token::Delimiter(Delimiter::Comma)), "comma")
}

pub fn parse_open_paren() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::OpenParen))
}

pub fn parse_close_paren() -> impl Parser<Token, Token> {
    with_context(equal(Token::Delimiter(Delimiter::CloseParen)), "close paren")
}

pub fn parse_open_bracket() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::OpenBracket))
}

pub fn parse_close_bracket() -> impl Parser<Token, Token> {
    with_context(
        equal(Token::Delimiter(Delimiter::CloseBracket)),
        "close bracket",
    )
}

pub fn parse_dot() -> impl Parser<Token, Token> {
    equal(Token::Operator(Operator::Dot))
}

pub fn parse_arrow() -> impl Parser<Token, Token> {
    equal(Token::Operator(Operator::Arrow))
}

pub fn parse_assign() -> impl Parser<Token, Token> {
    equal(Token::Operator(Operator::Assign))
}

// literals
pub fn parse_literal() -> impl Parser<Token, ConcreteValue> {
    with_context(
        satisfy(
            |token: &Token| match token {
                Token::Literal(literal) => Some(literal_value(literal)),
                _ => None,
            },
            "literal",
        ),
        "literal",
    )
}

fn literal_value(literal: &Literal) -> ConcreteValue {
    match literal {
        Literal::String(s) => ConcreteValue::String(s.clone()),
        Literal::Integer(i) => ConcreteValue::Integer(i.clone()),
        Literal::Decimal(d) => ConcreteValue::quantity(*d, None),
        Literal::Quantity { magnitude, units } => {
            ConcreteValue::quantity(*magnitude, Some(units.clone()))
        }
        Literal::Boolean(b) => ConcreteValue::Boolean(*b),
        Literal::Null => ConcreteValue::Null,
        Literal::EntryRef(id) => ConcreteValue::Entry(EntryId::new(id.clone())),
        Literal::PropertyRef(id) => ConcreteValue::Property(PropertyId::new(id.clone())),
        Literal::EntryTypeRef(id) => ConcreteValue::EntryType(EntryTypeId::new(id.clone())),
    }
}
