use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::multispace1,
    combinator::recognize,
    error::{context, VerboseError},
    sequence::pair,
    IResult,
};
use std::fmt;
use thiserror::Error;

use super::{
    keyword::Keyword,
    literal::{parse_literal, Literal},
    symbol::{parse_delimiter, parse_operator, Delimiter, Operator},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Identifier(String),
    Operator(Operator),
    Delimiter(Delimiter),
    Literal(Literal),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "{}", kw),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Delimiter(delim) => write!(f, "{}", delim),
            Token::Literal(lit) => match lit {
                Literal::String(s) => write!(f, "{:?}", s),
                Literal::Integer(i) => write!(f, "{}", i),
                Literal::Decimal(d) => write!(f, "{}", d),
                Literal::Quantity { magnitude, units } => write!(f, "{} [{}]", magnitude, units),
                Literal::Boolean(b) => write!(f, "{}", b),
                Literal::Null => write!(f, "null"),
                Literal::EntryRef(id) => write!(f, "[[/entry/{}]]", id),
                Literal::PropertyRef(id) => write!(f, "[[/prop/{}]]", id),
                Literal::EntryTypeRef(id) => write!(f, "[[/etype/{}]]", id),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    current_position: usize,
    current_line: usize,
    current_column: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            current_position: 0,
            current_line: 1,
            current_column: 1,
        }
    }

    /// Splits `input` into tokens. Whitespace separates tokens and is dropped.
    #[tracing::instrument(level = "debug", skip(input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        let mut remaining = input;

        while !remaining.is_empty() {
            if let Ok((rest, ws)) = parse_whitespace(remaining) {
                self.update_position(ws);
                remaining = rest;
                continue;
            }

            let start_position = self.current_position;
            let start_line = self.current_line;
            let start_column = self.current_column;

            let result = alt((
                parse_literal,
                parse_identifier,
                parse_operator,
                parse_delimiter,
            ))(remaining);

            match result {
                Ok((new_remaining, token)) => {
                    let consumed = &remaining[..(remaining.len() - new_remaining.len())];
                    self.update_position(consumed);

                    tokens.push(TokenSpan {
                        token,
                        start: start_position,
                        end: self.current_position,
                        line: start_line,
                        column: start_column,
                    });

                    remaining = new_remaining;
                }
                Err(e) => {
                    let found = remaining.chars().take(20).collect::<String>();
                    let span = Span {
                        start: self.current_position,
                        end: self.current_position + 1,
                        line: self.current_line,
                        column: self.current_column,
                    };
                    let error = match e {
                        nom::Err::Incomplete(e) => TokenizerError::ParseError {
                            message: format!("Incomplete input, {:?}", e),
                            found,
                            span,
                        },
                        nom::Err::Error(e) | nom::Err::Failure(e) => TokenizerError::ParseError {
                            message: nom::error::convert_error(remaining, e).to_string(),
                            found,
                            span,
                        },
                    };
                    tracing::error!("{}", error);
                    return Err(error);
                }
            }
        }

        Ok(tokens)
    }

    fn update_position(&mut self, text: &str) {
        for c in text.chars() {
            self.current_position += c.len_utf8();
            if c == '\n' {
                self.current_line += 1;
                self.current_column = 1;
            } else {
                self.current_column += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line: {}, column: {}, start: {}, end: {}",
            self.line, self.column, self.start, self.end
        )
    }
}

fn parse_whitespace(input: &str) -> ParserResult<&str> {
    multispace1(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_identifier(input: &str) -> ParserResult<Token> {
    let (input, id) = context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
    )(input)?;

    match id {
        "true" => return Ok((input, Token::Literal(Literal::Boolean(true)))),
        "false" => return Ok((input, Token::Literal(Literal::Boolean(false)))),
        "null" => return Ok((input, Token::Literal(Literal::Null))),
        _ => {}
    }
    if let Ok(kw) = Keyword::try_from(id) {
        return Ok((input, Token::Keyword(kw)));
    }

    Ok((input, Token::Identifier(id.to_string())))
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("Parse error: {message} at position {span}")]
    ParseError {
        message: String,
        found: String,
        span: Span,
    },
}

impl TokenizerError {
    pub fn span(&self) -> &Span {
        match self {
            TokenizerError::ParseError { span, .. } => span,
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Tokenizer::new()
            .tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_identifier_for_keyword() {
        let (rest, token) = parse_identifier("this").unwrap();
        assert_eq!(token, Token::Keyword(Keyword::This));
        assert_eq!(rest, "");
    }

    #[test]
    fn test_identifier() {
        let (rest, token) = parse_identifier("withDetail other").unwrap();
        assert_eq!(token, Token::Identifier("withDetail".to_string()));
        assert_eq!(rest, " other");
    }

    #[test]
    fn test_boolean_and_null_literals() {
        assert_eq!(
            tokens("true false null"),
            vec![
                Token::Literal(Literal::Boolean(true)),
                Token::Literal(Literal::Boolean(false)),
                Token::Literal(Literal::Null),
            ]
        );
    }

    #[test]
    fn test_dotted_call() {
        assert_eq!(
            tokens("this.ancestors().count()"),
            vec![
                Token::Keyword(Keyword::This),
                Token::Operator(Operator::Dot),
                Token::Identifier("ancestors".to_string()),
                Token::Delimiter(Delimiter::OpenParen),
                Token::Delimiter(Delimiter::CloseParen),
                Token::Operator(Operator::Dot),
                Token::Identifier("count".to_string()),
                Token::Delimiter(Delimiter::OpenParen),
                Token::Delimiter(Delimiter::CloseParen),
            ]
        );
    }

    #[test]
    fn test_lambda_tokens() {
        assert_eq!(
            tokens("(x->-3)"),
            vec![
                Token::Delimiter(Delimiter::OpenParen),
                Token::Identifier("x".to_string()),
                Token::Operator(Operator::Arrow),
                Token::Literal(Literal::Integer(BigInt::from(-3))),
                Token::Delimiter(Delimiter::CloseParen),
            ]
        );
    }

    #[test]
    fn test_list_with_reference() {
        assert_eq!(
            tokens("[[[/entry/a]], 2]"),
            vec![
                Token::Delimiter(Delimiter::OpenBracket),
                Token::Literal(Literal::EntryRef("a".to_string())),
                Token::Delimiter(Delimiter::Comma),
                Token::Literal(Literal::Integer(BigInt::from(2))),
                Token::Delimiter(Delimiter::CloseBracket),
            ]
        );
    }

    #[test]
    fn test_tokenizer_with_position() {
        let mut tokenizer = Tokenizer::new();
        let spans = tokenizer.tokenize("x\n  other").unwrap();

        assert_eq!(spans[0].line, 1);
        assert_eq!(spans[0].column, 1);
        assert_eq!(spans[1].line, 2);
        assert_eq!(spans[1].column, 3);
        assert_eq!(spans[1].start, 4);
    }

    #[test]
    fn test_tokenizer_error() {
        let mut tokenizer = Tokenizer::new();
        let err = tokenizer.tokenize("count(x) $").unwrap_err();
        assert_eq!(err.span().start, 9);
    }

    #[test]
    fn test_token_display() {
        assert_eq!(
            Token::Literal(Literal::String("a\"b".to_string())).to_string(),
            "\"a\\\"b\""
        );
        assert_eq!(Token::Keyword(Keyword::This).to_string(), "this");
    }
}
