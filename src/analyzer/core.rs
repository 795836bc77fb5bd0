//! # Core Parser Definitions
//!
//! The parser interface and error type shared by every combinator.

use thiserror::Error;

use crate::ast::function::ArgumentError;
use crate::tokenizer::TokenizerError;

/// Parser trait defines the core parsing interface.
///
/// A parser takes the whole input slice and a start position, and returns the
/// position after the consumed input together with the parsed value.
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

impl<I, O, P: Parser<I, O> + ?Sized> Parser<I, O> for Box<P> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (**self).parse(input, pos)
    }
}

/// On success, the new position and the parsed value.
pub type ParseResult<O> = Result<(usize, O), ParseError>;

/// Error type for parsing operations.
///
/// Positions are token indexes while the analyzer runs and are remapped to
/// byte offsets into the expression text before reaching the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of expression: {message} at position {position}")]
    UnexpectedEOF {
        message: String,
        position: usize,
        context: Option<String>,
    },
    #[error("Expected {expected}, found \"{parsed}\" at position {position}")]
    Unexpected {
        expected: String,
        parsed: String,
        position: usize,
        context: Option<String>,
    },
    #[error("No alternative matched at position {position}")]
    NoAlternative {
        position: usize,
        context: Option<String>,
    },
    #[error("{message} at position {position}")]
    Failure {
        message: String,
        position: usize,
        context: Option<String>,
    },
    #[error("{0}")]
    Tokenize(#[from] TokenizerError),
    #[error("Unknown function \"{name}\" at position {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("Invalid call to {function}(): {reason} at position {position}")]
    InvalidArguments {
        function: String,
        reason: ArgumentError,
        position: usize,
    },
    #[error("\"{name}\" is reserved and cannot be used as a variable name at position {position}")]
    ReservedIdentifier { name: String, position: usize },
    #[error("Unexpected \"{found}\" after the end of the expression at position {position}")]
    TrailingInput { found: String, position: usize },
}

fn chain(context: Option<String>, ctx: &str) -> Option<String> {
    Some(match context {
        Some(c) => format!("{} -> {}", c, ctx),
        None => ctx.to_string(),
    })
}

impl ParseError {
    pub fn with_context(self, ctx: &str) -> Self {
        match self {
            ParseError::UnexpectedEOF {
                message,
                position,
                context,
            } => ParseError::UnexpectedEOF {
                message,
                position,
                context: chain(context, ctx),
            },
            ParseError::Unexpected {
                expected,
                parsed,
                position,
                context,
            } => ParseError::Unexpected {
                expected,
                parsed,
                position,
                context: chain(context, ctx),
            },
            ParseError::NoAlternative { position, context } => ParseError::NoAlternative {
                position,
                context: chain(context, ctx),
            },
            ParseError::Failure {
                message,
                position,
                context,
            } => ParseError::Failure {
                message,
                position,
                context: chain(context, ctx),
            },
            other => other,
        }
    }

    pub fn get_position(&self) -> usize {
        match self {
            ParseError::UnexpectedEOF { position, .. }
            | ParseError::Unexpected { position, .. }
            | ParseError::NoAlternative { position, .. }
            | ParseError::Failure { position, .. }
            | ParseError::UnknownFunction { position, .. }
            | ParseError::InvalidArguments { position, .. }
            | ParseError::ReservedIdentifier { position, .. }
            | ParseError::TrailingInput { position, .. } => *position,
            ParseError::Tokenize(e) => e.span().start,
        }
    }

    /// Fatal errors describe a well-formed but invalid construct, so no other
    /// alternative is tried once one is raised.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParseError::UnknownFunction { .. }
                | ParseError::InvalidArguments { .. }
                | ParseError::ReservedIdentifier { .. }
        )
    }

    /// Rewrites the position with `f`. Tokenizer errors already carry byte offsets.
    pub fn map_position<F: Fn(usize) -> usize>(self, f: F) -> Self {
        match self {
            ParseError::UnexpectedEOF {
                message,
                position,
                context,
            } => ParseError::UnexpectedEOF {
                message,
                position: f(position),
                context,
            },
            ParseError::Unexpected {
                expected,
                parsed,
                position,
                context,
            } => ParseError::Unexpected {
                expected,
                parsed,
                position: f(position),
                context,
            },
            ParseError::NoAlternative { position, context } => ParseError::NoAlternative {
                position: f(position),
                context,
            },
            ParseError::Failure {
                message,
                position,
                context,
            } => ParseError::Failure {
                message,
                position: f(position),
                context,
            },
            ParseError::UnknownFunction { name, position } => ParseError::UnknownFunction {
                name,
                position: f(position),
            },
            ParseError::InvalidArguments {
                function,
                reason,
                position,
            } => ParseError::InvalidArguments {
                function,
                reason,
                position: f(position),
            },
            ParseError::ReservedIdentifier { name, position } => {
                ParseError::ReservedIdentifier {
                    name,
                    position: f(position),
                }
            }
            ParseError::TrailingInput { found, position } => ParseError::TrailingInput {
                found,
                position: f(position),
            },
            tokenize @ ParseError::Tokenize(_) => tokenize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chaining() {
        let err = ParseError::NoAlternative {
            position: 3,
            context: None,
        }
        .with_context("primary")
        .with_context("expression");
        assert_eq!(
            err,
            ParseError::NoAlternative {
                position: 3,
                context: Some("primary -> expression".to_string())
            }
        );
    }

    #[test]
    fn test_map_position() {
        let err = ParseError::UnknownFunction {
            name: "foo".into(),
            position: 2,
        }
        .map_position(|p| p * 10);
        assert_eq!(err.get_position(), 20);
        assert!(err.is_fatal());
    }
}
