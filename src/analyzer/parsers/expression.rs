use super::super::{core::*, prelude::*};
use super::common::*;
use crate::ast::{ArgumentError, Expression, FunctionCall, FunctionRef, Lambda};
use crate::functions::FunctionRegistry;
use crate::tokenizer::{keyword::is_reserved, Token, Tokenizer};

enum Argument {
    Named(String, Expression),
    Positional(Expression),
}

enum Postfix {
    Attribute(String),
    Call {
        function: FunctionRef,
        named: Vec<(String, Expression)>,
        position: usize,
    },
}

/// Parses lookup expression text, resolving calls against `registry`.
///
/// Error positions are byte offsets into `text`.
pub fn parse_lookup_string(text: &str, registry: &FunctionRegistry) -> Result<Expression, ParseError> {
    let spans = Tokenizer::new().tokenize(text)?;
    let tokens: Vec<Token> = spans.iter().map(|span| span.token.clone()).collect();
    let to_offset = |pos: usize| spans.get(pos).map_or(text.len(), |span| span.start);

    let (pos, expression) = parse_expression(registry)
        .parse(&tokens, 0)
        .map_err(|e| e.map_position(to_offset))?;

    if let Some(extra) = tokens.get(pos) {
        return Err(ParseError::TrailingInput {
            found: extra.to_string(),
            position: to_offset(pos),
        });
    }
    Ok(expression)
}

pub fn parse_expression<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Expression> + 'a {
    with_context(
        try_map(
            tuple2(parse_primary(registry), many(parse_postfix(registry))),
            |(receiver, postfixes): (Expression, Vec<Postfix>), _: usize| {
                apply_postfixes(receiver, postfixes)
            },
        ),
        "expression",
    )
}

fn boxed_expression<'a>(registry: &'a FunctionRegistry) -> Box<dyn Parser<Token, Expression> + 'a> {
    Box::new(parse_expression(registry))
}

fn parse_primary<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Expression> + 'a {
    with_context(
        choice(vec![
            Box::new(map(parse_literal(), Expression::Literal)),
            Box::new(parse_list(registry)),
            Box::new(map(parse_this(), |_: Token| Expression::This)),
            Box::new(parse_lambda(registry)),
            Box::new(parse_parenthesized(registry)),
            Box::new(parse_call(registry)),
            Box::new(map(parse_identifier(), Expression::Variable)),
        ]),
        "primary",
    )
}

fn parse_list<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Expression> + 'a {
    with_context(
        map(
            delimited(
                as_unit(parse_open_bracket()),
                separated_list(
                    lazy(move || boxed_expression(registry)),
                    as_unit(parse_comma()),
                ),
                as_unit(parse_close_bracket()),
            ),
            Expression::List,
        ),
        "list",
    )
}

fn parse_parenthesized<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Expression> + 'a {
    delimited(
        as_unit(parse_open_paren()),
        lazy(move || boxed_expression(registry)),
        as_unit(parse_close_paren()),
    )
}

fn parse_lambda<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Expression> + 'a {
    with_context(
        try_map(
            delimited(
                as_unit(parse_open_paren()),
                tuple3(
                    parse_parameter(),
                    as_unit(parse_arrow()),
                    lazy(move || boxed_expression(registry)),
                ),
                as_unit(parse_close_paren()),
            ),
            |(variable, _, body): (String, (), Expression), position: usize| {
                if is_reserved(&variable) {
                    return Err(ParseError::ReservedIdentifier {
                        name: variable,
                        position: position + 1,
                    });
                }
                Ok(Expression::Lambda(Lambda {
                    variable,
                    body: Box::new(body),
                }))
            },
        ),
        "lambda",
    )
}

/// `name(args)`, where the first argument may be positional.
fn parse_call<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Expression> + 'a {
    try_map(
        tuple2(parse_identifier(), parse_arguments(registry)),
        move |(name, arguments): (String, Vec<Argument>), position: usize| {
            let function = resolve(registry, &name, position)?;
            let (positional, named) = split_arguments(&function, arguments, position)?;
            let function_name = function.name();
            FunctionCall::new(function, positional, named)
                .map(Expression::Call)
                .map_err(|reason| invalid_arguments(function_name, reason, position))
        },
    )
}

/// `.name` or `.name(named args)`.
fn parse_postfix<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Postfix> + 'a {
    try_map(
        preceded(
            as_unit(parse_dot()),
            tuple2(parse_identifier(), optional(parse_arguments(registry))),
        ),
        move |(name, arguments): (String, Option<Vec<Argument>>), position: usize| {
            let position = position + 1;
            let Some(arguments) = arguments else {
                return Ok(Postfix::Attribute(name));
            };
            let function = resolve(registry, &name, position)?;
            let (positional, named) = split_arguments(&function, arguments, position)?;
            if positional.is_some() {
                return Err(invalid_arguments(
                    function.name(),
                    ArgumentError::UnexpectedPositional,
                    position,
                ));
            }
            Ok(Postfix::Call {
                function,
                named,
                position,
            })
        },
    )
}

fn parse_arguments<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Vec<Argument>> + 'a {
    with_context(
        delimited(
            as_unit(parse_open_paren()),
            separated_list(parse_argument(registry), as_unit(parse_comma())),
            as_unit(parse_close_paren()),
        ),
        "arguments",
    )
}

fn parse_argument<'a>(registry: &'a FunctionRegistry) -> impl Parser<Token, Argument> + 'a {
    choice(vec![
        Box::new(map(
            tuple2(
                parse_identifier(),
                preceded(
                    as_unit(parse_assign()),
                    lazy(move || boxed_expression(registry)),
                ),
            ),
            |(key, value): (String, Expression)| Argument::Named(key, value),
        )),
        Box::new(map(
            lazy(move || boxed_expression(registry)),
            Argument::Positional,
        )),
    ])
}

fn apply_postfixes(receiver: Expression, postfixes: Vec<Postfix>) -> Result<Expression, ParseError> {
    postfixes
        .into_iter()
        .try_fold(receiver, |object, postfix| match postfix {
            Postfix::Attribute(name) => Ok(Expression::attribute(object, name)),
            Postfix::Call {
                function,
                named,
                position,
            } => {
                let function_name = function.name();
                FunctionCall::new(function, Some(object), named)
                    .map(Expression::Call)
                    .map_err(|reason| invalid_arguments(function_name, reason, position))
            }
        })
}

fn resolve(registry: &FunctionRegistry, name: &str, position: usize) -> Result<FunctionRef, ParseError> {
    registry
        .resolve(name)
        .ok_or_else(|| ParseError::UnknownFunction {
            name: name.to_string(),
            position,
        })
}

type SplitArguments = (Option<Expression>, Vec<(String, Expression)>);

fn split_arguments(
    function: &FunctionRef,
    arguments: Vec<Argument>,
    position: usize,
) -> Result<SplitArguments, ParseError> {
    let mut positional = None;
    let mut named = Vec::new();
    for (index, argument) in arguments.into_iter().enumerate() {
        match argument {
            Argument::Positional(value) if index == 0 => positional = Some(value),
            Argument::Positional(_) => {
                return Err(invalid_arguments(
                    function.name(),
                    ArgumentError::UnexpectedPositional,
                    position,
                ))
            }
            Argument::Named(key, value) => named.push((key, value)),
        }
    }
    Ok((positional, named))
}

fn invalid_arguments(function: String, reason: ArgumentError, position: usize) -> ParseError {
    ParseError::InvalidArguments {
        function,
        reason,
        position,
    }
}
