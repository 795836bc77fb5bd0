//! # Parser Combinators
//!
//! Building blocks composed into the expression grammar.
//!
//! * **Basic**: `Equal`, `Satisfy`
//! * **Sequential**: `Preceded`, `Delimited`, `Tuple2`, `Tuple3`
//! * **Alternative**: `Choice`
//! * **Repetition**: `Many`, `SeparatedList`, `Optional`
//! * **Transformation**: `Map`, `TryMap`, `AsUnit`
//! * **Error handling**: `WithContext`
//! * **Recursion**: `Lazy`
//!
//! Combinators that recover from a failed inner parse (`Choice`, `Many`,
//! `Optional`, `SeparatedList`) still propagate fatal errors unchanged.

use super::core::ParseError;
use super::core::ParseResult;
use super::core::Parser;
use std::fmt;
use std::marker::PhantomData;

fn eof(pos: usize) -> ParseError {
    ParseError::UnexpectedEOF {
        message: "no more tokens".to_string(),
        position: pos,
        context: None,
    }
}

/// Equal: Matches a specific value in the input, consuming one token.
#[derive(Clone)]
pub struct Equal<I> {
    value: I,
}

impl<I> Equal<I> {
    pub fn new(value: I) -> Self {
        Self { value }
    }
}

impl<I: Clone + PartialEq + fmt::Display> Parser<I, I> for Equal<I> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<I> {
        match input.get(pos) {
            Some(found) if *found == self.value => Ok((pos + 1, found.clone())),
            Some(found) => Err(ParseError::Unexpected {
                expected: self.value.to_string(),
                parsed: found.to_string(),
                position: pos,
                context: None,
            }),
            None => Err(eof(pos)),
        }
    }
}

/// Satisfy: Consumes one token when `f` accepts it.
#[derive(Clone)]
pub struct Satisfy<I, O, F> {
    f: F,
    expected: &'static str,
    _phantom: PhantomData<(I, O)>,
}

impl<I, O, F> Satisfy<I, O, F> {
    pub fn new(f: F, expected: &'static str) -> Self {
        Self {
            f,
            expected,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Parser<I, O> for Satisfy<I, O, F>
where
    I: fmt::Display,
    F: Fn(&I) -> Option<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let found = input.get(pos).ok_or_else(|| eof(pos))?;
        (self.f)(found)
            .map(|result| (pos + 1, result))
            .ok_or_else(|| ParseError::Unexpected {
                expected: self.expected.to_string(),
                parsed: found.to_string(),
                position: pos,
                context: None,
            })
    }
}

/// Choice: Tries each parser in order and returns the first success.
///
/// When every alternative fails, the error that got furthest into the input
/// is reported.
pub struct Choice<'a, I, O> {
    parsers: Vec<Box<dyn Parser<I, O> + 'a>>,
}

impl<'a, I, O> Choice<'a, I, O> {
    pub fn new(parsers: Vec<Box<dyn Parser<I, O> + 'a>>) -> Self {
        Self { parsers }
    }
}

impl<I, O> Parser<I, O> for Choice<'_, I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let mut furthest: Option<ParseError> = None;
        for parser in &self.parsers {
            match parser.parse(input, pos) {
                Ok(result) => return Ok(result),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let replace = furthest
                        .as_ref()
                        .map_or(true, |f| e.get_position() > f.get_position());
                    if replace {
                        furthest = Some(e);
                    }
                }
            }
        }
        Err(match furthest {
            Some(e) if e.get_position() > pos => e,
            _ => ParseError::NoAlternative {
                position: pos,
                context: None,
            },
        })
    }
}

/// Preceded: Runs both parsers and keeps the second result.
#[derive(Clone)]
pub struct Preceded<P1, P2, O1> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<O1>,
}

impl<P1, P2, O1> Preceded<P1, P2, O1> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<I, O1, O2, P1, P2> Parser<I, O2> for Preceded<P1, P2, O1>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O2> {
        let (pos, _) = self.parser1.parse(input, pos)?;
        self.parser2.parse(input, pos)
    }
}

#[derive(Clone)]
pub struct Map<P, F, A> {
    parser: P,
    f: F,
    _phantom: PhantomData<A>,
}

impl<P, F, A> Map<P, F, A> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for Map<P, F, A>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        self.parser
            .parse(input, pos)
            .map(|(pos, value)| (pos, (self.f)(value)))
    }
}

/// TryMap: Like `Map`, but the conversion may reject the parsed value.
///
/// The conversion receives the start position of the parsed value so errors
/// can point at it.
#[derive(Clone)]
pub struct TryMap<P, F, A> {
    parser: P,
    f: F,
    _phantom: PhantomData<A>,
}

impl<P, F, A> TryMap<P, F, A> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for TryMap<P, F, A>
where
    P: Parser<I, A>,
    F: Fn(A, usize) -> Result<B, ParseError>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        let (new_pos, value) = self.parser.parse(input, pos)?;
        Ok((new_pos, (self.f)(value, pos)?))
    }
}

#[derive(Clone)]
pub struct AsUnit<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> AsUnit<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, P, O> Parser<I, ()> for AsUnit<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<()> {
        self.parser.parse(input, pos).map(|(pos, _)| (pos, ()))
    }
}

/// Many: Zero or more repetitions.
#[derive(Clone)]
pub struct Many<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> Many<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Vec<O>> for Many<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = pos;
        loop {
            match self.parser.parse(input, current_pos) {
                Ok((new_pos, value)) if new_pos > current_pos => {
                    results.push(value);
                    current_pos = new_pos;
                }
                Err(e) if e.is_fatal() => return Err(e),
                _ => break,
            }
        }
        Ok((current_pos, results))
    }
}

/// SeparatedList: Items separated by `separator`, tolerating one trailing separator.
#[derive(Clone)]
pub struct SeparatedList<P, S, O> {
    item_parser: P,
    separator_parser: S,
    _phantom: PhantomData<O>,
}

impl<P, S, O> SeparatedList<P, S, O> {
    pub fn new(item_parser: P, separator_parser: S) -> Self {
        Self {
            item_parser,
            separator_parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P, S> Parser<I, Vec<O>> for SeparatedList<P, S, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = pos;

        match self.item_parser.parse(input, current_pos) {
            Ok((new_pos, value)) => {
                results.push(value);
                current_pos = new_pos;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => return Ok((current_pos, results)),
        }

        while let Ok((sep_pos, _)) = self.separator_parser.parse(input, current_pos) {
            current_pos = sep_pos;
            match self.item_parser.parse(input, current_pos) {
                Ok((new_pos, value)) => {
                    results.push(value);
                    current_pos = new_pos;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => break,
            }
        }

        Ok((current_pos, results))
    }
}

#[derive(Clone)]
pub struct Optional<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> Optional<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Option<O>> for Optional<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Option<O>> {
        match self.parser.parse(input, pos) {
            Ok((new_pos, value)) => Ok((new_pos, Some(value))),
            Err(e) if e.is_fatal() => Err(e),
            Err(_) => Ok((pos, None)),
        }
    }
}

#[derive(Clone)]
pub struct Tuple2<P1, P2> {
    parser1: P1,
    parser2: P2,
}

impl<P1, P2> Tuple2<P1, P2> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self { parser1, parser2 }
    }
}

impl<I, O1, O2, P1, P2> Parser<I, (O1, O2)> for Tuple2<P1, P2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2)> {
        let (pos, result1) = self.parser1.parse(input, pos)?;
        let (pos, result2) = self.parser2.parse(input, pos)?;
        Ok((pos, (result1, result2)))
    }
}

#[derive(Clone)]
pub struct Tuple3<P1, P2, P3> {
    parser1: P1,
    parser2: P2,
    parser3: P3,
}

impl<P1, P2, P3> Tuple3<P1, P2, P3> {
    pub fn new(parser1: P1, parser2: P2, parser3: P3) -> Self {
        Self {
            parser1,
            parser2,
            parser3,
        }
    }
}

impl<I, O1, O2, O3, P1, P2, P3> Parser<I, (O1, O2, O3)> for Tuple3<P1, P2, P3>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2, O3)> {
        let (pos, result1) = self.parser1.parse(input, pos)?;
        let (pos, result2) = self.parser2.parse(input, pos)?;
        let (pos, result3) = self.parser3.parse(input, pos)?;
        Ok((pos, (result1, result2, result3)))
    }
}

#[derive(Clone)]
pub struct Delimited<L, P, R> {
    left: L,
    parser: P,
    right: R,
}

impl<L, P, R> Delimited<L, P, R> {
    pub fn new(left: L, parser: P, right: R) -> Self {
        Self {
            left,
            parser,
            right,
        }
    }
}

impl<I, O, L, P, R> Parser<I, O> for Delimited<L, P, R>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, _) = self.left.parse(input, pos)?;
        let (pos, value) = self.parser.parse(input, pos)?;
        let (pos, _) = self.right.parse(input, pos)?;
        Ok((pos, value))
    }
}

#[derive(Clone)]
pub struct WithContext<P, C> {
    parser: P,
    context: C,
}

impl<P, C> WithContext<P, C> {
    pub fn new(parser: P, context: C) -> Self {
        Self { parser, context }
    }
}

impl<I, O, P, C: ToString> Parser<I, O> for WithContext<P, C>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.parser
            .parse(input, pos)
            .map_err(|e| e.with_context(&self.context.to_string()))
    }
}

/// Lazy: Builds the inner parser on demand, which allows recursive grammars.
#[derive(Clone)]
pub struct Lazy<F> {
    f: F,
}

impl<F> Lazy<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<I, O, F, P> Parser<I, O> for Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (self.f)().parse(input, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit() -> Satisfy<char, u32, impl Fn(&char) -> Option<u32>> {
        Satisfy::new(|c: &char| c.to_digit(10), "digit")
    }

    #[test]
    fn test_equal() {
        let input = vec!['a', 'b'];
        assert_eq!(Equal::new('a').parse(&input, 0), Ok((1, 'a')));
        assert!(matches!(
            Equal::new('a').parse(&input, 1),
            Err(ParseError::Unexpected { position: 1, .. })
        ));
        assert!(matches!(
            Equal::new('a').parse(&input, 2),
            Err(ParseError::UnexpectedEOF { position: 2, .. })
        ));
    }

    #[test]
    fn test_choice_reports_furthest_error() {
        let input: Vec<char> = "1x".chars().collect();
        let parser: Choice<char, u32> = Choice::new(vec![
            Box::new(Map::new(
                Tuple2::new(digit(), digit()),
                |(a, b): (u32, u32)| a * 10 + b,
            )),
            Box::new(Map::new(Equal::new('z'), |_: char| 0u32)),
        ]);
        let err = parser.parse(&input, 0).unwrap_err();
        assert_eq!(err.get_position(), 1);
    }

    #[test]
    fn test_choice_stops_on_fatal_error() {
        let input = vec!['a'];
        let fatal = TryMap::new(Equal::new('a'), |_: char, pos: usize| -> Result<u32, ParseError> {
            Err(ParseError::UnknownFunction {
                name: "a".into(),
                position: pos,
            })
        });
        let parser: Choice<char, u32> = Choice::new(vec![
            Box::new(fatal),
            Box::new(Map::new(Equal::new('a'), |_: char| 1u32)),
        ]);
        assert!(matches!(
            parser.parse(&input, 0),
            Err(ParseError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_separated_list_trailing_separator() {
        let input: Vec<char> = "1,2,]".chars().collect();
        let parser = SeparatedList::new(digit(), AsUnit::new(Equal::new(',')));
        assert_eq!(parser.parse(&input, 0), Ok((4, vec![1, 2])));

        let input: Vec<char> = "]".chars().collect();
        assert_eq!(parser.parse(&input, 0), Ok((0, vec![])));
    }

    #[test]
    fn test_many_and_optional() {
        let input: Vec<char> = "123a".chars().collect();
        assert_eq!(Many::new(digit()).parse(&input, 0), Ok((3, vec![1, 2, 3])));
        assert_eq!(Optional::new(digit()).parse(&input, 3), Ok((3, None)));
    }

    #[test]
    fn test_with_context() {
        let input = vec!['b'];
        let err = WithContext::new(Equal::new('a'), "letter a")
            .parse(&input, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::Unexpected { context: Some(ref c), .. } if c == "letter a"
        ));
    }
}
