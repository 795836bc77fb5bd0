//! # Tokenizer
//!
//! Turns lookup expression text into a flat list of [`TokenSpan`]s using
//! `nom`. Spans keep byte offsets plus line/column so parse errors can point
//! at the offending input.

pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;

pub use token::{Span, Token, TokenSpan, Tokenizer, TokenizerError, TokenizerResult};
