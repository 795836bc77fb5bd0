use std::fmt;
use strum_macros::{AsRefStr, Display};

use super::function::FunctionCall;
use crate::value::ConcreteValue;

/// A node of a parsed lookup expression.
///
/// Trees are immutable once built and compare structurally. `Display`
/// renders the canonical form, which re-parses to an equal tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(ConcreteValue),
    List(Vec<Expression>),
    This,
    Variable(String),
    Lambda(Lambda),
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Call(FunctionCall),
}

/// `(variable -> body)`; only evaluated when applied to a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub variable: String,
    pub body: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum ExpressionKind {
    Literal,
    List,
    This,
    Variable,
    Lambda,
    Attribute,
    Call,
}

impl Expression {
    pub fn kind(&self) -> ExpressionKind {
        match self {
            Expression::Literal(_) => ExpressionKind::Literal,
            Expression::List(_) => ExpressionKind::List,
            Expression::This => ExpressionKind::This,
            Expression::Variable(_) => ExpressionKind::Variable,
            Expression::Lambda(_) => ExpressionKind::Lambda,
            Expression::Attribute { .. } => ExpressionKind::Attribute,
            Expression::Call(_) => ExpressionKind::Call,
        }
    }

    pub fn attribute(object: Expression, name: impl Into<String>) -> Self {
        Expression::Attribute {
            object: Box::new(object),
            name: name.into(),
        }
    }

    /// Canonical text cut to `max_len` characters, with an ellipsis when cut.
    pub fn debug_string(&self, max_len: usize) -> String {
        let text = self.to_string();
        if text.chars().count() <= max_len {
            text
        } else {
            let mut cut: String = text.chars().take(max_len).collect();
            cut.push('…');
            cut
        }
    }

    /// Whether a one-argument call on this node renders as `node.fn()`.
    fn prefers_dotted_call(&self) -> bool {
        match self {
            Expression::This | Expression::Call(_) | Expression::List(_) => true,
            Expression::Literal(value) => matches!(
                value,
                ConcreteValue::Entry(_) | ConcreteValue::Property(_) | ConcreteValue::EntryType(_)
            ),
            _ => false,
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

/// Renders a concrete value as expression text.
pub(crate) fn write_literal(f: &mut fmt::Formatter<'_>, value: &ConcreteValue) -> fmt::Result {
    match value {
        ConcreteValue::Null => write!(f, "null"),
        ConcreteValue::Boolean(b) => write!(f, "{}", b),
        ConcreteValue::Integer(i) => write!(f, "{}", i),
        ConcreteValue::Quantity(q) => {
            if q.magnitude.scale() == 0 && q.units.is_none() {
                write!(f, "{}.0", q.magnitude)
            } else {
                write!(f, "{}", q.magnitude)?;
                match &q.units {
                    Some(units) => write!(f, " [{}]", units),
                    None => Ok(()),
                }
            }
        }
        ConcreteValue::String(s) => write_string_literal(f, s),
        ConcreteValue::Markdown(s) => {
            write!(f, "markdown(")?;
            write_string_literal(f, s)?;
            write!(f, ")")
        }
        ConcreteValue::Date(d) => write!(f, "date(\"{}\")", d.format("%Y-%m-%d")),
        ConcreteValue::PartialDate(d) => write!(f, "date(\"{}\")", d),
        ConcreteValue::Entry(id) => write!(f, "[[/entry/{}]]", id),
        ConcreteValue::Property(id) => write!(f, "[[/prop/{}]]", id),
        ConcreteValue::EntryType(id) => write!(f, "[[/etype/{}]]", id),
        ConcreteValue::List(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_literal(f, item)?;
            }
            write!(f, "]")
        }
        ConcreteValue::Annotated(annotated) => {
            write_literal(f, &annotated.value)?;
            write!(f, ".annotate(")?;
            for (i, (key, value)) in annotated.annotations.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}=", key)?;
                write_literal(f, value)?;
            }
            write!(f, ")")
        }
        // Pages, ranges, graphs and errors have no literal syntax.
        _ => write!(f, "null"),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write_literal(f, value),
            Expression::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expression::This => write!(f, "this"),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Lambda(lambda) => write!(f, "({} -> {})", lambda.variable, lambda.body),
            Expression::Attribute { object, name } => write!(f, "{}.{}", object, name),
            Expression::Call(call) => write!(f, "{}", call),
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        let named = self
            .named()
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>();
        match self.positional() {
            None => write!(f, "{}()", name),
            Some(arg) if arg.prefers_dotted_call() => {
                write!(f, "{}.{}({})", arg, name, named.join(", "))
            }
            Some(arg) => {
                write!(f, "{}({}", name, arg)?;
                for item in &named {
                    write!(f, ", {}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
