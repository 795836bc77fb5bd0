use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::Expression;
use crate::functions::BuiltinFunction;
use crate::provider::PluginFunction;

/// Calling convention of a function.
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    /// `fn()`
    NoArgs,
    /// `arg.fn()` or `fn(arg)`
    OneArg,
    /// One positional argument plus keyword arguments.
    MultiArg {
        required: &'static [&'static str],
        optional: &'static [&'static str],
        /// Accept keys outside `required` and `optional`.
        open: bool,
        /// Keys that may never be supplied.
        reserved: &'static [&'static str],
    },
}

impl Signature {
    pub const fn multi(required: &'static [&'static str], optional: &'static [&'static str]) -> Self {
        Signature::MultiArg {
            required,
            optional,
            open: false,
            reserved: &[],
        }
    }

    pub fn validate(
        &self,
        positional: Option<&Expression>,
        named: &[(String, Expression)],
    ) -> Result<(), ArgumentError> {
        match self {
            Signature::NoArgs => {
                if positional.is_some() || !named.is_empty() {
                    return Err(ArgumentError::NoArgumentsAllowed);
                }
            }
            Signature::OneArg => {
                if let Some((key, _)) = named.first() {
                    return Err(ArgumentError::UnexpectedArgument(key.clone()));
                }
                if positional.is_none() {
                    return Err(ArgumentError::MissingPositional);
                }
            }
            Signature::MultiArg {
                required,
                optional,
                open,
                reserved,
            } => {
                if positional.is_none() {
                    return Err(ArgumentError::MissingPositional);
                }
                for (index, (key, _)) in named.iter().enumerate() {
                    if named[..index].iter().any(|(k, _)| k == key) {
                        return Err(ArgumentError::DuplicateArgument(key.clone()));
                    }
                    if reserved.contains(&key.as_str()) {
                        return Err(ArgumentError::ReservedKey(key.clone()));
                    }
                    let known =
                        required.contains(&key.as_str()) || optional.contains(&key.as_str());
                    if !known && !open {
                        return Err(ArgumentError::UnexpectedArgument(key.clone()));
                    }
                }
                if let Some(missing) = required
                    .iter()
                    .find(|req| !named.iter().any(|(k, _)| k.as_str() == **req))
                {
                    return Err(ArgumentError::MissingArgument(missing.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::NoArgs => write!(f, "()"),
            Signature::OneArg => write!(f, "(value)"),
            Signature::MultiArg {
                required,
                optional,
                open,
                ..
            } => {
                write!(f, "(value")?;
                for key in required.iter() {
                    write!(f, ", {}=…", key)?;
                }
                for key in optional.iter() {
                    write!(f, ", [{}=…]", key)?;
                }
                if *open {
                    write!(f, ", …")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgumentError {
    #[error("it does not take any arguments")]
    NoArgumentsAllowed,
    #[error("an argument is required")]
    MissingPositional,
    #[error("only one unnamed argument is allowed, and it must come first")]
    UnexpectedPositional,
    #[error("unexpected argument \"{0}\"")]
    UnexpectedArgument(String),
    #[error("missing argument \"{0}\"")]
    MissingArgument(String),
    #[error("argument \"{0}\" was given more than once")]
    DuplicateArgument(String),
    #[error("\"{0}\" is a reserved annotation key")]
    ReservedKey(String),
}

/// A resolved function: either built in or contributed by a site plugin.
#[derive(Clone)]
pub enum FunctionRef {
    Builtin(BuiltinFunction),
    Plugin(Arc<dyn PluginFunction>),
}

impl FunctionRef {
    pub fn name(&self) -> String {
        match self {
            FunctionRef::Builtin(builtin) => builtin.to_string(),
            FunctionRef::Plugin(plugin) => plugin.name().to_string(),
        }
    }

    pub fn signature(&self) -> Signature {
        match self {
            FunctionRef::Builtin(builtin) => builtin.signature(),
            FunctionRef::Plugin(plugin) => plugin.signature(),
        }
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRef::Builtin(builtin) => write!(f, "Builtin({})", builtin),
            FunctionRef::Plugin(plugin) => write!(f, "Plugin({})", plugin.name()),
        }
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FunctionRef::Builtin(a), FunctionRef::Builtin(b)) => a == b,
            (FunctionRef::Plugin(a), FunctionRef::Plugin(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

/// A validated function call node.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    function: FunctionRef,
    positional: Option<Box<Expression>>,
    named: Vec<(String, Expression)>,
}

impl FunctionCall {
    pub fn new(
        function: FunctionRef,
        positional: Option<Expression>,
        named: Vec<(String, Expression)>,
    ) -> Result<Self, ArgumentError> {
        function.signature().validate(positional.as_ref(), &named)?;
        Ok(Self {
            function,
            positional: positional.map(Box::new),
            named,
        })
    }

    /// Shorthand for built-in calls assembled by other functions.
    pub fn builtin(
        function: BuiltinFunction,
        positional: Option<Expression>,
        named: Vec<(&str, Expression)>,
    ) -> Result<Self, ArgumentError> {
        Self::new(
            FunctionRef::Builtin(function),
            positional,
            named.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )
    }

    pub fn function(&self) -> &FunctionRef {
        &self.function
    }

    pub fn name(&self) -> String {
        self.function.name()
    }

    pub fn positional(&self) -> Option<&Expression> {
        self.positional.as_deref()
    }

    pub fn named(&self) -> &[(String, Expression)] {
        &self.named
    }

    pub fn arg(&self, key: &str) -> Option<&Expression> {
        self.named.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}
