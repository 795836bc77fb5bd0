use thiserror::Error;

use crate::analyzer::core::ParseError;

/// Runtime failure while evaluating one expression node.
///
/// These are recoverable per sub-expression: the evaluation context turns
/// them into an [`ErrorValue`](crate::value::ErrorValue) so one bad value
/// inside a larger result does not abort the rest of it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("{0}")]
    Message(String),
    #[error("The expression \"{expression}\" cannot be converted to {target}.")]
    Conversion { expression: String, target: String },
    #[error("Unknown attribute \"{attribute}\" on {value_type} value.")]
    UnknownAttribute {
        attribute: String,
        value_type: String,
    },
    #[error("Cannot compare {left} with {right}.")]
    Incomparable { left: String, right: String },
    #[error("Invalid date.")]
    InvalidDate,
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),
    #[error("You do not have permission to {0}.")]
    PermissionDenied(String),
    #[error("{kind} \"{id}\" not found.")]
    NotFound { kind: String, id: String },
    #[error("{0} is not yet supported.")]
    NotSupported(String),
    #[error("Variable \"{0}\" is not defined.")]
    UndefinedVariable(String),
    #[error("There is no current entry, so \"this\" cannot be used here.")]
    NoCurrentEntry,
    #[error("Cannot determine the range of an empty set.")]
    EmptyRange,
    #[error("Circular reference while evaluating \"{0}\".")]
    CircularReference(String),
    #[error("Expressions are nested more than {0} levels deep.")]
    TooDeep(usize),
}

impl EvaluationError {
    pub fn message<S: Into<String>>(message: S) -> Self {
        EvaluationError::Message(message.into())
    }

    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        EvaluationError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}

/// The recoverable error family of the expression language.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Evaluation(#[from] EvaluationError),
}

/// Failures reported by the graph store and other collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Invalid fixture: {0}")]
    Fixture(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{0}")]
    Lookup(#[from] LookupError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type LookupResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }

    /// Whether this error belongs to the recoverable lookup family.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Error::Lookup(_))
    }
}

impl From<EvaluationError> for Error {
    fn from(error: EvaluationError) -> Self {
        Error::Lookup(LookupError::Evaluation(error))
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Error::Lookup(LookupError::Parse(error))
    }
}
