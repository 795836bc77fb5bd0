use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Reserved words that are not literals.
///
/// `true`, `false` and `null` are reserved too, but tokenize directly to
/// literals.
#[derive(Debug, Clone, PartialEq, EnumString, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    /// The current entry of the evaluation context.
    This,
}

/// Whether `name` may be bound as a variable or lambda parameter.
pub fn is_reserved(name: &str) -> bool {
    Keyword::try_from(name).is_ok() || matches!(name, "true" | "false" | "null")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_words() {
        assert!(is_reserved("this"));
        assert!(is_reserved("null"));
        assert!(!is_reserved("thisEntry"));
        assert_eq!(Keyword::This.to_string(), "this");
    }
}
