use std::collections::BTreeMap;

use super::ConcreteValue;
use crate::error::EvaluationError;

const RESERVED_KEYS: [&str; 2] = ["value", "id"];

/// A concrete value carrying side-channel annotations such as traversal
/// distance or relationship rank.
///
/// The annotation map is never empty and the inner value is never itself
/// annotated: annotating an annotated value merges the maps instead.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedValue {
    pub value: Box<ConcreteValue>,
    pub annotations: BTreeMap<String, ConcreteValue>,
}

impl AnnotatedValue {
    pub fn new(
        value: ConcreteValue,
        annotations: BTreeMap<String, ConcreteValue>,
    ) -> Result<Self, EvaluationError> {
        if annotations.is_empty() {
            return Err(EvaluationError::InvalidAnnotation(
                "at least one annotation is required".to_string(),
            ));
        }
        if let Some(key) = annotations
            .keys()
            .find(|key| RESERVED_KEYS.contains(&key.as_str()))
        {
            return Err(EvaluationError::InvalidAnnotation(format!(
                "\"{}\" is a reserved annotation key",
                key
            )));
        }

        match value {
            ConcreteValue::Annotated(existing) => {
                let mut merged = existing.annotations;
                merged.extend(annotations);
                Ok(Self {
                    value: existing.value,
                    annotations: merged,
                })
            }
            value => Ok(Self {
                value: Box::new(value),
                annotations,
            }),
        }
    }

    pub fn annotation(&self, name: &str) -> Option<&ConcreteValue> {
        self.annotations.get(name)
    }
}

impl ConcreteValue {
    /// Attaches annotations, merging with any that are already present.
    pub fn annotate(
        self,
        annotations: BTreeMap<String, ConcreteValue>,
    ) -> Result<ConcreteValue, EvaluationError> {
        AnnotatedValue::new(self, annotations).map(ConcreteValue::Annotated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn annotations(pairs: &[(&str, i64)]) -> BTreeMap<String, ConcreteValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ConcreteValue::integer(*v)))
            .collect()
    }

    #[test]
    fn test_empty_annotations_rejected() {
        let result = AnnotatedValue::new(ConcreteValue::integer(1), BTreeMap::new());
        assert!(matches!(result, Err(EvaluationError::InvalidAnnotation(_))));
    }

    #[test]
    fn test_reserved_keys_rejected() {
        for key in ["value", "id"] {
            let result = AnnotatedValue::new(ConcreteValue::integer(1), annotations(&[(key, 1)]));
            assert!(result.is_err(), "{} should be rejected", key);
        }
    }

    #[test]
    fn test_annotating_merges() {
        let once = ConcreteValue::integer(123)
            .annotate(annotations(&[("a", 1), ("b", 1)]))
            .unwrap();
        let twice = once.annotate(annotations(&[("a", 2), ("c", 2)])).unwrap();

        let ConcreteValue::Annotated(annotated) = twice else {
            panic!("expected an annotated value");
        };
        assert_eq!(*annotated.value, ConcreteValue::integer(123));
        assert_eq!(annotated.annotations, annotations(&[("a", 2), ("b", 1), ("c", 2)]));
    }
}
