//! ABOUTME: Metadata filter expression AST evaluated post-ANN (§4.G)

use super::domain::NounMetadata;
use super::Value;
use serde::{Deserialize, Serialize};

/// A metadata filter expression.
///
/// Mirrors the JSON-style language from §4.G: comparison operators
/// (`eq`/`ne`/`gt`/`gte`/`lt`/`lte`/`in`/`nin`/`exists`) plus boolean
/// combinators (`and`/`or`/`not`). Modeled as an explicit AST rather than
/// ad-hoc dynamic dispatch, per the design note in §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Eq { key: String, value: Value },
    Ne { key: String, value: Value },
    Gt { key: String, value: Value },
    Gte { key: String, value: Value },
    Lt { key: String, value: Value },
    Lte { key: String, value: Value },
    In { key: String, values: Vec<Value> },
    Nin { key: String, values: Vec<Value> },
    Exists { key: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Evaluate this filter against a noun's metadata.
    #[must_use]
    pub fn matches(&self, metadata: &NounMetadata) -> bool {
        match self {
            Self::Eq { key, value } => metadata.get(key) == Some(value),
            Self::Ne { key, value } => metadata.get(key) != Some(value),
            Self::Gt { key, value } => Self::cmp(metadata, key, value, std::cmp::Ordering::is_gt),
            Self::Gte { key, value } => {
                Self::cmp(metadata, key, value, std::cmp::Ordering::is_ge)
            }
            Self::Lt { key, value } => Self::cmp(metadata, key, value, std::cmp::Ordering::is_lt),
            Self::Lte { key, value } => {
                Self::cmp(metadata, key, value, std::cmp::Ordering::is_le)
            }
            Self::In { key, values } => metadata
                .get(key)
                .is_some_and(|v| values.contains(v)),
            Self::Nin { key, values } => !metadata
                .get(key)
                .is_some_and(|v| values.contains(v)),
            Self::Exists { key } => metadata.get(key).is_some(),
            Self::And(children) => children.iter().all(|f| f.matches(metadata)),
            Self::Or(children) => children.iter().any(|f| f.matches(metadata)),
            Self::Not(inner) => !inner.matches(metadata),
        }
    }

    fn cmp(
        metadata: &NounMetadata,
        key: &str,
        value: &Value,
        accept: impl Fn(std::cmp::Ordering) -> bool,
    ) -> bool {
        metadata
            .get(key)
            .and_then(|v| v.partial_cmp_value(value))
            .is_some_and(accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, Value)]) -> NounMetadata {
        let mut m = NounMetadata::new();
        for (k, v) in pairs {
            m.set(*k, v.clone());
        }
        m
    }

    #[test]
    fn and_combinator_requires_every_branch() {
        let m = metadata(&[("department", Value::from("Eng")), ("level", Value::Int(8))]);
        let filter = Filter::And(vec![
            Filter::Eq {
                key: "department".into(),
                value: Value::from("Eng"),
            },
            Filter::Gte {
                key: "level".into(),
                value: Value::Int(7),
            },
        ]);
        assert!(filter.matches(&m));
    }

    #[test]
    fn missing_key_fails_comparison_but_not_exists_check() {
        let m = metadata(&[]);
        assert!(!Filter::Gt {
            key: "level".into(),
            value: Value::Int(1)
        }
        .matches(&m));
        assert!(!Filter::Exists { key: "level".into() }.matches(&m));
    }

    #[test]
    fn not_negates_inner_filter() {
        let m = metadata(&[("active", Value::Bool(true))]);
        let filter = Filter::Not(Box::new(Filter::Eq {
            key: "active".into(),
            value: Value::Bool(true),
        }));
        assert!(!filter.matches(&m));
    }
}
