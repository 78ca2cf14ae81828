//! Convenience builder for HTTP query parameters.
//!
//! Absent values are skipped, so "omit this filter" never turns into an empty
//! string on the wire.

use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Build parameters from a serializable object, skipping `null` members.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless `value` serializes to an object of scalars.
    pub fn from_serialize<S: Serialize + ?Sized>(value: &S) -> Result<Self> {
        let object = match serde_json::to_value(value)? {
            Value::Object(object) => object,
            Value::Null => Map::new(),
            other => {
                return Err(Error::InvalidArgument(format!(
                    "query must be an object, got {other}"
                )))
            }
        };
        let mut params = Self::new();
        for (key, value) in object {
            match value {
                Value::Null => {}
                Value::String(s) => params.push(key, s),
                Value::Bool(_) | Value::Number(_) => params.push(key, value),
                Value::Array(_) | Value::Object(_) => {
                    return Err(Error::InvalidArgument(format!(
                        "query parameter `{key}` must be a scalar"
                    )))
                }
            }
        }
        Ok(params)
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: impl Into<String>, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Display,
    {
        self.pairs.push((key.into(), value.to_string()));
    }

    /// Chainable [`QueryParams::push`].
    #[must_use]
    pub fn with<T: Display>(mut self, key: impl Into<String>, value: T) -> Self {
        self.push(key, value);
        self
    }

    /// Chainable [`QueryParams::push_opt`].
    #[must_use]
    pub fn with_opt<T: Display>(mut self, key: impl Into<String>, value: Option<T>) -> Self {
        self.push_opt(key, value);
        self
    }

    /// Replace every pair with the given key by a single one.
    #[must_use]
    pub fn set<T: Display>(mut self, key: &str, value: T) -> Self {
        self.pairs.retain(|(k, _)| k != key);
        self.with(key, value)
    }

    /// Iterate over the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The parameters as a JSON object, for error reports.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.pairs
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Display,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.push(key, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::QueryParams;
    use serde_json::json;

    #[test]
    fn push_opt_skips_none() {
        let mut params = QueryParams::new();
        params.push_opt("name", Option::<String>::None);
        assert!(params.is_empty());
    }

    #[test]
    fn set_replaces_all_occurrences() {
        let params = QueryParams::new()
            .with("limit", 50)
            .with("animal", "fish")
            .with("limit", 20)
            .set("limit", 1);
        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![("animal", "fish"), ("limit", "1")]
        );
    }

    #[test]
    fn from_serialize_drops_nulls() {
        let params = QueryParams::from_serialize(&json!({
            "name_exact": "pl-dircopy",
            "version": null,
            "limit": 10,
        }))
        .unwrap();
        assert_eq!(params.to_json(), json!({"name_exact": "pl-dircopy", "limit": "10"}));
    }

    #[test]
    fn from_serialize_rejects_nested_values() {
        assert!(QueryParams::from_serialize(&json!({"a": [1, 2]})).is_err());
        assert!(QueryParams::from_serialize(&json!([1, 2])).is_err());
    }

    #[test]
    fn collects_from_pairs() {
        let params: QueryParams = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(params.to_json(), json!({"a": "1", "b": "2"}));
    }
}
