//! Request parameters supplied by the orchestrator at invocation start.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConfigError, ConfigResult};

/// Opaque key/value map consumed only by a decision engine's own policy logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParameters {
    values: Map<String, Value>,
}

impl RequestParameters {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Adds a parameter and returns the updated map.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns `true` when the parameter was supplied.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the raw value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns the supplied parameter names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no parameters were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a string parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] when the value is not a string.
    pub fn get_str(&self, name: &str) -> ConfigResult<Option<&str>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.as_str())),
            Some(_) => Err(ConfigError::parameter(name, "expected a string")),
        }
    }

    /// Returns a boolean parameter. The strings `"true"` and `"false"` are
    /// accepted as well, since orchestrators commonly pass every value as text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for any other shape.
    pub fn get_bool(&self, name: &str) -> ConfigResult<Option<bool>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(Value::String(value)) => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(ConfigError::parameter(name, "expected `true` or `false`")),
            },
            Some(_) => Err(ConfigError::parameter(name, "expected a boolean")),
        }
    }

    /// Returns a list-of-strings parameter. A single string is split on commas.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] when the value is neither an
    /// array of strings nor a string.
    pub fn get_string_list(&self, name: &str) -> ConfigResult<Option<Vec<String>>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_owned)
                    .collect(),
            )),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| ConfigError::parameter(name, "expected an array of strings"))
                })
                .collect::<ConfigResult<Vec<_>>>()
                .map(Some),
            Some(_) => Err(ConfigError::parameter(
                name,
                "expected a string or an array of strings",
            )),
        }
    }

    /// Decodes the whole map into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Decode`] when the map does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        Ok(serde_json::from_value(Value::Object(self.values.clone()))?)
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Map<String, Value>> for RequestParameters {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K, V> FromIterator<(K, V)> for RequestParameters
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn typed_accessors_accept_textual_values() {
        let params = RequestParameters::new()
            .with("flag", "TRUE")
            .with("list", "origin, owner,,")
            .with("name", "demo");

        assert_eq!(params.get_bool("flag").unwrap(), Some(true));
        assert_eq!(
            params.get_string_list("list").unwrap(),
            Some(vec!["origin".to_owned(), "owner".to_owned()])
        );
        assert_eq!(params.get_str("name").unwrap(), Some("demo"));
        assert_eq!(params.get_str("missing").unwrap(), None);
    }

    #[test]
    fn mismatched_shapes_are_reported() {
        let params = RequestParameters::new()
            .with("flag", json!(3))
            .with("list", json!([1, 2]));

        assert!(matches!(
            params.get_bool("flag"),
            Err(ConfigError::InvalidParameter { ref name, .. }) if name == "flag"
        ));
        assert!(params.get_string_list("list").is_err());
        assert!(params.get_str("flag").is_err());
    }

    #[test]
    fn deserializes_into_typed_struct() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Probe {
            max_depth: u32,
        }

        let params: RequestParameters = [("maxDepth", json!(4))].into_iter().collect();
        let probe: Probe = params.deserialize().unwrap();
        assert_eq!(probe.max_depth, 4);
    }
}
