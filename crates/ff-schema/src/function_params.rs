//! [`FunctionParams`]: a thin read/write view over a parsed-argument map
//! that trims string values on read, matching the convenience the reference
//! implementation's handler-argument object provided.

use std::collections::HashMap;

use serde_json::Value;

/// Handler-facing argument bag. Values looked up through `get`/`index` are
/// trimmed when they're strings; everything else passes through untouched.
#[derive(Debug, Clone, Default)]
pub struct FunctionParams {
    values: HashMap<String, Value>,
}

impl FunctionParams {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Look up `key`, trimming string values.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(trim_if_string)
    }

    /// Look up `key`, falling back to `default` when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn into_inner(self) -> HashMap<String, Value> {
        self.values
    }
}

fn trim_if_string(v: &Value) -> Value {
    match v {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_values_are_trimmed_on_read() {
        let mut params = FunctionParams::default();
        params.insert("name", Value::String("  bob  ".to_string()));
        assert_eq!(params.get("name"), Some(Value::String("bob".to_string())));
    }

    #[test]
    fn non_string_values_pass_through() {
        let mut params = FunctionParams::default();
        params.insert("count", Value::from(3));
        assert_eq!(params.get("count"), Some(Value::from(3)));
    }

    #[test]
    fn missing_key_uses_default() {
        let params = FunctionParams::default();
        assert_eq!(params.get_or("missing", Value::from(42)), Value::from(42));
    }
}
