//! [`ParamValidator`] wraps a Draft-4 [`jsonschema`] validator built once
//! from a worker's declared parameter tree, producing structured error
//! records rather than raw validator exceptions.

use indexmap::IndexMap;
use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parameter::Parameter;
use crate::spec::ParamSpec;

/// One structured validation failure, shaped to match what the protocol's
/// worker loop attaches to an `INVALID` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorRecord {
    pub message: String,
    pub path: String,
    pub relative_path: String,
    pub absolute_path: String,
    pub validator: String,
    pub validator_value: Value,
}

/// Validates an event object against a worker's declared parameters.
pub struct ParamValidator {
    schema: JSONSchema,
}

impl ParamValidator {
    /// Build a validator for `parameters`, wrapped as the root object's
    /// declared properties (mirrors `ParamValidator.__init__` wrapping the
    /// whole parameter set in an anonymous `ObjectParameter`).
    pub fn new(parameters: IndexMap<String, Parameter>) -> Self {
        let root = Parameter::object(ParamSpec::required(""), parameters);
        let schema_doc = root.to_schema(true);
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft4)
            .compile(&schema_doc)
            .expect("parameter tree must emit a compilable Draft-4 schema");
        Self { schema }
    }

    /// Validate `event`, returning one record per failure in document order.
    pub fn validate(&self, event: &Value) -> Vec<ValidationErrorRecord> {
        match self.schema.validate(event) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|err| {
                    let path = join_pointer(&err.instance_path);
                    let keyword = validator_keyword(&err);
                    let value = validator_value(&keyword, &err);
                    ValidationErrorRecord {
                        message: err.to_string(),
                        relative_path: path.clone(),
                        path: path.clone(),
                        absolute_path: path,
                        validator: keyword,
                        validator_value: value,
                    }
                })
                .collect(),
        }
    }

    /// Whether `event` validates cleanly.
    pub fn is_valid(&self, event: &Value) -> bool {
        self.schema.is_valid(event)
    }
}

fn join_pointer(path: &jsonschema::paths::JSONPointer) -> String {
    path.to_string().trim_start_matches('/').to_string()
}

fn validator_keyword(err: &jsonschema::ValidationError) -> String {
    // Best-effort keyword label: `ValidationErrorKind`'s Debug name (e.g.
    // "Type", "Required") lowercased, matching jsonschema-python's
    // `validator` field closely enough for worker-facing diagnostics.
    let debug = format!("{:?}", err.kind);
    let name = debug.split(['{', '(', ' ']).next().unwrap_or("validation");
    name.chars().next().map(|c| c.to_ascii_lowercase()).into_iter().chain(name.chars().skip(1)).collect()
}

/// The schema keyword's own value, e.g. `"string"` for a `type` mismatch or
/// the regex source for a `pattern` mismatch — the field jsonschema-python
/// calls `validator_value`. `jsonschema`'s `ValidationErrorKind` doesn't hand
/// this back as a typed field, so it's recovered from the same `Debug`
/// rendering `validator_keyword` already parses.
fn validator_value(keyword: &str, err: &jsonschema::ValidationError) -> Value {
    let debug = format!("{:?}", err.kind);
    let (Some(open), Some(close)) = (debug.find('{'), debug.rfind('}')) else {
        return Value::Null;
    };
    let inner = debug[open + 1..close].trim();
    let value_part = inner.split_once(':').map(|(_, v)| v.trim()).unwrap_or(inner);

    if keyword == "type" {
        // `value_part` looks like `Single(String)` or `Multiple([String, Null])`;
        // the JSON Schema type name is the inner identifier, lowercased.
        let name = value_part
            .trim_start_matches("Single(")
            .trim_start_matches("Multiple(")
            .trim_end_matches(')')
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .next()
            .unwrap_or(value_part)
            .trim();
        return Value::String(name.to_ascii_lowercase());
    }

    serde_json::from_str(value_part).unwrap_or_else(|_| Value::String(value_part.trim_matches('"').to_string()))
}
