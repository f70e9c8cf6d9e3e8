//! [`ParamSpec`]: the fields common to every [`crate::parameter::Parameter`]
//! kind, independent of its JSON-Schema type.

use serde_json::Value;

use crate::error::SchemaError;

/// Shared descriptor fields: description, required/optional, and default.
///
/// The reference implementation silently forces `required = False` whenever
/// a default is present, which makes its own "required + default is an
/// error" check unreachable. This port keeps `required` as an explicit
/// three-state choice instead: leaving it unset infers optional-with-default
/// (the ergonomic, non-erroring case the original actually exercises),
/// while explicitly setting `required: true` alongside a default is a real,
/// reachable construction error.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub description: String,
    required: Option<bool>,
    pub default: Option<Value>,
}

impl ParamSpec {
    /// Build a spec. Fails if `required` is explicitly `Some(true)` while a
    /// default is also present.
    pub fn new(
        description: impl Into<String>,
        required: Option<bool>,
        default: Option<Value>,
    ) -> Result<Self, SchemaError> {
        if required == Some(true) && default.is_some() {
            return Err(SchemaError::RequiredWithDefault);
        }
        Ok(Self { description: description.into(), required, default })
    }

    /// Convenience: a required parameter with no default.
    pub fn required(description: impl Into<String>) -> Self {
        Self { description: description.into(), required: Some(true), default: None }
    }

    /// Convenience: an optional parameter with no default.
    pub fn optional(description: impl Into<String>) -> Self {
        Self { description: description.into(), required: Some(false), default: None }
    }

    /// Convenience: an optional parameter carrying `default`.
    pub fn with_default(description: impl Into<String>, default: Value) -> Self {
        Self { description: description.into(), required: None, default: Some(default) }
    }

    /// Whether this parameter must be present in the input.
    pub fn is_required(&self) -> bool {
        match self.required {
            Some(r) => r && self.default.is_none(),
            None => self.default.is_none(),
        }
    }
}
