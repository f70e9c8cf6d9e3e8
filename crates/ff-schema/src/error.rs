use thiserror::Error;

/// Failures raised while building a [`crate::parameter::Parameter`] descriptor
/// or parsing a value against one.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A required value was missing at `context`.
    #[error("{context}-Missing required parameter (description: {description})")]
    MissingRequired { context: String, description: String },

    /// A parameter was built with both `required = true` and a default.
    #[error("Required parameters can't have default values!")]
    RequiredWithDefault,

    /// `value` wasn't one of an enum parameter's allowed options.
    #[error("{value} is not a valid value for Enum!")]
    InvalidEnumValue { value: String },

    /// A value didn't match the shape a parameter kind expects (e.g. an
    /// int parameter given a non-numeric string).
    #[error("{context}: {message}")]
    InvalidValue { context: String, message: String },

    /// Evaluating a deferred value inside a resolver-backed object failed.
    #[error(transparent)]
    Resolver(#[from] ff_resolver::ResolverError),
}
