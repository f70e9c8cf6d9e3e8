//! **ff-schema** – declarative parameter descriptors: JSON-Schema Draft-4
//! emission, Draft-4 validation, and typed parsing of raw JSON values
//! (including the resolver-backed variant that defers to [`ff_resolver`]).
//!
//! The reference implementation models every parameter/result kind as a
//! subclass in a deep `SchemaParameter` inheritance tree; here the tree
//! collapses to one [`Parameter`] struct carrying a [`ParameterKind`] role
//! tag, dispatched over in `to_schema`/`parse`.

pub mod error;
pub mod function_params;
pub mod parameter;
pub mod spec;
pub mod validator;

pub use error::SchemaError;
pub use function_params::FunctionParams;
pub use parameter::{Parameter, ParameterKind};
pub use spec::ParamSpec;
pub use validator::{ParamValidator, ValidationErrorRecord};
