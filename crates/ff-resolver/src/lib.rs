//! **ff-resolver** – sandboxed deferred-expression evaluation and the lazy
//! key/value container built on top of it.
//!
//! A value is "deferred" when it's a string wrapped in `<( ... )>`. Such
//! strings are treated as source code in an embedded scripting language and
//! are evaluated on first access rather than eagerly, mirroring the
//! reference implementation's resolver/container split but backed by a real
//! sandboxed engine ([`rhai`]) instead of a bespoke `exec` + signal-timeout
//! trick.

pub mod container;
pub mod resolver;
pub mod sandbox;
pub mod wrapper;

pub use container::ResolverContainer;
pub use resolver::{contains_code, Resolver, ResolverError};
pub use sandbox::SandboxError;
pub use wrapper::{ResolvedValue, ResolverWrapper, Transform, WrapError};

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::Value;

    /// End-to-end smoke test covering plain values, deferred evaluation, and
    /// a script that fails, with this crate's (Rhai-backed) error surface
    /// rather than CPython's literal exception class names.
    #[test]
    fn mixed_container_resolves_and_reports_failures() {
        let mut fields = IndexMap::new();
        fields.insert("literal".to_string(), Value::from(7));
        fields.insert("computed".to_string(), Value::String("<(6 * 7)>".to_string()));
        fields.insert("broken".to_string(), Value::String("<(undefined_fn())>".to_string()));

        let mut container = ResolverContainer::with_defaults(fields);

        assert_eq!(container.get("literal"), Some(Value::from(7)));
        assert_eq!(container.get("computed"), Some(Value::from(42)));
        assert_eq!(container.get("broken"), None);

        let timeline = container.timeline();
        assert!(timeline.events().iter().any(|e| e.messages[0].contains("is not resolvable!")));
    }

    #[test]
    fn resolved_value_into_json_flattens_container() {
        let mut fields = IndexMap::new();
        fields.insert("x".to_string(), Value::from(1));
        let resolved = ResolvedValue::Container(ResolverContainer::with_defaults(fields));
        let json = resolved.into_json();
        assert_eq!(json["x"], Value::from(1));
    }
}
