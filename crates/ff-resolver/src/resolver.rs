//! The `Resolver` evaluation entry point: given a [`ResolverWrapper`],
//! decide whether it needs evaluation and, if so, run it through the
//! sandbox and translate failures into the error types this crate exposes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ff_timeline::Clock;
use serde_json::Value;
use thiserror::Error;

use crate::sandbox::{self, CODE_MARKER};
use crate::wrapper::{ResolverWrapper, WrapError};

/// Default evaluation timeout, matching the reference implementation's
/// `SIGALRM`-based five-second budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures surfaced while evaluating a deferred expression.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The code failed to compile, run, or its resolved value failed
    /// post-resolution normalization.
    #[error(transparent)]
    Wrap(#[from] WrapError),
}

/// Evaluates deferred expressions on behalf of a [`crate::container::ResolverContainer`].
#[derive(Clone)]
pub struct Resolver {
    #[allow(dead_code)]
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").field("timeout", &self.timeout).finish()
    }
}

impl Resolver {
    /// Build a resolver. `clock` is accepted for parity with the rest of the
    /// crate's clock-injection convention, though evaluation itself is
    /// presently clock-independent.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, timeout: DEFAULT_TIMEOUT }
    }

    /// Override the evaluation timeout (tests use this to exercise `TIMEOUT`
    /// without waiting five seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `wrapper`, caching the value on success.
    #[tracing::instrument(skip(self, wrapper))]
    pub fn evaluate<'a>(&self, wrapper: &'a mut ResolverWrapper) -> Result<&'a Value, ResolverError> {
        let timeout = self.timeout;
        wrapper
            .resolve_with(|code| {
                let wrapped = sandbox::wrap_code(code);
                sandbox::execute(&wrapped, timeout)
            })
            .map_err(ResolverError::from)
    }
}

/// Does `value` contain deferred code anywhere in its structure? Mirrors the
/// original's duck-typed `_contains_code`: a bare string counts if it carries
/// the `<(` prefix (there is no closing marker); containers count if any
/// descendant does.
pub fn contains_code(value: &Value) -> bool {
    match value {
        Value::String(s) => s.starts_with(CODE_MARKER),
        Value::Array(items) => items.iter().any(contains_code),
        Value::Object(map) => map.values().any(contains_code),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_timeline::SystemClock;
    use std::time::Duration as StdDuration;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(SystemClock))
    }

    #[test]
    fn plain_string_is_not_code() {
        assert!(!contains_code(&Value::String("hello".to_string())));
    }

    #[test]
    fn marked_string_is_code() {
        assert!(contains_code(&Value::String("<(1 + 1)>".to_string())));
    }

    #[test]
    fn nested_array_with_code_counts() {
        let v = serde_json::json!([1, 2, "<(3)>"]);
        assert!(contains_code(&v));
    }

    #[test]
    fn code_without_closing_marker_still_counts() {
        assert!(contains_code(&Value::String("<(return [1, 2, 3]".to_string())));
        assert!(contains_code(&serde_json::json!({"k": "<(return [1,2,3]"})));
        assert!(contains_code(&serde_json::json!(["<(", "while True: pass"])));
        assert!(contains_code(&Value::String("<(\nimport json".to_string())));
        assert!(contains_code(&Value::String("<(open('x')".to_string())));
    }

    #[test]
    fn evaluate_runs_arithmetic() {
        let mut wrapper = ResolverWrapper::new(Value::String("<(2 * 21)>".to_string()), None);
        let value = resolver().evaluate(&mut wrapper).unwrap();
        assert_eq!(*value, Value::from(42));
    }

    #[test]
    fn evaluate_surfaces_timeout() {
        let mut wrapper = ResolverWrapper::new(Value::String("<(loop { })>".to_string()), None);
        let err = resolver().with_timeout(StdDuration::from_millis(30)).evaluate(&mut wrapper).unwrap_err();
        assert!(err.to_string().contains("TIMEOUT"));
    }
}
