//! [`ResolverWrapper`] holds a single deferred value: either plain data or
//! code waiting to be evaluated. [`ResolvedValue`] is the shared result type
//! threaded through both this crate and `ff-schema`, since a resolver-backed
//! object parameter must be able to produce either a plain JSON value or a
//! nested [`crate::container::ResolverContainer`].

use std::fmt;
use std::sync::Arc;

use ff_timeline::{Clock, SystemClock, Timeline};
use serde_json::Value;

use crate::container::ResolverContainer;
use crate::sandbox::{self, CODE_MARKER};

/// Either a resolved plain JSON value, or a lazy container of further
/// resolver wrappers. `ff-schema` reuses this as its parse result so a
/// `ResolverObjectParameter` can hand back a container without forcing every
/// other parameter kind to carry the variant around.
#[derive(Debug, Clone)]
pub enum ResolvedValue {
    Json(Value),
    Container(ResolverContainer),
}

impl ResolvedValue {
    /// Collapse to plain JSON, recursively resolving any nested container.
    pub fn into_json(self) -> Value {
        match self {
            ResolvedValue::Json(v) => v,
            ResolvedValue::Container(c) => c.to_json(false),
        }
    }
}

/// Post-resolution normalization applied to a wrapper's value, e.g. a
/// schema property's own `parse` re-applied to a code-resolved result so
/// schema normalization isn't bypassed just because the value came out of
/// the sandbox. Modeled as a fallible closure since the normalizer (a
/// `Parameter::parse` call, from `ff-schema`) can itself reject the value.
pub type Transform = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Failure resolving or transforming a wrapper's value.
#[derive(Debug, Clone)]
pub enum WrapError {
    Sandbox(sandbox::SandboxError),
    Transform(String),
}

impl fmt::Display for WrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WrapError::Sandbox(e) => write!(f, "{e}"),
            WrapError::Transform(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for WrapError {}

impl From<sandbox::SandboxError> for WrapError {
    fn from(e: sandbox::SandboxError) -> Self {
        WrapError::Sandbox(e)
    }
}

/// A single deferred slot: starts either already resolved (plain data) or
/// holding an unresolved code value, evaluated at most once.
///
/// `raw` isn't always a bare code string: per the reference resolver, a
/// mapping whose values contain code, or a sequence whose elements contain
/// code, are just as much "code" as a single marked string — both are
/// walked recursively on resolution by [`evaluate_deferred`].
#[derive(Clone)]
pub struct ResolverWrapper {
    raw: Value,
    resolved: Option<Value>,
    failed: bool,
    transform: Option<Transform>,
    needs_evaluation: bool,
    evaluated: bool,
    code: Option<String>,
    timeline: Timeline,
}

impl fmt::Debug for ResolverWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverWrapper")
            .field("raw", &self.raw)
            .field("resolved", &self.resolved)
            .field("failed", &self.failed)
            .finish()
    }
}

impl ResolverWrapper {
    /// Wrap a raw value. If it isn't code (per [`crate::resolver::contains_code`]),
    /// it's considered already resolved — and, per the reference
    /// implementation, any transform is applied eagerly right here rather
    /// than deferred to first access.
    pub fn new(raw: Value, transform: Option<Transform>) -> Self {
        Self::with_clock(raw, transform, Arc::new(SystemClock))
    }

    /// Same as [`Self::new`], stamping this wrapper's own timeline (surfaced
    /// by the detailed [`crate::container::ResolverContainer::to_json`]
    /// introspection) with `clock`.
    pub fn with_clock(raw: Value, transform: Option<Transform>, clock: Arc<dyn Clock>) -> Self {
        let needs_evaluation = crate::resolver::contains_code(&raw);
        let timeline = Timeline::new(clock);
        if needs_evaluation {
            return Self {
                raw,
                resolved: None,
                failed: false,
                transform,
                needs_evaluation,
                evaluated: false,
                code: None,
                timeline,
            };
        }
        let (resolved, failed) = match apply(&transform, raw.clone()) {
            Ok(v) => (Some(v), false),
            Err(_) => (None, true),
        };
        Self { raw, resolved, failed, transform, needs_evaluation, evaluated: true, code: None, timeline }
    }

    /// Whether this slot still needs evaluation (and hasn't already failed).
    pub fn is_resolvable(&self) -> bool {
        self.resolved.is_none() && !self.failed
    }

    /// The raw (possibly still-code) value, for diagnostics.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The resolved value, if resolution has already happened.
    pub fn peek(&self) -> Option<&Value> {
        self.resolved.as_ref()
    }

    /// Whether this wrapper's raw value was code at all, fixed at construction.
    pub fn needs_evaluation(&self) -> bool {
        self.needs_evaluation
    }

    /// Whether evaluation has been attempted, regardless of outcome.
    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    /// Whether resolution completed without a sandbox or transform failure.
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Whether this wrapper hasn't hit an unrecoverable sandbox or transform
    /// failure (distinct from [`Self::is_resolvable`], which also goes false
    /// once resolution has *succeeded*).
    pub fn resolvable(&self) -> bool {
        !self.failed
    }

    /// The generated source of the last code this wrapper ran, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// This wrapper's own timeline (distinct from its container's shared one).
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Force resolution via `eval`, caching the result. `eval` receives a
    /// stripped code body and must return the evaluated JSON value; it may
    /// be invoked more than once when `raw` is a map or sequence with
    /// several deferred leaves.
    pub fn resolve_with<F>(&mut self, eval: F) -> Result<&Value, WrapError>
    where
        F: Fn(&str) -> Result<Value, sandbox::SandboxError>,
    {
        if self.resolved.is_none() && !self.failed {
            self.evaluated = true;
            let mut last_code = None;
            let outcome = evaluate_deferred(&self.raw, &eval, &mut last_code);
            self.code = last_code;
            let value = match outcome {
                Ok(v) => v,
                Err(e) => {
                    self.failed = true;
                    self.timeline.error(e.to_string());
                    return Err(e);
                }
            };
            match apply(&self.transform, value) {
                Ok(v) => self.resolved = Some(v),
                Err(msg) => {
                    self.failed = true;
                    return Err(WrapError::Transform(msg));
                }
            }
        }
        self.resolved.as_ref().ok_or(WrapError::Transform("value did not resolve".to_string()))
    }
}

/// Walk `value`, evaluating every deferred leaf through `eval` and leaving
/// everything else untouched. Mirrors the reference resolver's `__evaluate`:
/// a mapping evaluates each of its values and rejects a key that is itself
/// marked as code; a sequence whose first element is literally the marker
/// treats the rest as lines of one script joined by newlines, otherwise each
/// element is evaluated independently; a marked string is evaluated as its
/// own script; anything else passes through unchanged.
fn evaluate_deferred(
    value: &Value,
    eval: &impl Fn(&str) -> Result<Value, sandbox::SandboxError>,
    last_code: &mut Option<String>,
) -> Result<Value, WrapError> {
    match value {
        Value::String(s) if s.starts_with(CODE_MARKER) => {
            let code = s.trim_start_matches(CODE_MARKER);
            *last_code = Some(code.to_string());
            eval(code).map_err(WrapError::from)
        }
        Value::Array(items) => {
            if matches!(items.first(), Some(Value::String(s)) if s == CODE_MARKER) {
                let joined = items.iter().map(as_join_str).collect::<Vec<_>>().join("\n");
                let code = joined.trim_start_matches(CODE_MARKER).to_string();
                *last_code = Some(code.clone());
                eval(&code).map_err(WrapError::from)
            } else {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(evaluate_deferred(item, eval, last_code)?);
                }
                Ok(Value::Array(out))
            }
        }
        Value::Object(map) => {
            if let Some(bad) = map.keys().find(|k| k.starts_with(CODE_MARKER)) {
                return Err(WrapError::Transform(format!("Operators like '{bad}' are NOT supported!")));
            }
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), evaluate_deferred(v, eval, last_code)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn as_join_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn apply(transform: &Option<Transform>, value: Value) -> Result<Value, String> {
    match transform {
        Some(f) => f(value),
        None => Ok(value),
    }
}
