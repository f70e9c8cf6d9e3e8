//! [`ResolverContainer`]: an ordered map of lazily-resolved values with a
//! [`ff_timeline::Timeline`] recording each access.

use std::fmt;
use std::sync::Arc;

use ff_timeline::{Clock, SystemClock, Timeline};
use indexmap::IndexMap;
use serde_json::Value;

use crate::resolver::Resolver;
use crate::wrapper::{ResolvedValue, ResolverWrapper, Transform};

/// A named, order-preserving group of deferred values. `get` resolves lazily
/// and records a timeline note; re-reading an already-resolved key is silent,
/// re-reading one that failed replays the same error note (deduped by
/// `Timeline`, matching the original's repeated-failed-get behavior).
#[derive(Clone)]
pub struct ResolverContainer {
    fields: IndexMap<String, ResolverWrapper>,
    timeline: Timeline,
    resolver: Resolver,
}

impl fmt::Debug for ResolverContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverContainer").field("fields", &self.fields).finish()
    }
}

impl ResolverContainer {
    /// Build a container over `fields`, using `clock` to stamp timeline events.
    pub fn new(fields: IndexMap<String, Value>, clock: Arc<dyn Clock>) -> Self {
        let entries = fields.into_iter().map(|(k, v)| (k, v, None)).collect();
        Self::with_transforms(entries, clock)
    }

    /// Build a container where each field may carry its own post-resolution
    /// transform (used by resolver-object parameters to re-apply the
    /// property's own `parse` normalization to code-resolved results).
    pub fn with_transforms(fields: Vec<(String, Value, Option<Transform>)>, clock: Arc<dyn Clock>) -> Self {
        let wrapped = fields
            .into_iter()
            .map(|(k, v, t)| (k, ResolverWrapper::with_clock(v, t, clock.clone())))
            .collect();
        Self { fields: wrapped, timeline: Timeline::new(clock.clone()), resolver: Resolver::new(clock) }
    }

    /// Build a container with a default system clock.
    pub fn with_defaults(fields: IndexMap<String, Value>) -> Self {
        Self::new(fields, Arc::new(SystemClock))
    }

    /// Resolve and return the value at `key`, recording a timeline note on
    /// first resolution and on every failed attempt.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let wrapper = self.fields.get_mut(key)?;
        if !wrapper.is_resolvable() {
            return wrapper.peek().cloned();
        }
        match self.resolver.evaluate(wrapper) {
            Ok(value) => {
                self.timeline.success(format!("resolved '{key}'"));
                Some(value.clone())
            }
            Err(err) => {
                self.timeline.error(format!("{key} is not resolvable! {err}"));
                None
            }
        }
    }

    /// Whether `key` is present at all (resolved or not).
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// This container's timeline, for surfacing alongside a response.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Resolve every field and collapse to a plain JSON object. Plain mode
    /// (`detailed = false`) emits each field's shallow resolved value
    /// (`null` if it didn't resolve); `detailed = true` emits each field's
    /// full introspection object instead — `input`, `result`, `resolvable`,
    /// `resolved`, `evaluated`, `needsEvaluation`, `timeline`, `code` —
    /// mirroring the reference resolver's own `to_json`.
    pub fn to_json(&self, detailed: bool) -> Value {
        let mut me = self.clone();
        let mut out = serde_json::Map::new();
        for key in me.fields.keys().cloned().collect::<Vec<_>>() {
            let _ = me.get(&key);
            let wrapper = me.fields.get(&key).expect("key was just read from this container's own field list");
            let value = if detailed { wrapper_introspection(wrapper) } else { wrapper.peek().cloned().unwrap_or(Value::Null) };
            out.insert(key, value);
        }
        Value::Object(out)
    }

    /// Wrap a resolved value for nesting — used when a field's raw value is
    /// itself an object that should become a child container rather than a
    /// plain JSON object.
    pub fn adopt_nested(fields: IndexMap<String, Value>, clock: Arc<dyn Clock>) -> ResolvedValue {
        ResolvedValue::Container(Self::new(fields, clock))
    }
}

fn wrapper_introspection(wrapper: &ResolverWrapper) -> Value {
    serde_json::json!({
        "input": wrapper.raw(),
        "result": wrapper.peek().cloned().unwrap_or(Value::Null),
        "resolvable": wrapper.resolvable(),
        "resolved": wrapper.is_resolved(),
        "evaluated": wrapper.is_evaluated(),
        "needsEvaluation": wrapper.needs_evaluation(),
        "timeline": wrapper.timeline().to_json(),
        "code": wrapper.code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ff_timeline::FixedClock;

    fn fields(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn plain_values_resolve_immediately() {
        let clock = Arc::new(FixedClock(Utc::now()));
        let mut container = ResolverContainer::new(fields(&[("a", Value::from(1))]), clock);
        assert_eq!(container.get("a"), Some(Value::from(1)));
    }

    #[test]
    fn missing_key_is_none() {
        let mut container = ResolverContainer::with_defaults(fields(&[("a", Value::from(1))]));
        assert_eq!(container.get("missing"), None);
    }

    #[test]
    fn code_value_resolves_via_sandbox() {
        let mut container =
            ResolverContainer::with_defaults(fields(&[("sum", Value::String("<(1 + 2)>".to_string()))]));
        assert_eq!(container.get("sum"), Some(Value::from(3)));
        assert_eq!(container.timeline().len(), 1);
    }

    #[test]
    fn to_json_collects_all_fields() {
        let mut container = ResolverContainer::with_defaults(fields(&[
            ("a", Value::from(1)),
            ("b", Value::String("<(2 + 2)>".to_string())),
        ]));
        let json = container.to_json(false);
        assert_eq!(json["a"], Value::from(1));
        assert_eq!(json["b"], Value::from(4));
    }

    #[test]
    fn detailed_to_json_reports_full_introspection() {
        let mut container = ResolverContainer::with_defaults(fields(&[
            ("a", Value::from(1)),
            ("b", Value::String("<(2 + 2)>".to_string())),
        ]));
        let json = container.to_json(true);
        assert_eq!(json["a"]["result"], Value::from(1));
        assert_eq!(json["a"]["needsEvaluation"], Value::from(false));
        assert_eq!(json["b"]["result"], Value::from(4));
        assert_eq!(json["b"]["needsEvaluation"], Value::from(true));
        assert_eq!(json["b"]["resolved"], Value::from(true));
        assert_eq!(json["b"]["code"], Value::from("2 + 2"));
        assert!(json["b"]["timeline"].as_array().unwrap().is_empty());
    }

    #[test]
    fn transform_renormalizes_resolved_code_value() {
        use std::sync::Arc as StdArc;
        let transform: Transform = StdArc::new(|v| Ok(Value::String(v.as_str().unwrap_or("").trim().to_string())));
        let entries = vec![("s".to_string(), Value::String("<(\"  hi  \")>".to_string()), Some(transform))];
        let mut container = ResolverContainer::with_transforms(entries, Arc::new(SystemClock));
        assert_eq!(container.get("s"), Some(Value::from("hi")));
    }
}
