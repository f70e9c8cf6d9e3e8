//! **ff-timeline** – append-only event log for resolvers and containers.
//!
//! A `Timeline` records `NOTE`/`WARNING`/`ERROR`/`SUCCESS` events as they
//! happen during resolver evaluation or container lookups. Appending the
//! same message twice in a row is a no-op: the second append is dropped so
//! repeated failures (e.g. re-reading an unresolved wrapper) don't spam the
//! log.
//!
//! The reference implementation kept a process-wide mutable default
//! timestamp on the `Timeline` class. This port drops that in favor of an
//! injected [`Clock`], fixed at construction and never mutated afterward.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supplies the "when" for events that don't specify their own timestamp.
///
/// Inject a [`FixedClock`] in tests; production code uses [`SystemClock`].
pub trait Clock: Send + Sync {
    /// Current time, per this clock.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant. Useful for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The kind of [`TimelineEvent`] recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEventType {
    /// Informational note, no error implied.
    Note,
    /// Something worth flagging but not fatal.
    Warning,
    /// A failure occurred.
    Error,
    /// An operation completed successfully.
    Success,
}

impl fmt::Display for TimelineEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimelineEventType::Note => "NOTE",
            TimelineEventType::Warning => "WARNING",
            TimelineEventType::Error => "ERROR",
            TimelineEventType::Success => "SUCCESS",
        };
        f.write_str(s)
    }
}

/// A single entry in a [`Timeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    /// What kind of event this is.
    pub event_type: TimelineEventType,
    /// One or more human-readable messages attached to the event.
    pub messages: Vec<String>,
    /// When the event happened, if known.
    pub when: Option<DateTime<Utc>>,
}

impl TimelineEvent {
    fn new(event_type: TimelineEventType, messages: Vec<String>, when: Option<DateTime<Utc>>) -> Self {
        Self { event_type, messages, when }
    }

    /// Serialize to the `{eventType, messages, when}` shape the protocol expects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "eventType": self.event_type.to_string(),
            "messages": self.messages,
            "when": self.when.map(|w| w.to_rfc3339()).unwrap_or_else(|| "--".to_string()),
        })
    }
}

/// Append-only, consecutive-dedup event log.
#[derive(Clone)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline").field("events", &self.events).finish()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Timeline {
    /// Build a timeline that stamps un-timed events using `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { events: Vec::new(), clock }
    }

    /// Record a note.
    pub fn note(&mut self, message: impl Into<String>) {
        self.add(TimelineEventType::Note, vec![message.into()], None);
    }

    /// Record a warning.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.add(TimelineEventType::Warning, vec![message.into()], None);
    }

    /// Record an error.
    pub fn error(&mut self, message: impl Into<String>) {
        self.add(TimelineEventType::Error, vec![message.into()], None);
    }

    /// Record a success.
    pub fn success(&mut self, message: impl Into<String>) {
        self.add(TimelineEventType::Success, vec![message.into()], None);
    }

    fn add(&mut self, event_type: TimelineEventType, messages: Vec<String>, when: Option<DateTime<Utc>>) {
        let when = when.or_else(|| Some(self.clock.now()));
        if let Some(last) = self.events.last() {
            if last.messages == messages {
                return;
            }
        }
        self.events.push(TimelineEvent::new(event_type, messages, when));
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// The most recent event's first message, if any.
    pub fn last_message(&self) -> Option<&str> {
        self.events.last().and_then(|e| e.messages.first()).map(String::as_str)
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the timeline has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Serialize the whole timeline as a JSON array, oldest first.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.events.iter().map(TimelineEvent::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_duplicate_messages_are_dropped() {
        let mut tl = Timeline::default();
        tl.error("boom");
        tl.error("boom");
        tl.error("boom");
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn non_consecutive_duplicates_are_kept() {
        let mut tl = Timeline::default();
        tl.error("boom");
        tl.note("ok");
        tl.error("boom");
        assert_eq!(tl.len(), 3);
    }

    #[test]
    fn unset_when_serializes_as_dashes() {
        struct NoClock;
        impl Clock for NoClock {
            fn now(&self) -> DateTime<Utc> {
                unreachable!("not called when `when` is explicitly None")
            }
        }
        let tl = Timeline::new(Arc::new(NoClock));
        let event = TimelineEvent::new(TimelineEventType::Note, vec!["hi".into()], None);
        assert_eq!(event.to_json()["when"], serde_json::json!("--"));
        assert_eq!(tl.len(), 0);
    }

    #[test]
    fn to_json_shape() {
        let clock = Arc::new(FixedClock(Utc::now()));
        let mut tl = Timeline::new(clock);
        tl.note("hello");
        let json = tl.to_json();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["eventType"], "NOTE");
        assert_eq!(arr[0]["messages"], serde_json::json!(["hello"]));
    }

    #[test]
    fn last_message_tracks_most_recent() {
        let mut tl = Timeline::default();
        assert!(tl.last_message().is_none());
        tl.note("first");
        tl.error("second");
        assert_eq!(tl.last_message(), Some("second"));
    }
}
