//! The worker's typed exception taxonomy. Each kind maps to exactly one
//! [`ActivityStatus`](ff_response::ActivityStatus) and one retry
//! disposition; handlers raise these to steer the worker's response
//! instead of returning a bare error.

use ff_response::ActivityStatus;

/// Which member of the taxonomy this exception belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    /// Retrying without fixing the input will not help.
    Validation,
    /// Retrying with the current input will not help.
    Fatal,
    /// A retry might work.
    Failed,
    /// An error was encountered; a retry might work.
    Error,
    /// Result not yet available; retry.
    Defer,
}

impl ExceptionKind {
    pub fn response_code(self) -> ActivityStatus {
        match self {
            ExceptionKind::Validation => ActivityStatus::Invalid,
            ExceptionKind::Fatal => ActivityStatus::Fatal,
            ExceptionKind::Failed => ActivityStatus::Failed,
            ExceptionKind::Error => ActivityStatus::Error,
            ExceptionKind::Defer => ActivityStatus::Defer,
        }
    }

    /// Whether the orchestrator should retry this outcome.
    pub fn retry(self) -> bool {
        matches!(self, ExceptionKind::Failed | ExceptionKind::Error | ExceptionKind::Defer)
    }
}

/// A typed failure raised by worker internals or a handler. Carries an
/// optional inner exception (appended to this exception's own trace on
/// demand) and a list of human-readable notes.
#[derive(Debug, Clone)]
pub struct ActivityException {
    kind: ExceptionKind,
    message: String,
    inner: Option<String>,
    notes: Vec<String>,
}

impl ActivityException {
    fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), inner: None, notes: Vec::new() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Validation, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Fatal, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Failed, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Error, message)
    }

    pub fn defer(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::Defer, message)
    }

    /// Wrap an untyped failure as `kind`, recording its message as the
    /// inner exception the way the worker wraps unhandled handler panics.
    pub fn wrap(kind: ExceptionKind, message: impl Into<String>, inner: impl std::fmt::Display) -> Self {
        Self { kind, message: message.into(), inner: Some(inner.to_string()), notes: Vec::new() }
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn response_code(&self) -> ActivityStatus {
        self.kind.response_code()
    }

    pub fn retry(&self) -> bool {
        self.kind.retry()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// The full message, including the inner exception's message if any —
    /// mirrors the original appending `": " + inner_exception.message`.
    pub fn message(&self) -> String {
        match &self.inner {
            Some(inner) => format!("{}: {inner}", self.message),
            None => self.message.clone(),
        }
    }

    /// Captured frames: just the inner exception's rendering, since Rust
    /// has no portable equivalent of Python's `traceback.format_exception`.
    pub fn trace(&self) -> Vec<String> {
        match &self.inner {
            Some(inner) => vec![inner.clone()],
            None => Vec::new(),
        }
    }
}

impl std::fmt::Display for ActivityException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ActivityException {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_invalid_no_retry() {
        let e = ActivityException::validation("bad input");
        assert_eq!(e.response_code(), ActivityStatus::Invalid);
        assert!(!e.retry());
    }

    #[test]
    fn failed_error_defer_all_retry() {
        assert!(ActivityException::failed("x").retry());
        assert!(ActivityException::error("x").retry());
        assert!(ActivityException::defer("x").retry());
    }

    #[test]
    fn fatal_does_not_retry() {
        assert!(!ActivityException::fatal("x").retry());
    }

    #[test]
    fn wrapped_message_includes_inner() {
        let e = ActivityException::wrap(ExceptionKind::Failed, "unhandled exception", "boom");
        assert_eq!(e.message(), "unhandled exception: boom");
        assert_eq!(e.trace(), vec!["boom".to_string()]);
    }

    #[test]
    fn plain_exception_has_empty_trace() {
        let e = ActivityException::error("oops");
        assert!(e.trace().is_empty());
        assert_eq!(e.message(), "oops");
    }
}
