//! [`TaskQueue`]: the abstract long-poll orchestrator collaborator. Out of
//! scope per the protocol — specified here only at its interface, plus an
//! in-memory double for tests and the demo binary.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Opaque token identifying one in-flight task; echoed back on
/// complete/cancel/fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskToken(pub String);

impl std::fmt::Display for TaskToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A declared activity's name, distinct from its version suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityName(pub String);

/// One unit of dispatched work.
#[derive(Debug, Clone)]
pub struct Task {
    pub task_token: TaskToken,
    pub input: String,
}

#[derive(Debug, Error)]
pub enum TaskQueueError {
    #[error("task queue poll failed: {0}")]
    Poll(String),
    #[error("task queue respond failed: {0}")]
    Respond(String),
}

/// Long-poll task dispatch. `poll` returns `None` on an empty long-poll
/// response (no `taskToken`), matching the worker's "nothing to do" step.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn poll(&self, domain: &str, task_list: &str) -> Result<Option<Task>, TaskQueueError>;
    async fn complete(&self, token: &TaskToken, result: &str) -> Result<(), TaskQueueError>;
    async fn cancel(&self, token: &TaskToken, details: &str) -> Result<(), TaskQueueError>;
    async fn fail(&self, token: &TaskToken, reason: &str, details: &str) -> Result<(), TaskQueueError>;
}

/// Outcome recorded by [`InMemoryTaskQueue`] for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOutcome {
    Completed { token: TaskToken, result: String },
    Cancelled { token: TaskToken, details: String },
    Failed { token: TaskToken, reason: String, details: String },
}

/// A `TaskQueue` double backed by an in-memory FIFO, for tests and the demo
/// binary. Every respond call is recorded for later assertion instead of
/// being sent anywhere.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    pending: Mutex<VecDeque<Task>>,
    outcomes: Mutex<Vec<RecordedOutcome>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task for the next `poll` to return.
    pub fn push(&self, task_token: impl Into<String>, input: impl Into<String>) {
        self.pending
            .lock()
            .unwrap()
            .push_back(Task { task_token: TaskToken(task_token.into()), input: input.into() });
    }

    /// All outcomes recorded so far, oldest first.
    pub fn outcomes(&self) -> Vec<RecordedOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn poll(&self, _domain: &str, _task_list: &str) -> Result<Option<Task>, TaskQueueError> {
        Ok(self.pending.lock().unwrap().pop_front())
    }

    async fn complete(&self, token: &TaskToken, result: &str) -> Result<(), TaskQueueError> {
        self.outcomes
            .lock()
            .unwrap()
            .push(RecordedOutcome::Completed { token: token.clone(), result: result.to_string() });
        Ok(())
    }

    async fn cancel(&self, token: &TaskToken, details: &str) -> Result<(), TaskQueueError> {
        self.outcomes
            .lock()
            .unwrap()
            .push(RecordedOutcome::Cancelled { token: token.clone(), details: details.to_string() });
        Ok(())
    }

    async fn fail(&self, token: &TaskToken, reason: &str, details: &str) -> Result<(), TaskQueueError> {
        self.outcomes.lock().unwrap().push(RecordedOutcome::Failed {
            token: token.clone(),
            reason: reason.to_string(),
            details: details.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn poll_returns_none_when_empty() {
        let queue = InMemoryTaskQueue::new();
        assert!(queue.poll("domain", "list").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn poll_returns_pushed_tasks_in_order() {
        let queue = InMemoryTaskQueue::new();
        queue.push("T1", "{}");
        queue.push("T2", "{}");
        let first = queue.poll("d", "l").await.unwrap().unwrap();
        assert_eq!(first.task_token, TaskToken("T1".to_string()));
    }

    #[tokio::test]
    async fn outcomes_are_recorded() {
        let queue = InMemoryTaskQueue::new();
        let token = TaskToken("T1".to_string());
        queue.complete(&token, "result").await.unwrap();
        assert_eq!(queue.outcomes().len(), 1);
    }
}
