//! **ff-worker** – the poll -> validate -> parse -> handle -> encode ->
//! respond activity worker loop: a typed exception taxonomy, camelCase
//! parameter-name normalization, and [`ActivityWorker`] itself.

pub mod exception;
pub mod naming;
pub mod worker;

pub use exception::{ActivityException, ExceptionKind};
pub use naming::camel_to_snake;
pub use worker::{
    ActivityHandler, ActivityWorker, DebugHandler, HandlerOutput, RunOutcome, WorkerConfig, WorkerError,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use ff_queue::{InMemoryBlobStore, InMemoryTaskQueue, TaskQueue};
    use ff_response::ActivityStatus;
    use ff_schema::{FunctionParams, Parameter, ParamSpec};
    use ff_timeline::{Clock, FixedClock};
    use indexmap::IndexMap;
    use serde_json::{json, Value};

    use super::*;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(chrono::Utc::now()))
    }

    fn config() -> WorkerConfig {
        WorkerConfig {
            description: "echoes its input".to_string(),
            region: "us-east-1".to_string(),
            activity_name: "Echo".to_string(),
            activity_version: "1.0".to_string(),
            domain: "test-domain".to_string(),
            disable_protocol: false,
            size_limit: ff_codec::DEFAULT_SIZE_LIMIT,
            blob_bucket: "test-bucket".to_string(),
        }
    }

    fn parameters() -> IndexMap<String, Parameter> {
        let mut m = IndexMap::new();
        m.insert("orderId".to_string(), Parameter::string(ParamSpec::required("order id")));
        m
    }

    struct Echo;

    #[async_trait]
    impl ActivityHandler for Echo {
        async fn handle(&self, params: FunctionParams) -> Result<HandlerOutput, ActivityException> {
            let order_id = params.get("order_id").ok_or_else(|| ActivityException::validation("missing order_id"))?;
            Ok(HandlerOutput::new(json!({"echoed": order_id})))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl ActivityHandler for AlwaysFails {
        async fn handle(&self, _params: FunctionParams) -> Result<HandlerOutput, ActivityException> {
            Err(ActivityException::fatal("handler is broken"))
        }
    }

    struct Panics;

    #[async_trait]
    impl ActivityHandler for Panics {
        async fn handle(&self, _params: FunctionParams) -> Result<HandlerOutput, ActivityException> {
            Err(ActivityException::wrap(ExceptionKind::Failed, "unhandled exception", "boom"))
        }
    }

    fn worker(handler: Arc<dyn ActivityHandler>) -> ActivityWorker {
        ActivityWorker::new(config(), parameters(), Parameter::json(ParamSpec::optional("result")), handler, clock())
    }

    #[tokio::test]
    async fn empty_poll_returns_none() {
        let queue = InMemoryTaskQueue::new();
        let blobs = InMemoryBlobStore::new();
        let w = worker(Arc::new(Echo));
        assert!(w.run_once(&queue, &blobs).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn success_scenario_completes() {
        let queue = InMemoryTaskQueue::new();
        let blobs = InMemoryBlobStore::new();
        queue.push("T1", json!({"orderId": "abc"}).to_string());

        let w = worker(Arc::new(Echo));
        let outcome = w.run_once(&queue, &blobs).await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));

        let outcomes = queue.outcomes();
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            ff_queue::RecordedOutcome::Completed { result, .. } => {
                let parsed: Value = serde_json::from_str(result).unwrap();
                assert_eq!(parsed["status"], "SUCCESS");
                assert_eq!(parsed["result"]["echoed"], "abc");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validation_failure_reports_as_failed_not_cancelled() {
        let queue = InMemoryTaskQueue::new();
        let blobs = InMemoryBlobStore::new();
        queue.push("T1", json!({}).to_string());

        let w = worker(Arc::new(Echo));
        let outcome = w.run_once(&queue, &blobs).await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Failed(_)));

        let outcomes = queue.outcomes();
        match &outcomes[0] {
            ff_queue::RecordedOutcome::Failed { details, .. } => {
                let parsed: Value = serde_json::from_str(details).unwrap();
                assert_eq!(parsed["status"], "INVALID");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fatal_handler_error_reports_as_failed() {
        let queue = InMemoryTaskQueue::new();
        let blobs = InMemoryBlobStore::new();
        queue.push("T1", json!({"orderId": "abc"}).to_string());

        let w = worker(Arc::new(AlwaysFails));
        let outcome = w.run_once(&queue, &blobs).await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn unhandled_exception_reports_as_cancelled_with_default_status() {
        let queue = InMemoryTaskQueue::new();
        let blobs = InMemoryBlobStore::new();
        queue.push("T1", json!({"orderId": "abc"}).to_string());

        let w = worker(Arc::new(Panics));
        let outcome = w.run_once(&queue, &blobs).await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Cancelled(_)));

        match &queue.outcomes()[0] {
            ff_queue::RecordedOutcome::Cancelled { details, .. } => {
                let parsed: Value = serde_json::from_str(details).unwrap();
                assert_eq!(parsed["status"], "FAILED");
                assert_eq!(parsed["trace"][0], "boom");
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn return_schema_short_circuits() {
        let queue = InMemoryTaskQueue::new();
        let blobs = InMemoryBlobStore::new();
        queue.push("T1", json!({"RETURN_SCHEMA": true}).to_string());

        let w = worker(Arc::new(Echo));
        let outcome = w.run_once(&queue, &blobs).await.unwrap().unwrap();
        match outcome {
            RunOutcome::Schema(schema) => assert_eq!(schema["description"], "echoes its input"),
            other => panic!("expected Schema, got {other:?}"),
        }
        assert!(queue.outcomes().is_empty());
    }

    #[tokio::test]
    async fn disable_protocol_returns_raw_result_and_skips_queue_respond() {
        let queue = InMemoryTaskQueue::new();
        let blobs = InMemoryBlobStore::new();
        queue.push("T1", json!({"orderId": "abc", "DISABLE_PROTOCOL": true}).to_string());

        let w = worker(Arc::new(Echo));
        let outcome = w.run_once(&queue, &blobs).await.unwrap().unwrap();
        match outcome {
            RunOutcome::Disabled(value) => assert_eq!(value["echoed"], "abc"),
            other => panic!("expected Disabled, got {other:?}"),
        }
        assert!(queue.outcomes().is_empty());
    }

    #[tokio::test]
    async fn disable_protocol_propagates_exceptions_instead_of_responding() {
        let queue = InMemoryTaskQueue::new();
        let blobs = InMemoryBlobStore::new();
        queue.push("T1", json!({"orderId": "abc", "DISABLE_PROTOCOL": true}).to_string());

        let w = worker(Arc::new(AlwaysFails));
        let err = w.run_once(&queue, &blobs).await.unwrap_err();
        assert!(matches!(err, WorkerError::Disabled(_)));
        assert!(queue.outcomes().is_empty());
    }
}
