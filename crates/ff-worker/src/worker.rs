//! [`ActivityWorker`]: the poll -> validate -> parse -> handle -> encode ->
//! respond main loop, one step per [`ActivityWorker::run_once`] call.

use std::sync::Arc;

use async_trait::async_trait;
use ff_codec::{BlobStore, CodecError};
use ff_queue::{TaskQueue, TaskQueueError, TaskToken};
use ff_response::{ActivityResponse, ActivityStatus};
use ff_schema::{FunctionParams, Parameter, ParamValidator};
use ff_timeline::Clock;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::exception::{ActivityException, ExceptionKind};
use crate::naming::camel_to_snake;

/// A successful handler result: the raw value, plus any notes the handler
/// chose to attach.
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub result: Value,
    pub notes: Vec<String>,
}

impl HandlerOutput {
    pub fn new(result: Value) -> Self {
        Self { result, notes: Vec::new() }
    }

    pub fn with_notes(result: Value, notes: Vec<String>) -> Self {
        Self { result, notes }
    }
}

/// An activity's business logic.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn handle(&self, params: FunctionParams) -> Result<HandlerOutput, ActivityException>;
}

/// Alternate entry point routed to when the event carries `DEBUG_MODE`.
#[async_trait]
pub trait DebugHandler: Send + Sync {
    async fn handle(&self, debug_mode: Value, params: FunctionParams) -> Result<HandlerOutput, ActivityException>;
}

/// Failures in the worker loop itself, distinct from [`ActivityException`]s
/// a handler raises.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] TaskQueueError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("event is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("DISABLE_PROTOCOL handler failure: {0}")]
    Disabled(#[from] ActivityException),
}

/// One worker step's outcome, for callers (tests, the demo binary) that
/// want to observe what happened without re-deriving it from the queue's
/// recorded outcomes.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Responded `completed` with the encoded success envelope.
    Completed(String),
    /// Responded `cancelled` (retryable failure).
    Cancelled(String),
    /// Responded `failed` (non-retryable failure).
    Failed(String),
    /// `RETURN_SCHEMA` short-circuit; the declared schema document.
    Schema(Value),
    /// `DISABLE_PROTOCOL` success: the raw, unwrapped handler result.
    Disabled(Value),
}

/// Per-worker-instance configuration. `serde`-deserializable so a caller's
/// own config-loading layer can populate it; sourcing (files, env,
/// secrets manager) is not this crate's concern.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WorkerConfig {
    pub description: String,
    pub region: String,
    pub activity_name: String,
    pub activity_version: String,
    pub domain: String,
    #[serde(default)]
    pub disable_protocol: bool,
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,
    #[serde(default = "default_bucket")]
    pub blob_bucket: String,
}

fn default_size_limit() -> usize {
    ff_codec::DEFAULT_SIZE_LIMIT
}

fn default_bucket() -> String {
    "retain_30_180/zipped-ff".to_string()
}

/// The poll -> validate -> parse -> handle -> encode -> respond loop for
/// one declared activity.
pub struct ActivityWorker {
    config: WorkerConfig,
    parameters: IndexMap<String, Parameter>,
    result: Parameter,
    validator: ParamValidator,
    schema_doc: Value,
    handler: Arc<dyn ActivityHandler>,
    debug_handler: Option<Arc<dyn DebugHandler>>,
    default_exception_kind: ExceptionKind,
    clock: Arc<dyn Clock>,
    task_list: String,
    log: Arc<dyn Fn(&str) + Send + Sync>,
}

impl ActivityWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: WorkerConfig,
        parameters: IndexMap<String, Parameter>,
        result: Parameter,
        handler: Arc<dyn ActivityHandler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let task_list = format!("{}{}", config.activity_name, config.activity_version);
        let schema_doc = serde_json::json!({
            "description": config.description,
            "params": Parameter::object(ff_schema::ParamSpec::optional(""), parameters.clone()).to_schema(false),
            "result": result.to_schema(false),
        });
        let validator = ParamValidator::new(parameters.clone());

        Self {
            config,
            parameters,
            result,
            validator,
            schema_doc,
            handler,
            debug_handler: None,
            default_exception_kind: ExceptionKind::Failed,
            clock,
            task_list,
            log: Arc::new(|message: &str| tracing::info!("{message}")),
        }
    }

    pub fn with_debug_handler(mut self, handler: Arc<dyn DebugHandler>) -> Self {
        self.debug_handler = Some(handler);
        self
    }

    pub fn with_default_exception_kind(mut self, kind: ExceptionKind) -> Self {
        self.default_exception_kind = kind;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn Fn(&str) + Send + Sync>) -> Self {
        self.log = log;
        self
    }

    /// Long-poll once, and if a task was waiting, process it fully.
    /// Returns `Ok(None)` when the poll came back empty.
    #[instrument(skip(self, queue, blob_store))]
    pub async fn run_once(
        &self,
        queue: &dyn TaskQueue,
        blob_store: &dyn BlobStore,
    ) -> Result<Option<RunOutcome>, WorkerError> {
        let Some(task) = queue.poll(&self.config.domain, &self.task_list).await? else {
            (self.log)(&format!("No work to be done for {}/{}", self.config.domain, self.task_list));
            return Ok(None);
        };

        (self.log)(&format!("task {}", task.task_token));
        let decoded = ff_codec::receive(&task.input, blob_store).await?;
        let event: Value = serde_json::from_str(&decoded)?;

        self.handle(&task.task_token, event, queue, blob_store).await.map(Some)
    }

    #[instrument(skip(self, event, queue, blob_store))]
    async fn handle(
        &self,
        token: &TaskToken,
        event: Value,
        queue: &dyn TaskQueue,
        blob_store: &dyn BlobStore,
    ) -> Result<RunOutcome, WorkerError> {
        let Some(object) = event.as_object() else {
            let exception = ActivityException::validation("event is not a JSON object");
            if self.config.disable_protocol {
                return Err(WorkerError::Disabled(exception));
            }
            return self.fail(token, &exception, queue, blob_store).await;
        };

        if object.contains_key("LOG_INPUT") {
            (self.log)(&serde_json::to_string_pretty(&event).unwrap_or_default());
        }

        if object.contains_key("LOG_CONTEXT") {
            (self.log)("(no orchestrator context carried by this worker)");
        }

        if object.contains_key("RETURN_SCHEMA") {
            return Ok(RunOutcome::Schema(self.schema_doc.clone()));
        }

        let disable_protocol = object
            .get("DISABLE_PROTOCOL")
            .map(truthy)
            .unwrap_or(self.config.disable_protocol);

        let validation_errors = self.validator.validate(&event);
        if !validation_errors.is_empty() {
            tracing::warn!(count = validation_errors.len(), "event failed schema validation");
            if disable_protocol {
                let exception = ActivityException::validation("event failed schema validation");
                return Err(WorkerError::Disabled(exception));
            }
            let response = ActivityResponse::new(ActivityStatus::Invalid).with_validation_errors(validation_errors);
            return self.fail_with_response(token, response, false, queue, blob_store).await;
        }

        match self.run_handler(&event, object.contains_key("DEBUG_MODE")).await {
            Ok(output) => {
                if disable_protocol {
                    return Ok(RunOutcome::Disabled(output.result));
                }
                self.succeed(token, output, queue, blob_store).await
            }
            Err(exception) => {
                if disable_protocol {
                    return Err(WorkerError::Disabled(exception));
                }
                self.fail(token, &exception, queue, blob_store).await
            }
        }
    }

    async fn run_handler(&self, event: &Value, debug_mode: bool) -> Result<HandlerOutput, ActivityException> {
        let params = self.parse_params(event)?;

        let output = if debug_mode {
            let handler = self
                .debug_handler
                .as_ref()
                .ok_or_else(|| ActivityException::fatal("DEBUG_MODE requested but no debug handler is configured"))?;
            let debug_mode_value = event.get("DEBUG_MODE").cloned().unwrap_or(Value::Null);
            handler.handle(debug_mode_value, params).await?
        } else {
            self.handler.handle(params).await?
        };

        let parsed = self
            .result
            .parse(Some(&output.result), "Parsing result:", &self.clock)
            .map_err(|e| ActivityException::wrap(self.default_exception_kind, "unhandled exception", e))?;
        let result = parsed.map(|v| v.into_json()).unwrap_or(Value::Null);
        Ok(HandlerOutput::with_notes(result, output.notes))
    }

    fn parse_params(&self, event: &Value) -> Result<FunctionParams, ActivityException> {
        let mut params = FunctionParams::default();
        for (name, param) in &self.parameters {
            let value = event.get(name);
            let parsed = param.parse(value, name, &self.clock).map_err(|e| {
                ActivityException::wrap(ExceptionKind::Validation, format!("Error parsing parameter '{name}'"), e)
            })?;
            if let Some(resolved) = parsed {
                params.insert(camel_to_snake(name), resolved.into_json());
            }
        }
        Ok(params)
    }

    async fn succeed(
        &self,
        token: &TaskToken,
        output: HandlerOutput,
        queue: &dyn TaskQueue,
        blob_store: &dyn BlobStore,
    ) -> Result<RunOutcome, WorkerError> {
        let response = ActivityResponse::new(ActivityStatus::Success)
            .with_result(output.result)
            .with_notes(output.notes);
        let text = self.serialize(&response, blob_store).await?;
        queue.complete(token, &text).await?;
        Ok(RunOutcome::Completed(text))
    }

    async fn fail(
        &self,
        token: &TaskToken,
        exception: &ActivityException,
        queue: &dyn TaskQueue,
        blob_store: &dyn BlobStore,
    ) -> Result<RunOutcome, WorkerError> {
        let message = exception.message();
        let response = ActivityResponse::new(exception.response_code())
            .with_notes(exception.notes().to_vec())
            .with_trace(exception.trace())
            .with_result(Value::String(message.clone()))
            .with_reason(message);
        self.fail_with_response(token, response, exception.retry(), queue, blob_store).await
    }

    async fn fail_with_response(
        &self,
        token: &TaskToken,
        response: ActivityResponse,
        retry: bool,
        queue: &dyn TaskQueue,
        blob_store: &dyn BlobStore,
    ) -> Result<RunOutcome, WorkerError> {
        let text = self.serialize(&response, blob_store).await?;
        if retry {
            queue.cancel(token, &text).await?;
            Ok(RunOutcome::Cancelled(text))
        } else {
            let reason: String = response.reason.clone().unwrap_or_default().chars().take(256).collect();
            queue.fail(token, &reason, &text).await?;
            Ok(RunOutcome::Failed(text))
        }
    }

    async fn serialize(&self, response: &ActivityResponse, blob_store: &dyn BlobStore) -> Result<String, WorkerError> {
        let text = response.serialize();
        let delivered = ff_codec::deliver(&text, self.config.size_limit, &self.config.blob_bucket, blob_store).await?;
        Ok(delivered)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
