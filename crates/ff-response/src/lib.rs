//! **ff-response** – the canonical activity outcome envelope: status
//! taxonomy, a lossless JSON round-trip, and the `ActivityResult` extension
//! point for payloads that need post-processing before being handed to a
//! handler's caller (e.g. a decrypting result wrapper).

use ff_schema::ValidationErrorRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// SWF-style outcome category. Each status maps to exactly one retry
/// disposition (see [`ActivityStatus::retry_disposition`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityStatus {
    /// Complete channel.
    Success,
    /// Fail channel: retrying without fixing the input won't help.
    Invalid,
    /// Fail channel: retrying with the current input won't help.
    Fatal,
    /// Cancel channel: a retry might work.
    Failed,
    /// Cancel channel: an error was encountered, a retry might work.
    Error,
    /// Cancel channel: result isn't available yet, retry.
    Defer,
    /// A cached result is still pending computation.
    CachedResultPending,
    /// Uncategorized.
    Unknown,
}

/// What the task queue should be told to do with this outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Complete,
    Fail,
    Cancel,
}

impl ActivityStatus {
    pub fn retry_disposition(self) -> RetryDisposition {
        match self {
            ActivityStatus::Success => RetryDisposition::Complete,
            ActivityStatus::Invalid | ActivityStatus::Fatal => RetryDisposition::Fail,
            ActivityStatus::Failed | ActivityStatus::Error | ActivityStatus::Defer => RetryDisposition::Cancel,
            ActivityStatus::CachedResultPending | ActivityStatus::Unknown => RetryDisposition::Cancel,
        }
    }

    fn as_wire(self) -> &'static str {
        match self {
            ActivityStatus::Success => "SUCCESS",
            ActivityStatus::Invalid => "INVALID",
            ActivityStatus::Fatal => "FATAL",
            ActivityStatus::Failed => "FAILED",
            ActivityStatus::Error => "ERROR",
            ActivityStatus::Defer => "DEFER",
            ActivityStatus::CachedResultPending => "CACHED_RESULT_PENDING",
            ActivityStatus::Unknown => "UNKNOWN",
        }
    }

    fn from_wire(s: &str) -> Self {
        match s {
            "SUCCESS" => ActivityStatus::Success,
            "INVALID" => ActivityStatus::Invalid,
            "FATAL" => ActivityStatus::Fatal,
            "FAILED" => ActivityStatus::Failed,
            "ERROR" => ActivityStatus::Error,
            "DEFER" => ActivityStatus::Defer,
            "CACHED_RESULT_PENDING" => ActivityStatus::CachedResultPending,
            _ => ActivityStatus::Unknown,
        }
    }
}

/// Extension point for a result payload that needs a post-processing step
/// before being exposed to a response's caller. The reference
/// implementation uses this for an (unimplemented) encrypted-result
/// variant; plain results are the common case.
pub trait ActivityResult: std::fmt::Debug {
    fn result(&self) -> Value;
}

#[derive(Debug, Clone)]
struct PlainResult(Value);

impl ActivityResult for PlainResult {
    fn result(&self) -> Value {
        self.0.clone()
    }
}

/// Optional cache/provenance metadata attached to a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheInfo {
    pub key: String,
    pub cached: String,
    pub expires: String,
    pub run_id: Option<String>,
    pub workflow_id: Option<String>,
    pub section_name: Option<String>,
}

/// Failures building or parsing an [`ActivityResponse`].
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("Invalid Response Format! (not an object)")]
    NotAnObject,
    #[error("Invalid Response Format! (no status)")]
    MissingStatus,
}

/// The canonical outcome envelope reported back to the task queue.
#[derive(Debug)]
pub struct ActivityResponse {
    pub status: ActivityStatus,
    activity_result: Option<Box<dyn ActivityResult>>,
    pub notes: Vec<String>,
    pub trace: Vec<String>,
    pub reason: Option<String>,
    pub validation_errors: Option<Vec<ValidationErrorRecord>>,
    pub cache: Option<CacheInfo>,
    pub instance: Option<String>,
}

impl ActivityResponse {
    pub fn new(status: ActivityStatus) -> Self {
        Self {
            status,
            activity_result: None,
            notes: Vec::new(),
            trace: Vec::new(),
            reason: None,
            validation_errors: None,
            cache: None,
            instance: None,
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.activity_result = Some(Box::new(PlainResult(result)));
        self
    }

    pub fn with_activity_result(mut self, result: Box<dyn ActivityResult>) -> Self {
        self.activity_result = Some(result);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_validation_errors(mut self, errors: Vec<ValidationErrorRecord>) -> Self {
        self.validation_errors = Some(errors);
        self
    }

    /// The unwrapped result value, if present.
    pub fn result(&self) -> Option<Value> {
        self.activity_result.as_ref().map(|r| r.result())
    }

    /// Emit the fixed `{status, [result], notes, trace, reason}` shape, plus
    /// whichever optional blocks are present.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("status".to_string(), Value::String(self.status.as_wire().to_string()));
        if let Some(result) = self.result() {
            out.insert("result".to_string(), result);
        }
        out.insert("notes".to_string(), serde_json::to_value(&self.notes).unwrap());
        out.insert("trace".to_string(), serde_json::to_value(&self.trace).unwrap());
        out.insert(
            "reason".to_string(),
            self.reason.clone().map(Value::String).unwrap_or(Value::Null),
        );

        if let Some(cache) = &self.cache {
            out.insert(
                "cache".to_string(),
                serde_json::json!({
                    "key": cache.key,
                    "cached": cache.cached,
                    "expires": cache.expires,
                    "runId": cache.run_id,
                    "workflowId": cache.workflow_id,
                    "sectionName": cache.section_name,
                }),
            );
        }

        if let Some(instance) = &self.instance {
            out.insert("instance".to_string(), Value::String(instance.clone()));
        }

        if let Some(errors) = &self.validation_errors {
            out.insert("validation_errors".to_string(), serde_json::to_value(errors).unwrap());
        }

        Value::Object(out)
    }

    pub fn serialize(&self) -> String {
        self.to_json().to_string()
    }

    /// Rebuild a response from its JSON form. `validation_errors` is
    /// round-tripped opaquely (as raw JSON-sourced records), matching the
    /// original's pass-through of whatever the caller stored there.
    pub fn from_json(obj: &Value) -> Result<Self, ResponseError> {
        let obj = obj.as_object().ok_or(ResponseError::NotAnObject)?;
        let status = obj.get("status").and_then(Value::as_str).ok_or(ResponseError::MissingStatus)?;

        let mut response = ActivityResponse::new(ActivityStatus::from_wire(status));

        if let Some(result) = obj.get("result") {
            response.activity_result = Some(Box::new(PlainResult(result.clone())));
        }

        response.notes = obj
            .get("notes")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        response.trace = obj
            .get("trace")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        response.reason = obj.get("reason").and_then(Value::as_str).map(str::to_string);
        response.instance = obj.get("instance").and_then(Value::as_str).map(str::to_string);

        if let Some(errors) = obj.get("validation_errors") {
            if let Ok(parsed) = serde_json::from_value::<Vec<ValidationErrorRecord>>(errors.clone()) {
                response.validation_errors = Some(parsed);
            }
        }

        if let Some(cache) = obj.get("cache").and_then(Value::as_object) {
            response.cache = Some(CacheInfo {
                key: cache.get("key").and_then(Value::as_str).unwrap_or_default().to_string(),
                cached: cache.get("cached").and_then(Value::as_str).unwrap_or_default().to_string(),
                expires: cache.get("expires").and_then(Value::as_str).unwrap_or_default().to_string(),
                run_id: cache.get("runId").and_then(Value::as_str).map(str::to_string),
                workflow_id: cache.get("workflowId").and_then(Value::as_str).map(str::to_string),
                section_name: cache.get("sectionName").and_then(Value::as_str).map(str::to_string),
            });
        }

        Ok(response)
    }
}
