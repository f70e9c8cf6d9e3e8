//! Runnable demo of one `ff-worker` step wired to the in-memory task queue
//! and blob store, driving the scenarios spec'd for the protocol.
//!
//! Usage:
//!   $ activity-worker-demo success
//!   $ activity-worker-demo validation-failure
//!   $ activity-worker-demo fatal
//!   $ activity-worker-demo retryable

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use ff_queue::{InMemoryBlobStore, InMemoryTaskQueue};
use ff_schema::{FunctionParams, Parameter, ParamSpec};
use ff_timeline::SystemClock;
use ff_worker::{ActivityException, ActivityHandler, ActivityWorker, HandlerOutput, RunOutcome, WorkerConfig};
use indexmap::IndexMap;
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "activity-worker-demo",
    version = env!("CARGO_PKG_VERSION"),
    about = "Drives one activity-worker step against an in-memory task queue"
)]
struct Cli {
    #[command(subcommand)]
    command: Scenario,
}

#[derive(Subcommand)]
enum Scenario {
    /// A single task that completes successfully.
    Success,
    /// A task whose input fails schema validation.
    ValidationFailure,
    /// A task whose handler raises a non-retryable error.
    Fatal,
    /// A task whose handler raises a retryable error.
    Retryable,
}

/// Echoes the declared `stuff` parameter back as the result, or raises the
/// exception a scenario asked for.
struct DemoHandler {
    fail_as: Option<fn(&str) -> ActivityException>,
}

#[async_trait]
impl ActivityHandler for DemoHandler {
    async fn handle(&self, params: FunctionParams) -> Result<HandlerOutput, ActivityException> {
        if let Some(fail_as) = self.fail_as {
            return Err(fail_as("loud noises!"));
        }
        let stuff = params.get_or("stuff", json!(""));
        Ok(HandlerOutput::new(stuff))
    }
}

fn build_worker(fail_as: Option<fn(&str) -> ActivityException>) -> ActivityWorker {
    let mut parameters = IndexMap::new();
    parameters.insert("stuff".to_string(), Parameter::string(ParamSpec::required("some stuff")));

    let config = WorkerConfig {
        description: "demo echo activity".to_string(),
        region: "us-east-1".to_string(),
        activity_name: "Demo".to_string(),
        activity_version: "1.0".to_string(),
        domain: "demo-domain".to_string(),
        disable_protocol: false,
        size_limit: ff_codec::DEFAULT_SIZE_LIMIT,
        blob_bucket: "demo-bucket".to_string(),
    };

    ActivityWorker::new(
        config,
        parameters,
        Parameter::string(ParamSpec::optional("some result")),
        Arc::new(DemoHandler { fail_as }),
        Arc::new(SystemClock),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let cli = Cli::parse();
    let queue = InMemoryTaskQueue::new();
    let blobs = InMemoryBlobStore::new();

    let worker = match cli.command {
        Scenario::Success => {
            queue.push("T", r#"{"stuff":"things"}"#);
            build_worker(None)
        }
        Scenario::ValidationFailure => {
            queue.push("T", r#"{"stuff":1}"#);
            build_worker(None)
        }
        Scenario::Fatal => {
            queue.push("T", r#"{"stuff":"things"}"#);
            build_worker(Some(|msg| ActivityException::fatal(msg)))
        }
        Scenario::Retryable => {
            queue.push("T", r#"{"stuff":"things"}"#);
            build_worker(Some(|msg| ActivityException::failed(msg)))
        }
    };

    let outcome = worker.run_once(&queue, &blobs).await?;
    match outcome {
        Some(RunOutcome::Completed(body)) => println!("completed: {body}"),
        Some(RunOutcome::Cancelled(body)) => println!("cancelled (retry): {body}"),
        Some(RunOutcome::Failed(body)) => println!("failed (no retry): {body}"),
        Some(RunOutcome::Schema(schema)) => println!("schema: {schema}"),
        Some(RunOutcome::Disabled(value)) => println!("raw result: {value}"),
        None => println!("no work to be done"),
    }

    for outcome in queue.outcomes() {
        tracing::info!(?outcome, "recorded queue outcome");
    }

    Ok(())
}
