//! **ff-queue** – the long-poll task-queue abstraction the worker polls
//! against, plus in-memory doubles of it and `ff-codec`'s `BlobStore` for
//! tests and the demo binary.

pub mod blob;
pub mod queue;

pub use blob::InMemoryBlobStore;
pub use queue::{ActivityName, InMemoryTaskQueue, RecordedOutcome, Task, TaskQueue, TaskQueueError, TaskToken};
