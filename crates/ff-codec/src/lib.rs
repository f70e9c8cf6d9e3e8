//! **ff-codec** – the size-limit wire codec sitting between a worker and
//! the task queue: payloads over the orchestrator's per-payload ceiling are
//! deflate+base64'd, and if that's still too big, parked in a blob store
//! behind a `FF-URL:` pointer.

pub mod blob_store;
pub mod codec;

pub use blob_store::{BlobStore, BlobStoreError};
pub use codec::{deliver, receive, CodecError, DEFAULT_SIZE_LIMIT};
