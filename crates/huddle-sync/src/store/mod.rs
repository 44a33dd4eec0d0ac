//! Remote document store abstraction.
//!
//! The store holds one JSON document and has no merge logic of its own.
//! It offers two operations:
//!
//! - [`RemoteStore::subscribe`]: a live stream of the document's full value.
//!   Stores that already hold a document emit it first. A store whose
//!   document does not exist yet simply emits nothing. Dropping the stream
//!   unsubscribes.
//! - [`RemoteStore::save`]: upsert the full document. A client's own write is
//!   echoed back to its subscription like any other change.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::stream::BoxStream;

/// Live stream of full document values.
pub type SnapshotStream = BoxStream<Value>;

/// A key-value document service holding the shared document.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Subscribe to document changes.
    async fn subscribe(&self) -> StoreResult<SnapshotStream>;

    /// Replace the stored document.
    async fn save(&self, document: Value) -> StoreResult<()>;
}
