//! Storage abstraction for persistence.

mod file;
mod gateway;
mod memory;
mod queue;
mod records;

pub use file::FileStorage;
pub use gateway::SceneGateway;
pub use memory::MemoryStorage;
pub use queue::{FlushReport, WriteJob, WriteQueue, flush};
pub use records::{Record, delete_record, list_records, load_record, save_record};

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Groups of records. Ids are unique within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Scenes,
    Nodes,
    Notes,
    Statblocks,
    AudioFiles,
    AudioScenes,
    Initiative,
    MidiMappings,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Scenes,
        Collection::Nodes,
        Collection::Notes,
        Collection::Statblocks,
        Collection::AudioFiles,
        Collection::AudioScenes,
        Collection::Initiative,
        Collection::MidiMappings,
    ];

    /// Directory / namespace name of the collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Scenes => "scenes",
            Collection::Nodes => "nodes",
            Collection::Notes => "notes",
            Collection::Statblocks => "statblocks",
            Collection::AudioFiles => "audio-files",
            Collection::AudioScenes => "audio-scenes",
            Collection::Initiative => "initiative",
            Collection::MidiMappings => "midi-mappings",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for record storage backends.
///
/// Records are JSON values keyed by collection and id. Uploaded audio is kept
/// as opaque blobs keyed by filename.
pub trait Storage: Send + Sync {
    /// Save a record, replacing any existing one.
    fn save(&self, collection: Collection, id: &str, value: &Value)
    -> BoxFuture<'_, StorageResult<()>>;

    /// Load a record.
    fn load(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<Value>>;

    /// Delete a record. Deleting a missing record is not an error.
    fn delete(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all record ids in a collection.
    fn list(&self, collection: Collection) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a record exists.
    fn exists(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<bool>>;

    /// Store a blob.
    fn write_blob(&self, name: &str, bytes: Vec<u8>) -> BoxFuture<'_, StorageResult<()>>;

    /// Read a blob.
    fn read_blob(&self, name: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>>;

    /// Delete a blob. Deleting a missing blob is not an error.
    fn delete_blob(&self, name: &str) -> BoxFuture<'_, StorageResult<()>>;
}

#[cfg(test)]
pub(crate) mod test_util {
    /// Minimal executor for the storage futures, which never actually suspend.
    pub fn block_on<F: std::future::Future>(f: F) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn dummy_raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                dummy_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        loop {
            match f.as_mut().poll(&mut cx) {
                Poll::Ready(result) => return result,
                Poll::Pending => {}
            }
        }
    }
}
