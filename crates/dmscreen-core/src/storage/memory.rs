//! In-memory storage implementation.

use super::{BoxFuture, Collection, Storage, StorageError, StorageResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<(Collection, String), Value>>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", err))
}

impl Storage for MemoryStorage {
    fn save(
        &self,
        collection: Collection,
        id: &str,
        value: &Value,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let key = (collection, id.to_string());
        let value = value.clone();
        Box::pin(async move {
            let mut records = self.records.write().map_err(lock_error)?;
            records.insert(key, value);
            Ok(())
        })
    }

    fn load(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<Value>> {
        let key = (collection, id.to_string());
        Box::pin(async move {
            let records = self.records.read().map_err(lock_error)?;
            records
                .get(&key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(format!("{}/{}", key.0, key.1)))
        })
    }

    fn delete(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = (collection, id.to_string());
        Box::pin(async move {
            let mut records = self.records.write().map_err(lock_error)?;
            records.remove(&key);
            Ok(())
        })
    }

    fn list(&self, collection: Collection) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let records = self.records.read().map_err(lock_error)?;
            Ok(records
                .keys()
                .filter(|(c, _)| *c == collection)
                .map(|(_, id)| id.clone())
                .collect())
        })
    }

    fn exists(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let key = (collection, id.to_string());
        Box::pin(async move {
            let records = self.records.read().map_err(lock_error)?;
            Ok(records.contains_key(&key))
        })
    }

    fn write_blob(&self, name: &str, bytes: Vec<u8>) -> BoxFuture<'_, StorageResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            let mut blobs = self.blobs.write().map_err(lock_error)?;
            blobs.insert(name, bytes);
            Ok(())
        })
    }

    fn read_blob(&self, name: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>> {
        let name = name.to_string();
        Box::pin(async move {
            let blobs = self.blobs.read().map_err(lock_error)?;
            blobs.get(&name).cloned().ok_or(StorageError::NotFound(name))
        })
    }

    fn delete_blob(&self, name: &str) -> BoxFuture<'_, StorageResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            let mut blobs = self.blobs.write().map_err(lock_error)?;
            blobs.remove(&name);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_util::block_on;
    use serde_json::json;

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let value = json!({ "id": "n1", "title": "Loot" });

        block_on(storage.save(Collection::Notes, "n1", &value)).unwrap();
        let loaded = block_on(storage.load(Collection::Notes, "n1")).unwrap();

        assert_eq!(loaded, value);
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryStorage::new();
        let result = block_on(storage.load(Collection::Notes, "nonexistent"));

        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_collections_are_separate() {
        let storage = MemoryStorage::new();
        block_on(storage.save(Collection::Notes, "x", &json!(1))).unwrap();

        assert!(block_on(storage.exists(Collection::Notes, "x")).unwrap());
        assert!(!block_on(storage.exists(Collection::Statblocks, "x")).unwrap());
        assert!(block_on(storage.list(Collection::Statblocks)).unwrap().is_empty());
    }

    #[test]
    fn test_delete() {
        let storage = MemoryStorage::new();

        block_on(storage.save(Collection::Scenes, "s", &json!({}))).unwrap();
        block_on(storage.delete(Collection::Scenes, "s")).unwrap();
        assert!(!block_on(storage.exists(Collection::Scenes, "s")).unwrap());
        // Deleting again is fine.
        block_on(storage.delete(Collection::Scenes, "s")).unwrap();
    }

    #[test]
    fn test_list() {
        let storage = MemoryStorage::new();

        block_on(storage.save(Collection::Nodes, "node1", &json!({}))).unwrap();
        block_on(storage.save(Collection::Nodes, "node2", &json!({}))).unwrap();

        let list = block_on(storage.list(Collection::Nodes)).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&"node1".to_string()));
        assert!(list.contains(&"node2".to_string()));
    }

    #[test]
    fn test_blobs() {
        let storage = MemoryStorage::new();
        block_on(storage.write_blob("a.mp3", vec![1, 2, 3])).unwrap();
        assert_eq!(block_on(storage.read_blob("a.mp3")).unwrap(), vec![1, 2, 3]);

        block_on(storage.delete_blob("a.mp3")).unwrap();
        assert!(matches!(
            block_on(storage.read_blob("a.mp3")),
            Err(StorageError::NotFound(_))
        ));
    }
}
