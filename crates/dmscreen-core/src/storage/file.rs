//! File-based storage implementation.

use super::{BoxFuture, Collection, Storage, StorageError, StorageResult};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// File-based storage.
///
/// Stores each record as `<base>/<collection>/<id>.json` and blobs under
/// `<base>/blobs/`.
pub struct FileStorage {
    /// Base directory for record storage.
    base_path: PathBuf,
}

/// Make an id safe to use as a file name.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

fn ensure_dir(path: &Path) -> StorageResult<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            StorageError::Io(format!("Failed to create {}: {}", path.display(), e))
        })?;
    }
    Ok(())
}

impl FileStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        ensure_dir(&base_path)?;
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Linux: `~/.local/share/dm-screen/`
    /// On Windows: `%LOCALAPPDATA%\dm-screen\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("dm-screen"))
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.base_path.join(collection.as_str())
    }

    /// Get the file path for a record.
    fn record_path(&self, collection: Collection, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", sanitize(id)))
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.base_path.join("blobs").join(sanitize(name))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

impl Storage for FileStorage {
    fn save(
        &self,
        collection: Collection,
        id: &str,
        value: &Value,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let dir = self.collection_dir(collection);
        let path = self.record_path(collection, id);
        let json = match serde_json::to_string_pretty(value) {
            Ok(j) => j,
            Err(e) => return Box::pin(async move { Err(StorageError::from(e)) }),
        };

        Box::pin(async move {
            ensure_dir(&dir)?;
            fs::write(&path, json).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
            })
        })
    }

    fn load(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<Value>> {
        let path = self.record_path(collection, id);
        let key = format!("{}/{}", collection, id);

        Box::pin(async move {
            if !path.exists() {
                return Err(StorageError::NotFound(key));
            }

            let json = fs::read_to_string(&path).map_err(|e| {
                StorageError::Io(format!("Failed to read {}: {}", path.display(), e))
            })?;

            serde_json::from_str(&json).map_err(|e| {
                StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
            })
        })
    }

    fn delete(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(collection, id);

        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn list(&self, collection: Collection) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let dir = self.collection_dir(collection);

        Box::pin(async move {
            if !dir.exists() {
                return Ok(vec![]);
            }

            let entries = fs::read_dir(&dir).map_err(|e| {
                StorageError::Io(format!("Failed to read directory {}: {}", dir.display(), e))
            })?;

            let mut ids = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ids.push(stem.to_string());
                    }
                }
            }
            Ok(ids)
        })
    }

    fn exists(&self, collection: Collection, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.record_path(collection, id);
        Box::pin(async move { Ok(path.exists()) })
    }

    fn write_blob(&self, name: &str, bytes: Vec<u8>) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.blob_path(name);
        let dir = self.base_path.join("blobs");

        Box::pin(async move {
            ensure_dir(&dir)?;
            fs::write(&path, bytes).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
            })
        })
    }

    fn read_blob(&self, name: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>> {
        let path = self.blob_path(name);
        let name = name.to_string();

        Box::pin(async move {
            if !path.exists() {
                return Err(StorageError::NotFound(name));
            }
            fs::read(&path).map_err(|e| {
                StorageError::Io(format!("Failed to read {}: {}", path.display(), e))
            })
        })
    }

    fn delete_blob(&self, name: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.blob_path(name);

        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_util::block_on;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_save_load() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        let value = json!({ "id": "scene-1", "name": "Dungeon" });
        block_on(storage.save(Collection::Scenes, "scene-1", &value)).unwrap();
        let loaded = block_on(storage.load(Collection::Scenes, "scene-1")).unwrap();

        assert_eq!(loaded["name"], "Dungeon");
        assert!(dir.path().join("scenes").join("scene-1.json").exists());
    }

    #[test]
    fn test_file_storage_not_found() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        let result = block_on(storage.load(Collection::Notes, "nonexistent"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_file_storage_list() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        block_on(storage.save(Collection::Notes, "doc1", &json!({}))).unwrap();
        block_on(storage.save(Collection::Notes, "doc2", &json!({}))).unwrap();
        block_on(storage.save(Collection::Statblocks, "other", &json!({}))).unwrap();

        let list = block_on(storage.list(Collection::Notes)).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&"doc1".to_string()));
        assert!(list.contains(&"doc2".to_string()));

        assert!(block_on(storage.list(Collection::MidiMappings)).unwrap().is_empty());
    }

    #[test]
    fn test_file_storage_delete() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        block_on(storage.save(Collection::Nodes, "test", &json!({}))).unwrap();
        assert!(block_on(storage.exists(Collection::Nodes, "test")).unwrap());

        block_on(storage.delete(Collection::Nodes, "test")).unwrap();
        assert!(!block_on(storage.exists(Collection::Nodes, "test")).unwrap());
    }

    #[test]
    fn test_file_storage_sanitizes_id() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        block_on(storage.save(Collection::Notes, "../escape/doc:with*special", &json!(7))).unwrap();

        let loaded = block_on(storage.load(Collection::Notes, "../escape/doc:with*special")).unwrap();
        assert_eq!(loaded, json!(7));
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn test_file_storage_blobs() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        block_on(storage.write_blob("abc.ogg", vec![9, 8, 7])).unwrap();
        assert_eq!(block_on(storage.read_blob("abc.ogg")).unwrap(), vec![9, 8, 7]);
        assert!(dir.path().join("blobs").join("abc.ogg").exists());

        block_on(storage.delete_blob("abc.ogg")).unwrap();
        assert!(matches!(
            block_on(storage.read_blob("abc.ogg")),
            Err(StorageError::NotFound(_))
        ));
    }
}
