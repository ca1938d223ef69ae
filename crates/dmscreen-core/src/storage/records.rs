//! Typed access to the JSON records held by a [`Storage`] backend.

use super::{Collection, Storage, StorageResult};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A type persisted as one record of a collection.
pub trait Record: Serialize + DeserializeOwned + Send {
    /// Collection the record lives in.
    const COLLECTION: Collection;

    /// Id of the record within its collection.
    fn record_id(&self) -> &str;

    /// Bump the record's modification timestamp, if it has one.
    fn touch(&mut self) {}
}

pub async fn save_record<S, R>(storage: &S, record: &R) -> StorageResult<()>
where
    S: Storage + ?Sized,
    R: Record + Sync,
{
    let value = serde_json::to_value(record)?;
    storage.save(R::COLLECTION, record.record_id(), &value).await
}

pub async fn load_record<S, R>(storage: &S, id: &str) -> StorageResult<R>
where
    S: Storage + ?Sized,
    R: Record,
{
    let value = storage.load(R::COLLECTION, id).await?;
    Ok(serde_json::from_value(value)?)
}

/// Load every record of a collection.
///
/// Records that fail to parse are logged and skipped so one bad file does not
/// hide the rest.
pub async fn list_records<S, R>(storage: &S) -> StorageResult<Vec<R>>
where
    S: Storage + ?Sized,
    R: Record,
{
    let ids = storage.list(R::COLLECTION).await?;
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let value = storage.load(R::COLLECTION, &id).await?;
        match serde_json::from_value(value) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping unreadable {} record {}: {}", R::COLLECTION, id, e),
        }
    }
    Ok(records)
}

pub async fn delete_record<S, R>(storage: &S, id: &str) -> StorageResult<()>
where
    S: Storage + ?Sized,
    R: Record,
{
    storage.delete(R::COLLECTION, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Note;
    use crate::storage::test_util::block_on;
    use crate::storage::{MemoryStorage, StorageError};
    use serde_json::json;

    #[test]
    fn test_typed_round_trip() {
        let storage = MemoryStorage::new();
        let mut note = Note::new();
        note.title = "Session 3".to_string();

        block_on(save_record(&storage, &note)).unwrap();
        let loaded: Note = block_on(load_record(&storage, &note.id)).unwrap();
        assert_eq!(loaded.title, "Session 3");

        block_on(delete_record::<_, Note>(&storage, &note.id)).unwrap();
        let missing = block_on(load_record::<_, Note>(&storage, &note.id));
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_list_skips_unreadable_records() {
        let storage = MemoryStorage::new();
        block_on(save_record(&storage, &Note::new())).unwrap();
        block_on(storage.save(Collection::Notes, "broken", &json!({ "nope": true }))).unwrap();

        let notes: Vec<Note> = block_on(list_records(&storage)).unwrap();
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_works_through_trait_object() {
        let storage: Box<dyn Storage> = Box::new(MemoryStorage::new());
        let note = Note::new();
        block_on(save_record(storage.as_ref(), &note)).unwrap();
        let loaded: Note = block_on(load_record(storage.as_ref(), &note.id)).unwrap();
        assert_eq!(loaded.id, note.id);
    }
}
