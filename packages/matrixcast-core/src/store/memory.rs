use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{PictureRecord, PictureStore, StoreError};

/// In-process record store.
#[derive(Debug, Default)]
pub struct MemoryPictureStore {
    records: DashMap<String, PictureRecord>,
}

impl MemoryPictureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PictureStore for MemoryPictureStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<PictureRecord>, StoreError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn save(&self, record: PictureRecord) -> Result<(), StoreError> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<PictureRecord>, StoreError> {
        Ok(self.records.remove(id).map(|(_, record)| record))
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> PictureRecord {
        PictureRecord {
            id: id.into(),
            display_name: format!("{id}.png"),
            animated: false,
            frame_count: 1,
            fragments: vec![],
        }
    }

    #[tokio::test]
    async fn save_find_delete() {
        let store = MemoryPictureStore::new();
        store.save(record("b")).await.unwrap();
        store.save(record("a")).await.unwrap();

        assert_eq!(store.list_ids().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.find_by_id("a").await.unwrap(), Some(record("a")));

        assert!(store.delete_by_id("a").await.unwrap().is_some());
        assert!(store.delete_by_id("a").await.unwrap().is_none());
        assert!(store.find_by_id("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = MemoryPictureStore::new();
        store.save(record("a")).await.unwrap();

        let err = store.save(record("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(id) if id == "a"));
    }
}
