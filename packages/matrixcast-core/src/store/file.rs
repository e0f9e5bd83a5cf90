use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::{PictureRecord, PictureStore, StoreError};

const RECORDS_DIR: &str = "pictures";
const RECORD_EXT: &str = "json";

/// Record store keeping one `<id>.json` file per picture.
///
/// Saves go through a temp file and a rename so a crash never leaves a
/// half-written record. All file operations are serialized by one async
/// lock, and none of them block a runtime worker.
#[derive(Debug)]
pub struct JsonFilePictureStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonFilePictureStore {
    /// Opens (and creates if needed) the store under `data_dir/pictures`.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let root = data_dir.join(RECORDS_DIR);
        std::fs::create_dir_all(&root)?;
        log::info!("[Store] Using record directory {}", root.display());
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    /// Path for a record id, or `None` if the id cannot name a file here.
    fn record_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.root.join(format!("{id}.{RECORD_EXT}")))
    }

    async fn read_record(path: &Path) -> Result<Option<PictureRecord>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PictureStore for JsonFilePictureStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<PictureRecord>, StoreError> {
        let Some(path) = self.record_path(id) else {
            return Ok(None);
        };
        let _guard = self.lock.lock().await;
        Self::read_record(&path).await
    }

    async fn save(&self, record: PictureRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.id).ok_or_else(|| {
            std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid record id {:?}", record.id),
            )
        })?;
        let contents = serde_json::to_string(&record)?;

        let _guard = self.lock.lock().await;
        if fs::try_exists(&path).await? {
            return Err(StoreError::DuplicateKey(record.id));
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, contents).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        log::debug!("[Store] Saved record {}", record.id);
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<PictureRecord>, StoreError> {
        let Some(path) = self.record_path(id) else {
            return Ok(None);
        };
        let _guard = self.lock.lock().await;

        let Some(record) = Self::read_record(&path).await? else {
            return Ok(None);
        };
        fs::remove_file(&path).await?;
        log::debug!("[Store] Deleted record {id}");
        Ok(Some(record))
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
