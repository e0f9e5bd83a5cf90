//! Read and delete access to stored pictures.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::error::{MatrixError, MatrixResult};
use crate::events::{EventEmitter, LibraryEvent};
use crate::store::PictureStore;
use crate::utils::now_millis;

/// Public description of one stored picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureInfo {
    /// Preview URL.
    pub url: String,
    pub name: String,
    pub animated: bool,
    pub frame_count: u32,
}

pub struct LibraryService {
    store: Arc<dyn PictureStore>,
    emitter: Arc<dyn EventEmitter>,
    image_dir: PathBuf,
    base_url: String,
}

impl LibraryService {
    pub fn new(
        store: Arc<dyn PictureStore>,
        emitter: Arc<dyn EventEmitter>,
        image_dir: PathBuf,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            store,
            emitter,
            image_dir,
            base_url,
        }
    }

    pub async fn list_ids(&self) -> MatrixResult<Vec<String>> {
        Ok(self.store.list_ids().await?)
    }

    /// Picks one stored id at random.
    pub async fn random_id(&self) -> MatrixResult<String> {
        let ids = self.store.list_ids().await?;
        ids.choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| MatrixError::NotFound("library is empty".into()))
    }

    pub async fn describe(&self, id: &str) -> MatrixResult<PictureInfo> {
        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| MatrixError::NotFound(id.to_string()))?;

        Ok(PictureInfo {
            url: format!("{}pictures/{}.png", self.base_url, record.id),
            name: record.display_name,
            animated: record.animated,
            frame_count: record.frame_count,
        })
    }

    /// Deletes the record, then its preview file.
    ///
    /// A record without a preview is still deleted, but the missing file is
    /// reported as a storage error.
    pub async fn delete(&self, id: &str) -> MatrixResult<()> {
        if self.store.delete_by_id(id).await?.is_none() {
            return Err(MatrixError::NotFound(id.to_string()));
        }
        self.emitter.emit_library(LibraryEvent::PictureRemoved {
            picture_id: id.to_string(),
            timestamp: now_millis(),
        });
        log::info!("[Library] Deleted record {id}");

        let preview = self.image_dir.join(format!("{id}.png"));
        match tokio::fs::remove_file(&preview).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(MatrixError::Storage(format!(
                "preview for {id} was already missing"
            ))),
            Err(e) => Err(MatrixError::Storage(format!(
                "failed to delete preview for {id}: {e}"
            ))),
        }
    }
}
