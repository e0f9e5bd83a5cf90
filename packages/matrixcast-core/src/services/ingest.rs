//! Upload ingestion: raw file → frames → fragments → stored record.
//!
//! Each upload is processed on its own; a failure aborts that file only and
//! leaves no record behind. Decoding and encoding run on the blocking pool,
//! so concurrent uploads never wait on each other.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::codec::{assemble, decode_frames, extract_grid, EncodedAnimation};
use crate::error::{MatrixError, MatrixResult};
use crate::events::{EventEmitter, LibraryEvent};
use crate::store::{PictureRecord, PictureStore};
use crate::transcode::Transcoder;
use crate::utils::{file_extension, now_millis};

/// Geometry and locations used by ingestion.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub width: u32,
    pub height: u32,
    pub max_fragment_elements: usize,
    pub upload_dir: PathBuf,
    pub image_dir: PathBuf,
}

/// Summary of a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedPicture {
    pub id: String,
    pub display_name: String,
    pub animated: bool,
    pub frame_count: u32,
    pub fragment_count: usize,
}

pub struct IngestService {
    store: Arc<dyn PictureStore>,
    transcoder: Arc<dyn Transcoder>,
    emitter: Arc<dyn EventEmitter>,
    settings: IngestSettings,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn PictureStore>,
        transcoder: Arc<dyn Transcoder>,
        emitter: Arc<dyn EventEmitter>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            transcoder,
            emitter,
            settings,
        }
    }

    /// Path of the preview PNG for a picture id.
    #[must_use]
    pub fn preview_path(&self, id: &str) -> PathBuf {
        self.settings.image_dir.join(format!("{id}.png"))
    }

    /// Stores one uploaded file under a fresh id.
    ///
    /// # Errors
    /// [`MatrixError::Decode`] if the bytes are not a supported raster, and
    /// [`MatrixError::Storage`] if a file or the record cannot be written.
    pub async fn ingest(&self, file_name: &str, data: Bytes) -> MatrixResult<IngestedPicture> {
        let id = Uuid::new_v4().to_string();
        let ext = file_extension(file_name).unwrap_or_else(|| "bin".to_string());
        let upload_path = self.settings.upload_dir.join(format!("{id}.{ext}"));

        log::info!(
            "[Ingest] {} ({} bytes) -> {}",
            file_name,
            data.len(),
            id
        );

        tokio::fs::write(&upload_path, &data)
            .await
            .map_err(|e| MatrixError::Storage(format!("failed to write upload: {e}")))?;

        let result = self.process(&id, file_name, &upload_path).await;

        if let Err(e) = tokio::fs::remove_file(&upload_path).await {
            log::warn!(
                "[Ingest] Could not remove temporary upload {}: {}",
                upload_path.display(),
                e
            );
        }

        match &result {
            Ok(picture) => {
                log::info!(
                    "[Ingest] Stored {} ({} frame(s), {} fragment(s))",
                    picture.id,
                    picture.frame_count,
                    picture.fragment_count
                );
                self.emitter.emit_library(LibraryEvent::PictureAdded {
                    picture_id: picture.id.clone(),
                    display_name: picture.display_name.clone(),
                    animated: picture.animated,
                    timestamp: now_millis(),
                });
            }
            Err(e) => log::warn!("[Ingest] {file_name} rejected: {e}"),
        }

        result
    }

    async fn process(
        &self,
        id: &str,
        file_name: &str,
        upload_path: &Path,
    ) -> MatrixResult<IngestedPicture> {
        // Staged under a name reconciliation ignores until the record exists.
        let preview_path = self.preview_path(id);
        let staged_path = self.settings.image_dir.join(format!("{id}.png.tmp"));
        let encoded = {
            let transcoder = Arc::clone(&self.transcoder);
            let settings = self.settings.clone();
            let upload_path = upload_path.to_path_buf();
            let staged_path = staged_path.clone();
            tokio::task::spawn_blocking(move || {
                encode_file(transcoder.as_ref(), &settings, &upload_path, &staged_path)
            })
            .await
            .map_err(|e| MatrixError::Internal(format!("encoder task failed: {e}")))??
        };

        let record = PictureRecord::from_encoded(id, file_name, &encoded)
            .map_err(|e| MatrixError::Internal(format!("failed to serialize fragments: {e}")))?;
        let picture = IngestedPicture {
            id: record.id.clone(),
            display_name: record.display_name.clone(),
            animated: record.animated,
            frame_count: record.frame_count,
            fragment_count: record.fragments.len(),
        };

        if let Err(e) = self.store.save(record).await {
            discard(&staged_path).await;
            return Err(e.into());
        }

        if let Err(e) = tokio::fs::rename(&staged_path, &preview_path).await {
            discard(&staged_path).await;
            if let Err(rm) = self.store.delete_by_id(id).await {
                log::warn!("[Ingest] Could not roll back record {id}: {rm}");
            }
            return Err(MatrixError::Storage(format!(
                "failed to publish preview: {e}"
            )));
        }

        Ok(picture)
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log::warn!("[Ingest] Could not remove {}: {e}", path.display());
    }
}

/// Decodes, resizes and encodes one file, writing the first frame as the
/// preview.
fn encode_file(
    transcoder: &dyn Transcoder,
    settings: &IngestSettings,
    source: &Path,
    preview: &Path,
) -> MatrixResult<EncodedAnimation> {
    let frames: Vec<_> = decode_frames(source)?
        .iter()
        .map(|frame| transcoder.fit(frame, settings.width, settings.height))
        .collect();

    let grids: Vec<_> = frames.iter().map(extract_grid).collect();
    let encoded = assemble(&grids, settings.max_fragment_elements)?;

    let first = frames
        .first()
        .ok_or_else(|| MatrixError::Internal("decoder returned no frames".into()))?;
    transcoder
        .write_png(first, preview)
        .map_err(|e| MatrixError::Storage(format!("failed to write preview: {e}")))?;

    Ok(encoded)
}
