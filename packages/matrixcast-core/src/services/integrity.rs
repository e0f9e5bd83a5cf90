//! Reconciliation between stored records and preview files.
//!
//! A preview without a record, or a record without a preview, is left over
//! from an interrupted upload or a manual edit. Both are removed.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{MatrixError, MatrixResult};
use crate::events::{EventEmitter, LibraryEvent};
use crate::store::PictureStore;
use crate::utils::now_millis;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub status: &'static str,
    /// Preview files deleted because no record referenced them.
    #[serde(rename = "missingDBEntries")]
    pub missing_db_entries: Vec<String>,
    /// Records deleted because their preview file was gone.
    #[serde(rename = "missingFiles")]
    pub missing_files: Vec<String>,
}

pub struct IntegrityService {
    store: Arc<dyn PictureStore>,
    emitter: Arc<dyn EventEmitter>,
    image_dir: PathBuf,
}

impl IntegrityService {
    pub fn new(
        store: Arc<dyn PictureStore>,
        emitter: Arc<dyn EventEmitter>,
        image_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            emitter,
            image_dir,
        }
    }

    /// Runs one reconciliation pass.
    pub async fn check(&self) -> MatrixResult<IntegrityReport> {
        log::debug!("[Integrity] Checking {}", self.image_dir.display());

        let file_ids = self.preview_ids().await?;
        let record_ids: HashSet<String> = self.store.list_ids().await?.into_iter().collect();

        let mut missing_db_entries: Vec<String> = file_ids
            .iter()
            .filter(|id| !record_ids.contains(*id))
            .cloned()
            .collect();
        missing_db_entries.sort();

        for id in &missing_db_entries {
            let path = self.image_dir.join(format!("{id}.png"));
            match tokio::fs::remove_file(&path).await {
                Ok(()) => log::info!("[Integrity] Deleted orphan file {id}.png"),
                Err(e) => log::warn!("[Integrity] Could not delete {}: {e}", path.display()),
            }
        }

        let mut missing_files: Vec<String> = record_ids
            .into_iter()
            .filter(|id| !file_ids.contains(id))
            .collect();
        missing_files.sort();

        for id in &missing_files {
            self.store.delete_by_id(id).await?;
            log::info!("[Integrity] Deleted orphan record {id}");
        }

        log::info!(
            "[Integrity] Cleaned: {} file(s), {} record(s)",
            missing_db_entries.len(),
            missing_files.len()
        );
        self.emitter.emit_library(LibraryEvent::IntegrityChecked {
            removed_files: missing_db_entries.len(),
            removed_records: missing_files.len(),
            timestamp: now_millis(),
        });

        Ok(IntegrityReport {
            status: "Cleaned",
            missing_db_entries,
            missing_files,
        })
    }

    async fn preview_ids(&self) -> MatrixResult<HashSet<String>> {
        let storage = |e: std::io::Error| {
            MatrixError::Storage(format!("failed to list {}: {e}", self.image_dir.display()))
        };

        let mut ids = HashSet::new();
        let mut entries = tokio::fs::read_dir(&self.image_dir).await.map_err(storage)?;
        while let Some(entry) = entries.next_entry().await.map_err(storage)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.insert(stem.to_string());
            }
        }
        Ok(ids)
    }

    /// Runs [`check`](Self::check) every `period` until `cancel` fires.
    ///
    /// The first pass happens one full period after the call.
    pub fn spawn_periodic(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            log::info!("[Integrity] Periodic check every {period:?}");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        log::info!("[Integrity] Periodic check stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.check().await {
                            log::warn!("[Integrity] Periodic check failed: {e}");
                        }
                    }
                }
            }
        })
    }
}
