//! Picture record persistence.
//!
//! Records are written once at ingestion and read at delivery time. The
//! [`PictureStore`] trait is the only surface the services depend on, so
//! tests can run against [`MemoryPictureStore`] while the server uses
//! [`JsonFilePictureStore`].

mod file;
mod memory;

pub use file::JsonFilePictureStore;
pub use memory::MemoryPictureStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{EncodedAnimation, Fragment};

/// Errors raised by a [`PictureStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this id already exists.
    #[error("record {0} already exists")]
    DuplicateKey(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The persisted unit for one uploaded picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureRecord {
    pub id: String,
    pub display_name: String,
    pub animated: bool,
    pub frame_count: u32,
    /// Serialized [`Fragment`]s in send order.
    pub fragments: Vec<String>,
}

impl PictureRecord {
    /// Builds a record from an encoded picture.
    pub fn from_encoded(
        id: impl Into<String>,
        display_name: impl Into<String>,
        encoded: &EncodedAnimation,
    ) -> serde_json::Result<Self> {
        let fragments = encoded
            .fragments()
            .map(Fragment::to_json)
            .collect::<serde_json::Result<Vec<_>>>()?;

        Ok(Self {
            id: id.into(),
            display_name: display_name.into(),
            animated: encoded.is_animated(),
            frame_count: encoded.frame_count(),
            fragments,
        })
    }

    /// Parses the stored fragments.
    pub fn decode_fragments(&self) -> serde_json::Result<Vec<Fragment>> {
        self.fragments
            .iter()
            .map(|json| Fragment::from_json(json))
            .collect()
    }
}

/// Key-based record storage.
#[async_trait]
pub trait PictureStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<PictureRecord>, StoreError>;

    /// Inserts a new record.
    ///
    /// # Errors
    /// [`StoreError::DuplicateKey`] if the id is already taken.
    async fn save(&self, record: PictureRecord) -> Result<(), StoreError>;

    /// Removes a record, returning it if it existed.
    async fn delete_by_id(&self, id: &str) -> Result<Option<PictureRecord>, StoreError>;

    /// All record ids, sorted.
    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;
}
