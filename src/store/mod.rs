//! External storage collaborators
//!
//! Two seams: [`BlobStorage`] takes the audio bytes and hands back a URL,
//! [`RecordingStore`] holds the recording rows. [`MemoryStore`] implements
//! both in-process; the `http` feature adds REST-backed implementations.

#[cfg(feature = "http")]
pub mod http;
pub mod memory;

#[cfg(feature = "http")]
pub use http::{HttpBlobStorage, RestRecordingStore};
pub use memory::MemoryStore;

use crate::catalog::RecordingEntity;
use crate::geo::Coordinate;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a successful blob upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedBlob {
    /// Stable public reference to the stored bytes
    pub url: String,
}

/// A recording row as submitted, before the server assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecordingRow {
    pub username: Option<String>,
    pub title: Option<String>,
    pub audio_url: String,
    pub longitude: f64,
    pub latitude: f64,
    pub moderated: bool,
    pub description: Option<String>,
}

impl NewRecordingRow {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A stored recording row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: NewRecordingRow,
}

impl RecordingRow {
    /// Convert into a catalog entity carrying the given theme tags
    pub fn into_entity(self, themes: Vec<String>) -> RecordingEntity {
        let coordinate = self.fields.coordinate();
        RecordingEntity {
            id: self.id,
            coordinate,
            audio_ref: self.fields.audio_url,
            title: self.fields.title,
            description: self.fields.description,
            created_at: self.created_at,
            themes,
        }
    }
}

/// Blob storage for uploaded audio
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` under a name derived from `suggested_name`.
    ///
    /// Fails with [`crate::SoundtrailError::UploadError`].
    async fn upload(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<UploadedBlob>;
}

/// Relational store for recording rows
#[async_trait]
pub trait RecordingStore: Send + Sync {
    /// Insert a row and return it as stored.
    ///
    /// Fails with [`crate::SoundtrailError::InsertError`].
    async fn insert_recording(&self, row: NewRecordingRow) -> Result<RecordingRow>;

    /// Rows flagged moderated, joined with their theme tags.
    ///
    /// Fails with [`crate::SoundtrailError::CatalogError`].
    async fn list_moderated_recordings(&self) -> Result<Vec<RecordingEntity>>;
}
