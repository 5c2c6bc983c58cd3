//! In-process implementation of the storage collaborators

use super::{BlobStorage, NewRecordingRow, RecordingRow, RecordingStore, UploadedBlob};
use crate::catalog::RecordingEntity;
use crate::playback::AudioFetcher;
use crate::{Result, SoundtrailError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct StoredRow {
    row: RecordingRow,
    themes: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<StoredRow>,
    blobs: HashMap<String, Vec<u8>>,
    upload_calls: usize,
    insert_calls: usize,
    fail_upload: Option<String>,
    fail_insert: Option<String>,
    fail_list: Option<String>,
}

/// Memory-backed blob and row store.
///
/// Clones share state. Failures can be injected for the next call of each
/// operation, and call counts are kept so callers can check what was reached.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing recording, as if it had been submitted and reviewed
    pub fn seed(&self, entity: RecordingEntity, moderated: bool) {
        let row = RecordingRow {
            id: entity.id,
            created_at: entity.created_at,
            fields: NewRecordingRow {
                username: None,
                title: entity.title,
                audio_url: entity.audio_ref,
                longitude: entity.coordinate.longitude,
                latitude: entity.coordinate.latitude,
                moderated,
                description: entity.description,
            },
        };
        self.inner.lock().rows.push(StoredRow {
            row,
            themes: entity.themes,
        });
    }

    /// Flip the moderation flag of a stored row
    pub fn set_moderated(&self, id: &str, moderated: bool) -> bool {
        let mut inner = self.inner.lock();
        match inner.rows.iter_mut().find(|s| s.row.id == id) {
            Some(stored) => {
                stored.row.fields.moderated = moderated;
                true
            }
            None => false,
        }
    }

    pub fn fail_next_upload(&self, reason: impl Into<String>) {
        self.inner.lock().fail_upload = Some(reason.into());
    }

    pub fn fail_next_insert(&self, reason: impl Into<String>) {
        self.inner.lock().fail_insert = Some(reason.into());
    }

    pub fn fail_next_list(&self, reason: impl Into<String>) {
        self.inner.lock().fail_list = Some(reason.into());
    }

    pub fn upload_calls(&self) -> usize {
        self.inner.lock().upload_calls
    }

    pub fn insert_calls(&self) -> usize {
        self.inner.lock().insert_calls
    }

    /// Every stored row, moderated or not
    pub fn rows(&self) -> Vec<RecordingRow> {
        self.inner.lock().rows.iter().map(|s| s.row.clone()).collect()
    }

    pub fn blob(&self, url: &str) -> Option<Vec<u8>> {
        self.inner.lock().blobs.get(url).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.inner.lock().blobs.len()
    }
}

#[async_trait]
impl BlobStorage for MemoryStore {
    async fn upload(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<UploadedBlob> {
        let mut inner = self.inner.lock();
        inner.upload_calls += 1;
        if let Some(reason) = inner.fail_upload.take() {
            return Err(SoundtrailError::UploadError(reason));
        }

        let url = format!("mem://blobs/{}-{}", Uuid::new_v4().simple(), suggested_name);
        debug!("Stored {} bytes at {}", bytes.len(), url);
        inner.blobs.insert(url.clone(), bytes);
        Ok(UploadedBlob { url })
    }
}

#[async_trait]
impl RecordingStore for MemoryStore {
    async fn insert_recording(&self, row: NewRecordingRow) -> Result<RecordingRow> {
        let mut inner = self.inner.lock();
        inner.insert_calls += 1;
        if let Some(reason) = inner.fail_insert.take() {
            return Err(SoundtrailError::InsertError(reason));
        }

        let stored = RecordingRow {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            fields: row,
        };
        inner.rows.push(StoredRow {
            row: stored.clone(),
            themes: Vec::new(),
        });
        Ok(stored)
    }

    async fn list_moderated_recordings(&self) -> Result<Vec<RecordingEntity>> {
        let mut inner = self.inner.lock();
        if let Some(reason) = inner.fail_list.take() {
            return Err(SoundtrailError::CatalogError(reason));
        }

        Ok(inner
            .rows
            .iter()
            .filter(|s| s.row.fields.moderated)
            .map(|s| s.row.clone().into_entity(s.themes.clone()))
            .collect())
    }
}

#[async_trait]
impl AudioFetcher for MemoryStore {
    async fn fetch(&self, audio_ref: &str) -> Result<Vec<u8>> {
        self.blob(audio_ref)
            .ok_or_else(|| SoundtrailError::PlaybackError(format!("No audio stored at {}", audio_ref)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> NewRecordingRow {
        NewRecordingRow {
            username: Some("guest_user".into()),
            title: Some("Harbour".into()),
            audio_url: "mem://blobs/x".into(),
            longitude: 11.94,
            latitude: 57.7,
            moderated: false,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_inserted_rows_wait_for_moderation() {
        let store = MemoryStore::new();
        let stored = store.insert_recording(row()).await.unwrap();

        assert!(store.list_moderated_recordings().await.unwrap().is_empty());

        assert!(store.set_moderated(&stored.id, true));
        let listed = store.list_moderated_recordings().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].audio_ref, "mem://blobs/x");
        assert_eq!(listed[0].coordinate.latitude, 57.7);
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let store = MemoryStore::new();
        store.fail_next_upload("bucket full");

        let err = store.upload(vec![1, 2, 3], "a.wav").await.unwrap_err();
        assert_eq!(err, SoundtrailError::UploadError("bucket full".into()));

        let blob = store.upload(vec![1, 2, 3], "a.wav").await.unwrap();
        assert_eq!(store.blob(&blob.url), Some(vec![1, 2, 3]));
        assert_eq!(store.upload_calls(), 2);
    }
}
