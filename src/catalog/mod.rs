//! Catalog of moderated, geo-tagged recordings
//!
//! The catalog is read-mostly: it is filled from the data collaborator on
//! startup and replaced wholesale by [`RecordingCatalog::refresh`].

use crate::geo::Coordinate;
use crate::store::RecordingStore;
use crate::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// A single recording left at a fixed place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingEntity {
    pub id: String,
    pub coordinate: Coordinate,
    /// Where the audio can be fetched from
    pub audio_ref: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub themes: Vec<String>,
}

impl RecordingEntity {
    pub fn new(id: impl Into<String>, coordinate: Coordinate, audio_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coordinate,
            audio_ref: audio_ref.into(),
            title: None,
            description: None,
            created_at: Utc::now(),
            themes: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.themes = themes.into_iter().map(Into::into).collect();
        self
    }

    /// Title for display, falling back to a generic label
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled recording")
    }
}

/// Shared handle to the current catalog snapshot
#[derive(Debug, Clone, Default)]
pub struct RecordingCatalog {
    recordings: Arc<RwLock<Vec<RecordingEntity>>>,
}

impl RecordingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from an already fetched list
    pub fn from_recordings(recordings: Vec<RecordingEntity>) -> Self {
        let catalog = Self::new();
        catalog.replace(recordings);
        catalog
    }

    /// Fetch the moderated recordings and replace the current snapshot.
    ///
    /// On failure the previous snapshot is kept. Returns the number of
    /// recordings now in the catalog.
    pub async fn refresh(&self, store: &dyn RecordingStore) -> Result<usize> {
        let fetched = store.list_moderated_recordings().await?;
        Ok(self.replace(fetched))
    }

    /// Swap in a new snapshot, dropping rows whose id was already seen
    pub fn replace(&self, recordings: Vec<RecordingEntity>) -> usize {
        let mut seen = HashSet::with_capacity(recordings.len());
        let mut unique = Vec::with_capacity(recordings.len());
        for recording in recordings {
            if seen.insert(recording.id.clone()) {
                unique.push(recording);
            } else {
                warn!("Dropping duplicate recording id {}", recording.id);
            }
        }

        let count = unique.len();
        *self.recordings.write() = unique;
        info!("Catalog refreshed with {} recordings", count);
        count
    }

    pub fn all(&self) -> Vec<RecordingEntity> {
        self.recordings.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<RecordingEntity> {
        self.recordings.read().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.recordings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.read().is_empty()
    }
}
