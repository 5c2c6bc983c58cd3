//! Publishing a new recording
//!
//! A submission is two strictly ordered calls: the audio goes to blob
//! storage, then a row pointing at the returned URL goes into the recordings
//! table. New rows are unmoderated and stay out of the catalog until
//! approved.

use crate::capture::CapturedAudio;
use crate::geo::Coordinate;
use crate::store::{BlobStorage, NewRecordingRow, RecordingRow, RecordingStore};
use crate::{Result, SoundtrailError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Kind of recording, chosen by the user on submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Story,
    Music,
    Nature,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Story,
        Category::Music,
        Category::Nature,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Story => "story",
            Category::Music => "music",
            Category::Nature => "nature",
            Category::Other => "other",
        }
    }

    /// Text shown in a category picker
    pub fn label(&self) -> &'static str {
        match self {
            Category::Story => "Personal Story",
            Category::Music => "Music/Performance",
            Category::Nature => "Nature Sounds",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the user filled in, plus where they are
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionMetadata {
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Current position; `None` when no fix is known yet
    pub coordinate: Option<Coordinate>,
}

impl SubmissionMetadata {
    pub fn new(title: impl Into<String>, coordinate: Option<Coordinate>) -> Self {
        Self {
            title: title.into(),
            coordinate,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Everything that must hold before any network call
    pub fn validate(&self) -> Result<Coordinate> {
        if self.title.trim().is_empty() {
            return Err(SoundtrailError::ValidationError("a title is required".into()));
        }
        match self.coordinate {
            Some(c) if c.is_finite() => Ok(c),
            Some(_) => Err(SoundtrailError::ValidationError(
                "the current position is not valid".into(),
            )),
            None => Err(SoundtrailError::ValidationError(
                "your position is not known yet".into(),
            )),
        }
    }

    fn description_or_default(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            format!("{} recording", self.category)
        } else {
            description.to_string()
        }
    }
}

/// Blob name for a recording made at `millis` since the epoch
pub fn blob_name(millis: i64) -> String {
    format!("voice-story-{}.wav", millis)
}

/// Upload-then-insert pipeline for new recordings
#[derive(Clone)]
pub struct SubmissionWorkflow {
    blobs: Arc<dyn BlobStorage>,
    records: Arc<dyn RecordingStore>,
    username: Option<String>,
}

impl SubmissionWorkflow {
    pub fn new(
        blobs: Arc<dyn BlobStorage>,
        records: Arc<dyn RecordingStore>,
        username: Option<String>,
    ) -> Self {
        Self {
            blobs,
            records,
            username,
        }
    }

    /// Publish `audio` with `metadata`.
    ///
    /// Fails with `ValidationError` before touching the network, `UploadError` when the
    /// blob could not be stored (no row is written), or `InsertError` when the row
    /// was rejected. An uploaded blob is not removed after an insert failure.
    pub async fn submit(
        &self,
        audio: &CapturedAudio,
        metadata: &SubmissionMetadata,
    ) -> Result<RecordingRow> {
        if audio.is_empty() {
            return Err(SoundtrailError::ValidationError(
                "there is no recording to submit".into(),
            ));
        }
        let coordinate = metadata.validate()?;

        let name = blob_name(Utc::now().timestamp_millis());
        let blob = match self.blobs.upload(audio.bytes.clone(), &name).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Upload of {} failed: {}", name, e);
                return Err(match e {
                    SoundtrailError::UploadError(_) => e,
                    other => SoundtrailError::UploadError(other.to_string()),
                });
            }
        };
        info!("Uploaded {} to {}", name, blob.url);

        let row = NewRecordingRow {
            username: self.username.clone(),
            title: Some(metadata.title.trim().to_string()),
            audio_url: blob.url,
            longitude: coordinate.longitude,
            latitude: coordinate.latitude,
            moderated: false,
            description: Some(metadata.description_or_default()),
        };

        match self.records.insert_recording(row).await {
            Ok(stored) => {
                info!("Submitted recording {} for moderation", stored.id);
                Ok(stored)
            }
            Err(e) => {
                warn!("Insert failed, uploaded blob is left unreferenced: {}", e);
                Err(match e {
                    SoundtrailError::InsertError(_) => e,
                    other => SoundtrailError::InsertError(other.to_string()),
                })
            }
        }
    }
}
