//! REST-backed storage collaborators
//!
//! `RestRecordingStore` talks to a PostgREST-style endpoint
//! (`{data_url}/rest/v1/{table}`), `HttpBlobStorage` posts the audio as a
//! multipart form to an upload endpoint that answers `{"url": ...}`.

use super::{BlobStorage, NewRecordingRow, RecordingRow, RecordingStore, UploadedBlob};
use crate::catalog::RecordingEntity;
use crate::integration::ServiceConfig;
use crate::{Result, SoundtrailError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Row as the recordings table names its columns
#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    username: Option<&'a str>,
    audioname: Option<&'a str>,
    audio_url: &'a str,
    #[serde(rename = "coordinateX")]
    coordinate_x: f64,
    #[serde(rename = "coordinateY")]
    coordinate_y: f64,
    moderated: bool,
    description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ThemeRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ThemeLink {
    #[serde(rename = "Theme")]
    theme: Option<ThemeRef>,
}

#[derive(Debug, Deserialize)]
struct DbRow {
    id: serde_json::Value,
    created_at: DateTime<Utc>,
    username: Option<String>,
    audioname: Option<String>,
    audio_url: String,
    #[serde(rename = "coordinateX")]
    coordinate_x: f64,
    #[serde(rename = "coordinateY")]
    coordinate_y: f64,
    #[serde(default)]
    moderated: bool,
    description: Option<String>,
    #[serde(default)]
    themes: Vec<ThemeLink>,
}

impl DbRow {
    fn into_row(self) -> (RecordingRow, Vec<String>) {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        let themes = self
            .themes
            .into_iter()
            .filter_map(|link| link.theme.map(|t| t.name))
            .collect();
        let row = RecordingRow {
            id,
            created_at: self.created_at,
            fields: NewRecordingRow {
                username: self.username,
                title: self.audioname,
                audio_url: self.audio_url,
                longitude: self.coordinate_x,
                latitude: self.coordinate_y,
                moderated: self.moderated,
                description: self.description,
            },
        };
        (row, themes)
    }
}

fn build_client() -> std::result::Result<Client, reqwest::Error> {
    Client::builder().timeout(REQUEST_TIMEOUT).build()
}

/// Recording rows over a PostgREST API
#[derive(Debug, Clone)]
pub struct RestRecordingStore {
    client: Client,
    table_url: String,
    api_key: String,
}

impl RestRecordingStore {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base = config
            .data_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SoundtrailError::ConfigError("services.data_url is not set".into()))?;
        let client = build_client()
            .map_err(|e| SoundtrailError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            table_url: format!(
                "{}/rest/v1/{}",
                base.trim_end_matches('/'),
                config.recordings_table
            ),
            api_key: config.data_api_key.clone().unwrap_or_default(),
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl RecordingStore for RestRecordingStore {
    async fn insert_recording(&self, row: NewRecordingRow) -> Result<RecordingRow> {
        let body = InsertRow {
            username: row.username.as_deref(),
            audioname: row.title.as_deref(),
            audio_url: &row.audio_url,
            coordinate_x: row.longitude,
            coordinate_y: row.latitude,
            moderated: row.moderated,
            description: row.description.as_deref(),
        };

        let response = self
            .authorized(self.client.post(&self.table_url))
            .header("Prefer", "return=representation")
            .json(&[body])
            .send()
            .await
            .map_err(|e| SoundtrailError::InsertError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Insert rejected with {}: {}", status, text);
            return Err(SoundtrailError::InsertError(format!("{}: {}", status, text)));
        }

        let mut rows: Vec<DbRow> = response
            .json()
            .await
            .map_err(|e| SoundtrailError::InsertError(format!("Unexpected response: {}", e)))?;
        let stored = rows
            .pop()
            .ok_or_else(|| SoundtrailError::InsertError("Insert returned no row".into()))?;

        let (row, _) = stored.into_row();
        info!("Inserted recording row {}", row.id);
        Ok(row)
    }

    async fn list_moderated_recordings(&self) -> Result<Vec<RecordingEntity>> {
        let response = self
            .authorized(self.client.get(&self.table_url))
            .query(&[
                ("select", "*,themes:AudioUploadTheme(Theme(name))"),
                ("moderated", "eq.true"),
            ])
            .send()
            .await
            .map_err(|e| SoundtrailError::CatalogError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SoundtrailError::CatalogError(format!(
                "Listing recordings failed with {}",
                status
            )));
        }

        let rows: Vec<DbRow> = response
            .json()
            .await
            .map_err(|e| SoundtrailError::CatalogError(format!("Unexpected response: {}", e)))?;
        debug!("Fetched {} moderated rows", rows.len());

        Ok(rows
            .into_iter()
            .map(|r| {
                let (row, themes) = r.into_row();
                row.into_entity(themes)
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
    error: Option<String>,
}

/// Multipart uploads to an HTTP blob endpoint
#[derive(Debug, Clone)]
pub struct HttpBlobStorage {
    client: Client,
    upload_url: String,
}

impl HttpBlobStorage {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let upload_url = config
            .upload_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SoundtrailError::ConfigError("services.upload_url is not set".into()))?;
        let client = build_client()
            .map_err(|e| SoundtrailError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, upload_url })
    }
}

#[async_trait]
impl BlobStorage for HttpBlobStorage {
    async fn upload(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<UploadedBlob> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(suggested_name.to_string())
            .mime_str("audio/wav")
            .map_err(|e| SoundtrailError::UploadError(e.to_string()))?;
        let form = Form::new().part("audio", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SoundtrailError::UploadError(e.to_string()))?;

        let status = response.status();
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| SoundtrailError::UploadError(format!("Unexpected response: {}", e)))?;

        match (status.is_success(), body.url) {
            (true, Some(url)) => {
                info!("Uploaded {} bytes as {}", size, url);
                Ok(UploadedBlob { url })
            }
            _ => Err(SoundtrailError::UploadError(
                body.error.unwrap_or_else(|| format!("Upload failed with {}", status)),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_row_maps_columns() {
        let json = r#"{
            "id": 42,
            "created_at": "2025-05-01T10:00:00Z",
            "username": "guest_user",
            "audioname": "Harbour",
            "audio_url": "https://blob.example/a.wav",
            "coordinateX": 11.94,
            "coordinateY": 57.70,
            "moderated": true,
            "description": null,
            "themes": [{"Theme": {"name": "sea"}}, {"Theme": null}]
        }"#;
        let row: DbRow = serde_json::from_str(json).unwrap();
        let (row, themes) = row.into_row();
        let entity = row.into_entity(themes);

        assert_eq!(entity.id, "42");
        assert_eq!(entity.coordinate.longitude, 11.94);
        assert_eq!(entity.coordinate.latitude, 57.70);
        assert_eq!(entity.themes, vec!["sea".to_string()]);
        assert_eq!(entity.title.as_deref(), Some("Harbour"));
    }

    #[test]
    fn test_store_requires_data_url() {
        let config = ServiceConfig::default();
        assert!(matches!(
            RestRecordingStore::new(&config),
            Err(SoundtrailError::ConfigError(_))
        ));
        assert!(HttpBlobStorage::new(&config).is_err());
    }
}
