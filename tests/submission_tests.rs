//! Upload-then-insert ordering and failure reporting

use soundtrail::capture::CapturedAudio;
use soundtrail::catalog::RecordingCatalog;
use soundtrail::geo::Coordinate;
use soundtrail::store::MemoryStore;
use soundtrail::submission::{Category, SubmissionMetadata, SubmissionWorkflow};
use soundtrail::SoundtrailError;
use std::sync::Arc;

fn workflow(store: &MemoryStore) -> SubmissionWorkflow {
    SubmissionWorkflow::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Some("guest_user".to_string()),
    )
}

fn clip() -> CapturedAudio {
    CapturedAudio::from_samples(&vec![0.2; 22_050], 44_100, 1).unwrap()
}

fn metadata() -> SubmissionMetadata {
    SubmissionMetadata::new("Tram stop", Some(Coordinate::new(57.7089, 11.9746)))
        .with_description("Evening rush")
        .with_category(Category::Story)
}

#[tokio::test]
async fn test_successful_submission_writes_unmoderated_row() {
    let store = MemoryStore::new();
    let row = workflow(&store).submit(&clip(), &metadata()).await.unwrap();

    assert_eq!(store.upload_calls(), 1);
    assert_eq!(store.insert_calls(), 1);
    assert!(!row.fields.moderated);
    assert_eq!(row.fields.title.as_deref(), Some("Tram stop"));
    assert_eq!(row.fields.latitude, 57.7089);
    assert_eq!(row.fields.longitude, 11.9746);
    assert!(row.fields.audio_url.ends_with(".wav"));
    assert!(row.fields.audio_url.contains("voice-story-"));
    assert_eq!(store.blob(&row.fields.audio_url), Some(clip().bytes));
}

#[tokio::test]
async fn test_failed_upload_never_inserts() {
    let store = MemoryStore::new();
    store.fail_next_upload("storage unavailable");

    let err = workflow(&store).submit(&clip(), &metadata()).await.unwrap_err();

    assert!(matches!(err, SoundtrailError::UploadError(_)));
    assert_eq!(store.insert_calls(), 0);
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_failed_insert_is_reported_as_insert() {
    let store = MemoryStore::new();
    store.fail_next_insert("constraint violation");

    let err = workflow(&store).submit(&clip(), &metadata()).await.unwrap_err();

    assert!(matches!(err, SoundtrailError::InsertError(_)));
    assert_eq!(store.blob_count(), 1, "uploaded blob stays behind");
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_missing_position_fails_before_network() {
    let store = MemoryStore::new();
    let metadata = SubmissionMetadata::new("Tram stop", None);

    let err = workflow(&store).submit(&clip(), &metadata).await.unwrap_err();

    assert!(matches!(err, SoundtrailError::ValidationError(_)));
    assert_eq!(store.upload_calls(), 0);
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn test_empty_recording_fails_before_network() {
    let store = MemoryStore::new();
    let empty = CapturedAudio::from_samples(&[], 44_100, 1).unwrap();

    let err = workflow(&store).submit(&empty, &metadata()).await.unwrap_err();

    assert!(matches!(err, SoundtrailError::ValidationError(_)));
    assert_eq!(store.upload_calls(), 0);
}

#[tokio::test]
async fn test_submission_is_invisible_until_moderated() {
    let store = MemoryStore::new();
    let catalog = RecordingCatalog::new();
    let row = workflow(&store).submit(&clip(), &metadata()).await.unwrap();

    catalog.refresh(&store).await.unwrap();
    assert!(catalog.get(&row.id).is_none());

    store.set_moderated(&row.id, true);
    catalog.refresh(&store).await.unwrap();
    let entity = catalog.get(&row.id).unwrap();
    assert_eq!(entity.display_title(), "Tram stop");
}
