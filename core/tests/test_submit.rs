/// Submission integration tests
/// Direct text appends and the placeholder upload chain
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{json, Value};

use hearth_core::backend::{
    BlobRef, BlobStore, Identity, MemoryBackend, RealtimeStore, Subscription,
};
use hearth_core::error::Result;
use hearth_core::submit::{LocalImage, MessageSubmitter};
use hearth_core::sync::ListSyncSource;
use hearth_core::{ChatConfig, HearthError};

fn ann() -> Identity {
    Identity {
        id: "ann-1".to_string(),
        display_name: Some("Ann".to_string()),
        photo_url: Some("https://example.com/ann.png".to_string()),
    }
}

/// Blob store that always fails, as a down storage service would
struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn upload(&self, path: &str, _bytes: Bytes) -> Result<BlobRef> {
        Err(HearthError::Upload(format!(
            "storage unavailable for {}",
            path
        )))
    }

    async fn download_url(&self, blob: &BlobRef) -> Result<String> {
        Err(HearthError::Upload(format!(
            "storage unavailable for {}",
            blob.path
        )))
    }
}

/// Store that accepts nothing, so chains stop at their first write
struct ReadOnlyStore;

#[async_trait]
impl RealtimeStore for ReadOnlyStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        Err(HearthError::Connect(format!("no listeners on {}", path)))
    }

    async fn append(&self, path: &str, _value: Value) -> Result<String> {
        Err(HearthError::Write(format!(
            "collection {} is read only",
            path
        )))
    }

    async fn overwrite(&self, path: &str, _key: &str, _value: Value) -> Result<()> {
        Err(HearthError::Write(format!(
            "collection {} is read only",
            path
        )))
    }

    fn unsubscribe(&self, _id: &str) {}
}

/// Store that appends fine but cannot finalize
struct NoFinalizeStore {
    inner: Arc<MemoryBackend>,
}

#[async_trait]
impl RealtimeStore for NoFinalizeStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        self.inner.subscribe(path).await
    }

    async fn append(&self, path: &str, value: Value) -> Result<String> {
        self.inner.append(path, value).await
    }

    async fn overwrite(&self, _path: &str, key: &str, _value: Value) -> Result<()> {
        Err(HearthError::Write(format!("overwrite of {} refused", key)))
    }

    fn unsubscribe(&self, id: &str) {
        self.inner.unsubscribe(id)
    }
}

#[tokio::test]
async fn test_text_submit_writes_one_record() {
    let backend = Arc::new(MemoryBackend::new());
    let config = ChatConfig::default();
    let submitter = MessageSubmitter::new(backend.clone(), backend.clone(), config.clone());

    let key = submitter.submit_text("hello there", &ann()).await.unwrap();

    let records = backend.records(&config.messages_path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, key);
    assert_eq!(
        records[0].value,
        json!({
            "text": "hello there",
            "name": "Ann",
            "photoUrl": "https://example.com/ann.png",
            "imageUrl": null,
        })
    );
    assert_eq!(backend.append_calls(), 1);
    assert_eq!(backend.upload_calls(), 0);
}

#[tokio::test]
async fn test_author_without_profile_writes_nulls() {
    let backend = Arc::new(MemoryBackend::new());
    let config = ChatConfig::default();
    let submitter = MessageSubmitter::new(backend.clone(), backend.clone(), config.clone());

    let bare = Identity {
        id: "u2".to_string(),
        display_name: None,
        photo_url: None,
    };
    submitter.submit_text("hi", &bare).await.unwrap();

    let records = backend.records(&config.messages_path);
    assert_eq!(
        records[0].value,
        json!({ "text": "hi", "name": null, "photoUrl": null, "imageUrl": null })
    );
}

#[tokio::test]
async fn test_image_chain_runs_in_order() {
    let backend = Arc::new(MemoryBackend::new());
    let config = ChatConfig::default();
    let submitter = MessageSubmitter::new(backend.clone(), backend.clone(), config.clone());

    // Watch the collection so the placeholder emission is observable
    let mut snapshots = ListSyncSource::new(backend.clone(), config.clone())
        .open()
        .await
        .unwrap();
    assert!(snapshots.next().await.unwrap().is_empty());

    let image = LocalImage::new("cat.png", &b"pretend png bytes"[..]);
    let key = submitter.submit_image(image, &ann()).await.unwrap();

    // First the placeholder with the loading sentinel
    let placeholder = snapshots.next().await.unwrap();
    assert_eq!(placeholder.len(), 1);
    assert!(placeholder[0].is_placeholder(&config.loading_image_url));
    assert_eq!(placeholder[0].name.as_deref(), Some("Ann"));
    assert!(placeholder[0].text.is_none());

    // Then the finalized record pointing at the stored blob
    let finished = snapshots.next().await.unwrap();
    assert_eq!(finished.len(), 1);
    let url = finished[0].image_url.clone().unwrap();
    assert_eq!(url, format!("mem://blobs/ann-1/{}/cat.png", key));
    assert!(finished[0].text.is_none());

    // The bytes landed under (author id, key, file name)
    let stored = backend.blob(&format!("ann-1/{}/cat.png", key)).unwrap();
    assert_eq!(stored, Bytes::from_static(b"pretend png bytes"));

    assert_eq!(backend.append_calls(), 1);
    assert_eq!(backend.upload_calls(), 1);
    assert_eq!(backend.url_calls(), 1);
    assert_eq!(backend.overwrite_calls(), 1);
}

#[tokio::test]
async fn test_failed_upload_leaves_placeholder() {
    let backend = Arc::new(MemoryBackend::new());
    let config = ChatConfig::default();
    let submitter =
        MessageSubmitter::new(backend.clone(), Arc::new(FailingBlobStore), config.clone());

    let image = LocalImage::new("cat.png", &b"bytes"[..]);
    let err = submitter.submit_image(image, &ann()).await.unwrap_err();
    assert!(matches!(err, HearthError::Upload(_)));

    // No compensation: the placeholder record stays, sentinel and all
    let records = backend.records(&config.messages_path);
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].value.get("imageUrl").and_then(Value::as_str),
        Some(config.loading_image_url.as_str())
    );
    assert_eq!(backend.overwrite_calls(), 0);
}

#[tokio::test]
async fn test_failed_placeholder_append_skips_upload() {
    let blobs = Arc::new(MemoryBackend::new());
    let submitter = MessageSubmitter::new(
        Arc::new(ReadOnlyStore),
        blobs.clone(),
        ChatConfig::default(),
    );

    let image = LocalImage::new("cat.png", &b"bytes"[..]);
    let err = submitter.submit_image(image, &ann()).await.unwrap_err();
    assert!(matches!(err, HearthError::Write(_)));

    // The chain stopped at step one: nothing was uploaded
    assert_eq!(blobs.upload_calls(), 0);
}

#[tokio::test]
async fn test_failed_finalize_surfaces_after_upload() {
    let inner = Arc::new(MemoryBackend::new());
    let store = Arc::new(NoFinalizeStore {
        inner: inner.clone(),
    });
    let blobs = Arc::new(MemoryBackend::new());
    let config = ChatConfig::default();
    let submitter = MessageSubmitter::new(store, blobs.clone(), config.clone());

    let image = LocalImage::new("cat.png", &b"bytes"[..]);
    let err = submitter.submit_image(image, &ann()).await.unwrap_err();
    assert!(matches!(err, HearthError::Write(_)));

    // The upload happened; only the final overwrite was refused
    assert_eq!(blobs.upload_calls(), 1);
    assert_eq!(blobs.url_calls(), 1);
    let records = inner.records(&config.messages_path);
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].value.get("imageUrl").and_then(Value::as_str),
        Some(config.loading_image_url.as_str())
    );
}
