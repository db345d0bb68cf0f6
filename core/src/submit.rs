/// Message submission.
///
/// Text goes out as a single append. Images run a three-step chain:
/// append a placeholder record, upload the bytes under the placeholder's
/// key, then overwrite the record with the resolved public URL. Each step
/// starts only after the previous one succeeded, and a failed step leaves
/// whatever the earlier steps already wrote.
use bytes::Bytes;
use tracing::{debug, warn};

use crate::backend::{BlobStoreRef, Identity, RealtimeStoreRef};
use crate::config::ChatConfig;
use crate::error::Result;
use crate::message::Message;

/// A locally selected image, not yet uploaded
#[derive(Debug, Clone)]
pub struct LocalImage {
    /// Original file name; becomes the last segment of the storage path
    pub file_name: String,
    pub bytes: Bytes,
}

impl LocalImage {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

pub struct MessageSubmitter {
    store: RealtimeStoreRef,
    blobs: BlobStoreRef,
    config: ChatConfig,
}

impl MessageSubmitter {
    pub fn new(store: RealtimeStoreRef, blobs: BlobStoreRef, config: ChatConfig) -> Self {
        Self {
            store,
            blobs,
            config,
        }
    }

    /// Append a text message and return its backend key.
    ///
    /// One remote write; failures surface to the caller unretried.
    pub async fn submit_text(&self, content: &str, author: &Identity) -> Result<String> {
        let message = Message::text(
            content,
            author.display_name.clone(),
            author.photo_url.clone(),
        );
        let key = self
            .store
            .append(&self.config.messages_path, message.to_value())
            .await?;
        debug!("text message appended at {}", key);
        Ok(key)
    }

    /// Submit an image through the placeholder chain and return its key.
    ///
    /// Aborted chains are not compensated: a failed upload leaves the
    /// placeholder record in the collection, showing the loading sentinel.
    pub async fn submit_image(&self, image: LocalImage, author: &Identity) -> Result<String> {
        // Step 1: placeholder append, so the key exists before bytes move
        let placeholder = Message::placeholder(
            author.display_name.clone(),
            author.photo_url.clone(),
            &self.config.loading_image_url,
        );
        let key = self
            .store
            .append(&self.config.messages_path, placeholder.to_value())
            .await?;
        debug!("placeholder appended at {}", key);

        // Step 2: upload under (author id, key, file name)
        let storage_path = format!("{}/{}/{}", author.id, key, image.file_name);
        let blob = self.blobs.upload(&storage_path, image.bytes).await?;

        // Step 3: resolve the public URL and finalize the record in place
        let url = self.blobs.download_url(&blob).await?;
        let finished = Message::image(
            url,
            author.display_name.clone(),
            author.photo_url.clone(),
        );
        if let Err(e) = self
            .store
            .overwrite(&self.config.messages_path, &key, finished.to_value())
            .await
        {
            warn!("image message {} uploaded but not finalized: {}", key, e);
            return Err(e);
        }
        debug!("image message finalized at {}", key);
        Ok(key)
    }
}
