/// Backend collaborator contracts.
///
/// The core talks to its hosted platform through three narrow interfaces:
/// a realtime ordered collection, blob storage, and an identity service.
/// Everything behind them (fanout, persistence, auth) is the backend's
/// concern; the core only sees keys, raw values and URLs.
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

pub mod memory;

pub use memory::MemoryBackend;

/// One record of a remote collection: backend-assigned key plus raw value
#[derive(Debug, Clone)]
pub struct RecordEntry {
    pub key: String,
    pub value: Value,
}

/// Notifications delivered to one listener registration
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    /// The full child set of the watched path, in insertion order
    Changed(Vec<RecordEntry>),

    /// The backend revoked this listener (permissions, shutdown)
    Cancelled { reason: String },
}

/// An active listener registration on a collection path
pub struct Subscription {
    /// Opaque registration id, passed back to `unsubscribe`
    pub id: String,

    /// Change notifications, in delivery order
    pub events: mpsc::UnboundedReceiver<CollectionEvent>,
}

/// Reference to an uploaded blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Storage path the bytes were written under
    pub path: String,

    /// Content digest (base58-encoded SHA-256)
    pub digest: String,
}

/// The signed-in user as reported by the identity service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl Identity {
    /// Stand-in author used when nobody is signed in
    pub fn anonymous(name: &str) -> Self {
        Self {
            id: name.to_string(),
            display_name: Some(name.to_string()),
            photo_url: None,
        }
    }
}

/// Live ordered-collection service
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Register a listener on `path`. The current child set is delivered
    /// immediately, then the full set again after every change.
    async fn subscribe(&self, path: &str) -> Result<Subscription>;

    /// Append a record under a fresh backend-assigned key and return it.
    async fn append(&self, path: &str, value: Value) -> Result<String>;

    /// Overwrite the record at `key`, creating it if absent.
    async fn overwrite(&self, path: &str, key: &str, value: Value) -> Result<()>;

    /// Release a listener registration. Synchronous so callers can release
    /// from `Drop`; unknown ids are ignored.
    fn unsubscribe(&self, id: &str);
}

/// Blob storage service
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return a reference to the stored blob.
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<BlobRef>;

    /// Resolve a publicly fetchable URL for an uploaded blob.
    async fn download_url(&self, blob: &BlobRef) -> Result<String>;
}

/// Identity service with a cached current user
pub trait IdentityProvider: Send + Sync {
    /// Currently signed-in identity, if any.
    fn current_identity(&self) -> Option<Identity>;
}

pub type RealtimeStoreRef = Arc<dyn RealtimeStore>;
pub type BlobStoreRef = Arc<dyn BlobStore>;
pub type IdentityProviderRef = Arc<dyn IdentityProvider>;
