/// In-process backend implementing all three contracts behind one struct.
///
/// Collections, blobs and the signed-in identity live in plain maps, and
/// every listener gets the full child set on each change, the same shape a
/// hosted realtime store would push. Backs the demo binary and the
/// integration tests; call counters expose backend traffic to the latter.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{
    BlobRef, BlobStore, CollectionEvent, Identity, IdentityProvider, RealtimeStore, RecordEntry,
    Subscription,
};
use crate::error::{HearthError, Result};

const DEFAULT_PUBLIC_BASE: &str = "mem://blobs";

struct Listener {
    path: String,
    tx: mpsc::UnboundedSender<CollectionEvent>,
    /// Set once the backend revoked this listener; muted but never closed
    revoked: bool,
}

struct StoredBlob {
    digest: String,
    bytes: Bytes,
}

pub struct MemoryBackend {
    // Sync locks so `unsubscribe` can run from Drop without an executor.
    collections: RwLock<HashMap<String, Vec<RecordEntry>>>,
    listeners: Mutex<HashMap<String, Listener>>,
    blobs: RwLock<HashMap<String, StoredBlob>>,
    identity: RwLock<Option<Identity>>,
    public_base: String,
    key_seq: AtomicU64,
    appends: AtomicU64,
    overwrites: AtomicU64,
    unsubscribes: AtomicU64,
    uploads: AtomicU64,
    url_resolutions: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_public_base(DEFAULT_PUBLIC_BASE)
    }

    /// Backend whose resolved blob URLs start with `base`
    pub fn with_public_base(base: impl Into<String>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            blobs: RwLock::new(HashMap::new()),
            identity: RwLock::new(None),
            public_base: base.into(),
            key_seq: AtomicU64::new(0),
            appends: AtomicU64::new(0),
            overwrites: AtomicU64::new(0),
            unsubscribes: AtomicU64::new(0),
            uploads: AtomicU64::new(0),
            url_resolutions: AtomicU64::new(0),
        }
    }

    /// Set the identity reported to `current_identity`
    pub fn sign_in(&self, identity: Identity) {
        debug!("signed in as {}", identity.id);
        *self.identity_write() = Some(identity);
    }

    pub fn sign_out(&self) {
        *self.identity_write() = None;
    }

    /// Current child set of a collection path, in insertion order
    pub fn records(&self, path: &str) -> Vec<RecordEntry> {
        self.collections_read().get(path).cloned().unwrap_or_default()
    }

    /// Stored bytes for a blob path, if any
    pub fn blob(&self, path: &str) -> Option<Bytes> {
        self.blobs_read().get(path).map(|b| b.bytes.clone())
    }

    /// Number of registered listeners, revoked ones included
    pub fn subscriber_count(&self) -> usize {
        self.listeners_guard().len()
    }

    /// Simulate the backend revoking every listener on `path`.
    ///
    /// Revoked listeners receive a `Cancelled` event and then go silent;
    /// their registration stays until the client releases it.
    pub fn revoke(&self, path: &str, reason: &str) {
        let mut listeners = self.listeners_guard();
        for (id, listener) in listeners.iter_mut() {
            if listener.path == path && !listener.revoked {
                listener.revoked = true;
                let _ = listener.tx.send(CollectionEvent::Cancelled {
                    reason: reason.to_string(),
                });
                warn!("listener {} revoked on {}: {}", id, path, reason);
            }
        }
    }

    pub fn append_calls(&self) -> u64 {
        self.appends.load(Ordering::Relaxed)
    }

    pub fn overwrite_calls(&self) -> u64 {
        self.overwrites.load(Ordering::Relaxed)
    }

    pub fn unsubscribe_calls(&self) -> u64 {
        self.unsubscribes.load(Ordering::Relaxed)
    }

    pub fn upload_calls(&self) -> u64 {
        self.uploads.load(Ordering::Relaxed)
    }

    pub fn url_calls(&self) -> u64 {
        self.url_resolutions.load(Ordering::Relaxed)
    }

    /// Next backend-assigned key. Zero-padded millis plus a process-local
    /// sequence number, so lexicographic order matches append order.
    fn next_push_key(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let seq = self.key_seq.fetch_add(1, Ordering::Relaxed);
        let tail: u16 = rand::random();
        format!("{:012x}-{:08x}-{:04x}", millis, seq, tail)
    }

    /// Push the full child set of `path` to every live listener on it
    fn notify(&self, path: &str) {
        let mut listeners = self.listeners_guard();
        // Read under the registry lock, like the initial delivery in
        // `subscribe`, so racing writers cannot fan out an older set after
        // a newer one.
        let snapshot = self.records(path);
        listeners.retain(|id, listener| {
            if listener.path != path || listener.revoked {
                return true;
            }
            if listener
                .tx
                .send(CollectionEvent::Changed(snapshot.clone()))
                .is_err()
            {
                debug!("pruning dead listener {}", id);
                return false;
            }
            true
        });
    }

    fn listeners_guard(&self) -> MutexGuard<'_, HashMap<String, Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn collections_read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<RecordEntry>>> {
        self.collections.read().unwrap_or_else(|e| e.into_inner())
    }

    fn collections_write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<RecordEntry>>> {
        self.collections.write().unwrap_or_else(|e| e.into_inner())
    }

    fn blobs_read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredBlob>> {
        self.blobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn blobs_write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredBlob>> {
        self.blobs.write().unwrap_or_else(|e| e.into_inner())
    }

    fn identity_read(&self) -> RwLockReadGuard<'_, Option<Identity>> {
        self.identity.read().unwrap_or_else(|e| e.into_inner())
    }

    fn identity_write(&self) -> RwLockWriteGuard<'_, Option<Identity>> {
        self.identity.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeStore for MemoryBackend {
    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4().to_string();
        {
            let mut listeners = self.listeners_guard();
            // Initial delivery happens under the registry lock so a racing
            // append cannot slip an older snapshot in after a newer one.
            let _ = tx.send(CollectionEvent::Changed(self.records(path)));
            listeners.insert(
                id.clone(),
                Listener {
                    path: path.to_string(),
                    tx,
                    revoked: false,
                },
            );
        }
        debug!("listener {} registered on {}", id, path);
        Ok(Subscription { id, events: rx })
    }

    async fn append(&self, path: &str, value: Value) -> Result<String> {
        self.appends.fetch_add(1, Ordering::Relaxed);
        let key = self.next_push_key();
        {
            let mut collections = self.collections_write();
            collections
                .entry(path.to_string())
                .or_default()
                .push(RecordEntry {
                    key: key.clone(),
                    value,
                });
        }
        debug!("appended {} at {}", key, path);
        self.notify(path);
        Ok(key)
    }

    async fn overwrite(&self, path: &str, key: &str, value: Value) -> Result<()> {
        self.overwrites.fetch_add(1, Ordering::Relaxed);
        {
            let mut collections = self.collections_write();
            let records = collections.entry(path.to_string()).or_default();
            match records.iter_mut().find(|r| r.key == key) {
                Some(record) => record.value = value,
                None => records.push(RecordEntry {
                    key: key.to_string(),
                    value,
                }),
            }
        }
        debug!("overwrote {} at {}", key, path);
        self.notify(path);
        Ok(())
    }

    fn unsubscribe(&self, id: &str) {
        self.unsubscribes.fetch_add(1, Ordering::Relaxed);
        if self.listeners_guard().remove(id).is_some() {
            debug!("listener {} released", id);
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<BlobRef> {
        self.uploads.fetch_add(1, Ordering::Relaxed);
        if path.is_empty() {
            return Err(HearthError::Upload(
                "storage path must not be empty".to_string(),
            ));
        }
        let digest = digest_b58(&bytes);
        let size = bytes.len();
        self.blobs_write().insert(
            path.to_string(),
            StoredBlob {
                digest: digest.clone(),
                bytes,
            },
        );
        debug!("stored {} bytes at {} ({})", size, path, digest);
        Ok(BlobRef {
            path: path.to_string(),
            digest,
        })
    }

    async fn download_url(&self, blob: &BlobRef) -> Result<String> {
        self.url_resolutions.fetch_add(1, Ordering::Relaxed);
        let blobs = self.blobs_read();
        match blobs.get(&blob.path) {
            Some(stored) if stored.digest == blob.digest => {
                Ok(format!("{}/{}", self.public_base, blob.path))
            }
            Some(_) => Err(HearthError::Upload(format!(
                "blob at {} does not match digest {}",
                blob.path, blob.digest
            ))),
            None => Err(HearthError::Upload(format!(
                "no blob stored at {}",
                blob.path
            ))),
        }
    }
}

impl IdentityProvider for MemoryBackend {
    fn current_identity(&self) -> Option<Identity> {
        self.identity_read().clone()
    }
}

fn digest_b58(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let hash = hasher.finalize();
    bs58::encode(&hash[..]).into_string()
}
