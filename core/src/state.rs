/// Latest-list state and the session facade.
///
/// `ChatState` is deliberately thin: it holds the last emitted snapshot
/// and nothing else, no diffing or per-row bookkeeping. `ChatSession`
/// wires one sync stream into a state holder and forwards submissions,
/// which is all a presentation layer needs.
use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::{BlobStoreRef, Identity, IdentityProviderRef, RealtimeStoreRef};
use crate::config::ChatConfig;
use crate::error::{HearthError, Result};
use crate::message::Message;
use crate::submit::{LocalImage, MessageSubmitter};
use crate::sync::ListSyncSource;

/// Holds the most recent snapshot. One writer (the sync task), any
/// number of readers.
#[derive(Default)]
pub struct ChatState {
    latest: RwLock<Vec<Message>>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last emitted list; empty before the first emission
    pub async fn latest(&self) -> Vec<Message> {
        self.latest.read().await.clone()
    }

    /// Replace the held list with a newer snapshot
    pub(crate) async fn apply(&self, list: Vec<Message>) {
        *self.latest.write().await = list;
    }
}

pub struct ChatSession {
    store: RealtimeStoreRef,
    identity: IdentityProviderRef,
    state: Arc<ChatState>,
    submitter: Arc<MessageSubmitter>,
    config: ChatConfig,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatSession {
    pub fn new(
        store: RealtimeStoreRef,
        blobs: BlobStoreRef,
        identity: IdentityProviderRef,
        config: ChatConfig,
    ) -> Self {
        let submitter = Arc::new(MessageSubmitter::new(store.clone(), blobs, config.clone()));
        Self {
            store,
            identity,
            state: Arc::new(ChatState::new()),
            submitter,
            config,
            sync_task: Mutex::new(None),
        }
    }

    /// Open the subscription and start folding snapshots into the state.
    ///
    /// A session runs at most one sync task; calling `start` again while
    /// one is active is an error. Subscription failures surface here.
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.sync_task.lock().await;
        if slot.is_some() {
            return Err(HearthError::Connect("session already started".to_string()));
        }

        let source = ListSyncSource::new(self.store.clone(), self.config.clone());
        let mut snapshots = source.open().await?;
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            while let Some(list) = snapshots.next().await {
                debug!("applying snapshot of {} message(s)", list.len());
                state.apply(list).await;
            }
            info!("snapshot stream ended");
        });
        *slot = Some(handle);
        Ok(())
    }

    /// Stop syncing. The listener registration is released before this
    /// returns; the held state keeps its last snapshot.
    pub async fn stop(&self) {
        if let Some(handle) = self.sync_task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
            debug!("sync task stopped");
        }
    }

    /// Most recent snapshot seen by this session
    pub async fn messages(&self) -> Vec<Message> {
        self.state.latest().await
    }

    /// Shared handle to the state holder, for presentation-side reads
    pub fn state(&self) -> Arc<ChatState> {
        self.state.clone()
    }

    /// Submit a text message as the current identity.
    pub async fn send_text(&self, content: impl Into<String>) -> Result<String> {
        let content = content.into();
        let author = self.author();
        let submitter = self.submitter.clone();
        spawn_submission(async move { submitter.submit_text(&content, &author).await }).await
    }

    /// Submit an image as the current identity.
    pub async fn send_image(&self, image: LocalImage) -> Result<String> {
        let author = self.author();
        let submitter = self.submitter.clone();
        spawn_submission(async move { submitter.submit_image(image, &author).await }).await
    }

    /// Author fields for an outgoing message. Signed-in identities pass
    /// through unchanged; with nobody signed in, the anonymous stand-in
    /// from the config is used.
    fn author(&self) -> Identity {
        self.identity
            .current_identity()
            .unwrap_or_else(|| Identity::anonymous(&self.config.anonymous_name))
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(handle) = self.sync_task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Run a submission on its own task. A caller that drops its future
/// abandons the result, not the in-flight remote writes.
async fn spawn_submission(
    fut: impl Future<Output = Result<String>> + Send + 'static,
) -> Result<String> {
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(e) => Err(HearthError::Write(format!("submission task failed: {}", e))),
    }
}
