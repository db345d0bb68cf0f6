/// Live list synchronization.
///
/// `ListSyncSource` registers one listener on the configured messages path
/// and hands back `Snapshots`, a push stream that yields the full decoded
/// message list on every backend notification. No diffing: each item
/// replaces the previous one wholesale.
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::{CollectionEvent, RealtimeStoreRef, RecordEntry};
use crate::config::ChatConfig;
use crate::error::{HearthError, Result};
use crate::message::Message;

pub struct ListSyncSource {
    store: RealtimeStoreRef,
    config: ChatConfig,
}

impl ListSyncSource {
    pub fn new(store: RealtimeStoreRef, config: ChatConfig) -> Self {
        Self { store, config }
    }

    /// Open the subscription and return the snapshot stream.
    ///
    /// Consumes the source, so one instance owns at most one registration.
    /// Subscription failures surface here as `Connect` errors; once a
    /// stream exists it only ever yields decoded lists.
    pub async fn open(self) -> Result<Snapshots> {
        self.config.validate()?;
        let subscription = self.store.subscribe(&self.config.messages_path).await?;
        debug!(
            "listening on {} (registration {})",
            self.config.messages_path, subscription.id
        );
        Ok(Snapshots {
            events: subscription.events,
            guard: SubscriptionGuard {
                store: self.store,
                id: Some(subscription.id),
            },
        })
    }
}

/// Push stream of full-list snapshots.
///
/// Dropping the stream releases the underlying registration exactly once,
/// before the drop returns, whether or not anything was ever polled.
pub struct Snapshots {
    events: mpsc::UnboundedReceiver<CollectionEvent>,
    guard: SubscriptionGuard,
}

impl Snapshots {
    /// Registration id held by this stream
    pub fn registration_id(&self) -> Option<&str> {
        self.guard.id.as_deref()
    }
}

impl Stream for Snapshots {
    type Item = Vec<Message>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.events.poll_recv(cx) {
                Poll::Ready(Some(CollectionEvent::Changed(entries))) => {
                    match decode_batch(&entries) {
                        Ok(messages) => return Poll::Ready(Some(messages)),
                        // One bad record drops the whole notification; the
                        // previously emitted snapshot stays current.
                        Err(e) => warn!("dropping change notification: {}", e),
                    }
                }
                Poll::Ready(Some(CollectionEvent::Cancelled { reason })) => {
                    warn!("{}", HearthError::Cancelled(reason));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

fn decode_batch(entries: &[RecordEntry]) -> Result<Vec<Message>> {
    entries
        .iter()
        .map(|entry| Message::from_value(&entry.key, &entry.value))
        .collect()
}

/// Releases the listener registration when the stream goes away
struct SubscriptionGuard {
    store: RealtimeStoreRef,
    id: Option<String>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            debug!("releasing registration {}", id);
            self.store.unsubscribe(&id);
        }
    }
}
