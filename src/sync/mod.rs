//! Synchronization between the local store, the REST transport, and the
//! push channel.
//!
//! Mutations apply to the store first and the transport second. A transport
//! failure undoes the local change through a captured [`MutationRollback`],
//! so the visible state is always either confirmed or untouched.

mod command;

pub use command::MutationRollback;

use std::sync::Arc;

use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::push::PushEvent;
use crate::store::{
    Notification, NotificationFilter, NotificationStats, NotificationStore,
};
use crate::transport::NotificationApi;

pub struct SyncController {
    api: Arc<dyn NotificationApi>,
    store: RwLock<NotificationStore>,
    updates_rx: watch::Receiver<u64>,
}

impl SyncController {
    pub fn new(api: Arc<dyn NotificationApi>) -> Self {
        let store = NotificationStore::new();
        let updates_rx = store.updates();
        Self {
            api,
            store: RwLock::new(store),
            updates_rx,
        }
    }

    /// Signal that fires whenever the local collection changes.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.updates_rx.clone()
    }

    /// Fetch the full collection and install it as the local state.
    pub async fn load(&self) -> Result<()> {
        let items = self.api.fetch_all(None).await?;
        info!(count = items.len(), "loaded notifications");
        self.store.write().await.replace_all(items);
        Ok(())
    }

    /// Fetch a filtered view and install it as the local state. The store
    /// mirrors whatever query the caller is currently looking at.
    pub async fn refresh(&self, filter: Option<&NotificationFilter>) -> Result<()> {
        let items = self.api.fetch_all(filter).await?;
        self.store.write().await.replace_all(items);
        Ok(())
    }

    /// Optimistic single mark-read.
    ///
    /// An id that is unknown or already read locally is a no-op with no
    /// transport call; the operation converges to the same state either way.
    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        {
            let mut store = self.store.write().await;
            if !store.mark_read(id) {
                return Ok(());
            }
        }

        match self.api.mark_read(id).await {
            Ok(known) => {
                if !known {
                    debug!(id = %id, "server no longer knows notification, keeping local read state");
                }
                Ok(())
            }
            Err(e) => {
                warn!(id = %id, "mark-read failed, rolling back: {}", e);
                MutationRollback::RestoreUnread(id.to_string())
                    .apply(&mut *self.store.write().await);
                Err(e)
            }
        }
    }

    /// Optimistic mark-all-read. The transport call goes out even when
    /// nothing was unread locally, so server-side drift still gets cleared.
    pub async fn mark_all_as_read(&self) -> Result<usize> {
        let transitioned = self.store.write().await.mark_all_read();

        match self.api.mark_all_read().await {
            Ok(updated) => {
                if updated != transitioned.len() {
                    debug!(
                        local = transitioned.len(),
                        server = updated,
                        "mark-all-read counts differ"
                    );
                }
                Ok(updated)
            }
            Err(e) => {
                warn!("mark-all-read failed, rolling back: {}", e);
                MutationRollback::RestoreUnreadMany(transitioned)
                    .apply(&mut *self.store.write().await);
                Err(e)
            }
        }
    }

    /// Optimistic delete. An id that is not loaded locally is a no-op with
    /// no transport call.
    pub async fn delete_notification(&self, id: &str) -> Result<()> {
        let removed = self.store.write().await.remove(id);
        let Some((position, record)) = removed else {
            return Ok(());
        };

        match self.api.delete(id).await {
            Ok(known) => {
                if !known {
                    debug!(id = %id, "notification already deleted on server");
                }
                Ok(())
            }
            Err(e) => {
                warn!(id = %id, "delete failed, rolling back: {}", e);
                MutationRollback::Reinsert { position, record }
                    .apply(&mut *self.store.write().await);
                Err(e)
            }
        }
    }

    /// Fetch unread notifications and merge them into the store. Returns
    /// the server-side unread count.
    pub async fn sync_unread(&self) -> Result<usize> {
        let (items, count) = self.api.fetch_unread().await?;
        let mut store = self.store.write().await;
        for item in items {
            store.insert(item);
        }
        if count != store.unread_count() {
            debug!(
                local = store.unread_count(),
                server = count,
                "unread counts differ after sync"
            );
        }
        Ok(count)
    }

    /// Fetch server aggregates and adopt them on drift. Returns whether any
    /// drift was corrected.
    pub async fn reconcile(&self) -> Result<bool> {
        let stats = self.api.fetch_stats().await?;
        Ok(self.store.write().await.reconcile(&stats))
    }

    /// Merge one push event into the store.
    pub async fn apply_push_event(&self, event: PushEvent) {
        let mut store = self.store.write().await;
        match event {
            PushEvent::Created(notification) => {
                store.insert(notification);
            }
            PushEvent::Read(id) => {
                store.mark_read(&id);
            }
            PushEvent::Deleted(id) => {
                store.remove(&id);
            }
        }
    }

    /// Drain a push event subscription into the store until the receiver
    /// closes or the token fires. Call from a spawned task.
    pub async fn run_event_pump(
        self: Arc<Self>,
        mut events: broadcast::Receiver<PushEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        debug!("applying push event: {:?}", event);
                        self.apply_push_event(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Missed events cannot be replayed; resynchronize
                        warn!("event pump lagged by {} events, reloading", n);
                        if let Err(e) = self.load().await {
                            error!("reload after lag failed: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("push event stream closed");
                        break;
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("event pump shutting down");
                    break;
                }
            }
        }
    }

    // Read accessors over the loaded collection.

    pub async fn snapshot(&self) -> Vec<Notification> {
        self.store.read().await.snapshot()
    }

    pub async fn get(&self, id: &str) -> Option<Notification> {
        self.store.read().await.get(id).cloned()
    }

    pub async fn unread_count(&self) -> usize {
        self.store.read().await.unread_count()
    }

    pub async fn stats(&self) -> NotificationStats {
        self.store.read().await.stats()
    }

    pub async fn search(&self, text: &str) -> Vec<Notification> {
        self.store.read().await.search(text)
    }
}
