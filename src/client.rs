//! High-level notification client.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::push::{derive_ws_url, ConnectionState, PushChannel, ReconnectPolicy};
use crate::store::{Notification, NotificationFilter, NotificationStats};
use crate::sync::SyncController;
use crate::transport::{HttpNotificationApi, NotificationApi};

/// A connected notification client.
///
/// Owns the transport, the push channel, and the background tasks that keep
/// the local collection synchronized. Construct with [`NotificationClient::connect`],
/// stop with [`NotificationClient::shutdown`].
pub struct NotificationClient {
    controller: Arc<SyncController>,
    channel: Arc<PushChannel>,
    shutdown: CancellationToken,
}

impl NotificationClient {
    /// Load the initial collection over HTTP and open the push channel.
    ///
    /// Fails if the initial load fails; the push channel itself connects in
    /// the background and reconnects on its own.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let api = Arc::new(HttpNotificationApi::new(&config)?);
        Self::connect_with_api(config, api).await
    }

    /// Like [`connect`](Self::connect), with a caller-supplied transport.
    pub async fn connect_with_api(
        config: ClientConfig,
        api: Arc<dyn NotificationApi>,
    ) -> Result<Self> {
        let controller = Arc::new(SyncController::new(api));
        controller.load().await?;

        let ws_url = derive_ws_url(&config.base_url, &config.ws_path, &config.auth_token);
        let channel = Arc::new(PushChannel::new(
            ws_url,
            ReconnectPolicy::new(&config.reconnect),
        ));

        let shutdown = CancellationToken::new();
        tokio::spawn(
            controller
                .clone()
                .run_event_pump(channel.subscribe(), shutdown.clone()),
        );
        channel.connect();

        if config.reconcile_interval_secs > 0 {
            tokio::spawn(run_reconcile_loop(
                controller.clone(),
                config.reconcile_interval_secs,
                shutdown.clone(),
            ));
        }

        info!(base_url = %config.base_url, "notification client connected");
        Ok(Self {
            controller,
            channel,
            shutdown,
        })
    }

    /// Re-fetch the full collection.
    pub async fn refresh(&self) -> Result<()> {
        self.controller.load().await
    }

    /// Re-fetch a filtered view of the collection.
    pub async fn refresh_filtered(&self, filter: &NotificationFilter) -> Result<()> {
        self.controller.refresh(Some(filter)).await
    }

    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        self.controller.mark_as_read(id).await
    }

    pub async fn mark_all_as_read(&self) -> Result<usize> {
        self.controller.mark_all_as_read().await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.controller.delete_notification(id).await
    }

    pub async fn sync_unread(&self) -> Result<usize> {
        self.controller.sync_unread().await
    }

    /// Compare local aggregates against the server and adopt its values on
    /// drift.
    pub async fn reconcile(&self) -> Result<bool> {
        self.controller.reconcile().await
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.controller.snapshot().await
    }

    pub async fn get(&self, id: &str) -> Option<Notification> {
        self.controller.get(id).await
    }

    pub async fn unread_count(&self) -> usize {
        self.controller.unread_count().await
    }

    pub async fn stats(&self) -> NotificationStats {
        self.controller.stats().await
    }

    /// Client-side free-text search over the loaded collection.
    pub async fn search(&self, text: &str) -> Vec<Notification> {
        self.controller.search(text).await
    }

    /// Signal that fires whenever the local collection changes.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.controller.updates()
    }

    /// Observe the push channel lifecycle.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.state()
    }

    /// Stop the background tasks and close the push channel. Idempotent.
    pub fn shutdown(&self) {
        info!("notification client shutting down");
        self.shutdown.cancel();
        self.channel.disconnect();
    }
}

// The transport trait object is not Debug, so derive is unavailable
impl fmt::Debug for NotificationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationClient")
            .field("connection_state", &*self.channel.state().borrow())
            .finish_non_exhaustive()
    }
}

impl Drop for NotificationClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.channel.disconnect();
    }
}

/// Periodic stats reconciliation against the server.
async fn run_reconcile_loop(
    controller: Arc<SyncController>,
    interval_secs: u64,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    // The first tick fires immediately and the initial load just happened
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match controller.reconcile().await {
                    Ok(true) => warn!("reconcile corrected aggregate drift"),
                    Ok(false) => {}
                    Err(e) => error!("reconcile failed: {}", e),
                }
            }
            _ = shutdown.cancelled() => {
                info!("reconcile loop shutting down");
                break;
            }
        }
    }
}
