//! Request/response transport to the notification backend.

mod http;

pub use http::HttpNotificationApi;

use async_trait::async_trait;

use crate::error::Result;
use crate::store::{Notification, NotificationFilter, NotificationStats};

/// Trait for the notification REST surface.
///
/// One method per endpoint, no retries and no caching. Callers own retry
/// and rollback policy; implementations only normalize errors.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetch notifications, optionally narrowed by a filter.
    async fn fetch_all(&self, filter: Option<&NotificationFilter>) -> Result<Vec<Notification>>;

    /// Fetch unread notifications together with the server-side count.
    async fn fetch_unread(&self) -> Result<(Vec<Notification>, usize)>;

    /// Fetch server-computed aggregates.
    async fn fetch_stats(&self) -> Result<NotificationStats>;

    /// Mark one notification read. Returns false if the server no longer
    /// knows the id.
    async fn mark_read(&self, id: &str) -> Result<bool>;

    /// Mark all notifications read. Returns the number updated.
    async fn mark_all_read(&self) -> Result<usize>;

    /// Delete one notification. Returns false if the server no longer
    /// knows the id.
    async fn delete(&self, id: &str) -> Result<bool>;
}
