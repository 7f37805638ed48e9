//! Flowdesk Notification Client Library
//!
//! Client-side synchronization engine for Flowdesk notifications: an HTTP
//! transport, a reconnecting WebSocket push channel, and an in-memory store
//! with optimistic mutations.

pub mod client;
pub mod config;
pub mod error;
pub mod push;
pub mod store;
pub mod sync;
pub mod transport;

// Re-export commonly used types for convenience
pub use client::NotificationClient;
pub use config::{ClientConfig, ClientOptions};
pub use error::{ClientError, Result};
pub use push::{ConnectionState, PushEvent};
pub use store::{Notification, NotificationFilter, NotificationStats, NotificationType};
pub use transport::{HttpNotificationApi, NotificationApi};
