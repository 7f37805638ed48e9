//! Fixture builders for notifications and client configuration.

use chrono::Utc;
use flowdesk_notify::config::ReconnectSettings;
use flowdesk_notify::{ClientConfig, Notification, NotificationType};

use super::TEST_TOKEN;

/// Build a notification with the given id, type, and read flag.
pub fn notification(id: &str, notification_type: NotificationType, read: bool) -> Notification {
    Notification {
        id: id.to_string(),
        notification_type,
        title: format!("Notification {}", id),
        message: format!("Body of notification {}", id),
        created_at: Utc::now(),
        read,
        process_id: None,
        document_id: None,
        sender: None,
    }
}

/// Build a notification with a random id.
pub fn random_notification(notification_type: NotificationType) -> Notification {
    notification(&uuid::Uuid::new_v4().to_string(), notification_type, false)
}

/// Three-notification seed: two unread, one read.
pub fn seed_notifications() -> Vec<Notification> {
    vec![
        notification("n1", NotificationType::ProcessAssigned, false),
        notification("n2", NotificationType::CommentAdded, false),
        notification("n3", NotificationType::System, true),
    ]
}

/// Client configuration pointed at a test server, with fast reconnects.
pub fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        auth_token: TEST_TOKEN.to_string(),
        request_timeout_secs: 5,
        ws_path: "/notifications/ws".to_string(),
        reconcile_interval_secs: 0,
        reconnect: ReconnectSettings {
            max_attempts: 5,
            initial_delay_ms: 20,
            max_delay_ms: 100,
            multiplier: 2.0,
        },
    }
}
