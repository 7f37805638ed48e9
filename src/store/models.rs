//! Notification data models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ProcessAssigned,
    ProcessApproved,
    ProcessRejected,
    CommentAdded,
    DeadlineApproaching,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::ProcessAssigned => "process_assigned",
            NotificationType::ProcessApproved => "process_approved",
            NotificationType::ProcessRejected => "process_rejected",
            NotificationType::CommentAdded => "comment_added",
            NotificationType::DeadlineApproaching => "deadline_approaching",
            NotificationType::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "process_assigned" => Some(NotificationType::ProcessAssigned),
            "process_approved" => Some(NotificationType::ProcessApproved),
            "process_rejected" => Some(NotificationType::ProcessRejected),
            "comment_added" => Some(NotificationType::CommentAdded),
            "deadline_approaching" => Some(NotificationType::DeadlineApproaching),
            "system" => Some(NotificationType::System),
            _ => None,
        }
    }
}

/// A user notification, mirrored from the server.
///
/// The server is the only creator of notifications; the client mutates the
/// read flag and membership, using the id as the dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    /// Associated process, if the event originated from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
    /// Associated document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Display descriptor of who triggered the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Aggregates derived from the notification collection.
///
/// Invariants: `unread <= total` and the per-type counts sum to `total`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total: usize,
    pub unread: usize,
    #[serde(default, alias = "byType")]
    pub by_type: HashMap<NotificationType, usize>,
}

/// Ephemeral query descriptor, applied server-side or over the loaded
/// collection. Pure input; it has no lifecycle of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub read: Option<bool>,
    pub notification_type: Option<NotificationType>,
    pub search: Option<String>,
}

impl NotificationFilter {
    pub fn unread_only() -> Self {
        Self {
            read: Some(false),
            ..Default::default()
        }
    }

    pub fn by_type(notification_type: NotificationType) -> Self {
        Self {
            notification_type: Some(notification_type),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_none() && self.notification_type.is_none() && self.search.is_none()
    }

    /// Render the filter as a URL query string (no leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(read) = self.read {
            parts.push(format!("read={}", read));
        }
        if let Some(notification_type) = self.notification_type {
            parts.push(format!("type={}", notification_type.as_str()));
        }
        if let Some(search) = &self.search {
            if !search.is_empty() {
                parts.push(format!("search={}", urlencoding::encode(search)));
            }
        }
        parts.join("&")
    }
}
