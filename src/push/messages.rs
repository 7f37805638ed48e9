//! Wire frames exchanged over the push channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::store::Notification;

/// Frame type strings used on the wire.
pub mod event_types {
    pub const NOTIFICATION_NEW: &str = "notification:new";
    pub const NOTIFICATION_READ: &str = "notification:read";
    pub const NOTIFICATION_DELETED: &str = "notification:deleted";
}

/// Raw `{ "type": ..., "payload": ... }` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl Frame {
    pub fn new(frame_type: impl Into<String>, payload: Value) -> Self {
        Self {
            frame_type: frame_type.into(),
            payload,
        }
    }
}

/// A decoded server push event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A new notification was created.
    Created(Notification),
    /// The notification with this id was read on another device.
    Read(String),
    /// The notification with this id was deleted.
    Deleted(String),
}

impl PushEvent {
    /// Decode one frame of wire text.
    ///
    /// Returns `Ok(None)` for frame types this client does not know, so a
    /// newer server cannot break an older client. A recognized type with an
    /// undecodable payload is an error; the caller logs and drops it.
    pub fn parse(text: &str) -> Result<Option<PushEvent>> {
        let frame: Frame = serde_json::from_str(text)
            .map_err(|e| ClientError::MalformedPush(format!("invalid frame: {}", e)))?;

        match frame.frame_type.as_str() {
            event_types::NOTIFICATION_NEW => {
                let notification: Notification = serde_json::from_value(frame.payload)
                    .map_err(|e| {
                        ClientError::MalformedPush(format!("invalid notification payload: {}", e))
                    })?;
                Ok(Some(PushEvent::Created(notification)))
            }
            event_types::NOTIFICATION_READ => Ok(Some(PushEvent::Read(id_from(&frame.payload)?))),
            event_types::NOTIFICATION_DELETED => {
                Ok(Some(PushEvent::Deleted(id_from(&frame.payload)?)))
            }
            _ => Ok(None),
        }
    }
}

/// Accepts either a bare id string or an `{ "id": ... }` object.
fn id_from(payload: &Value) -> Result<String> {
    match payload {
        Value::String(id) if !id.is_empty() => Ok(id.clone()),
        Value::Object(map) => match map.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            _ => Err(ClientError::MalformedPush(
                "payload object carries no id".to_string(),
            )),
        },
        _ => Err(ClientError::MalformedPush(
            "payload carries no id".to_string(),
        )),
    }
}
