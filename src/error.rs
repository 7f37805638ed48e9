//! Error taxonomy for the notification client.
//!
//! Transport and channel failures are normalized into `ClientError` at the
//! boundary where they occur. Callers decide recoverability from the variant,
//! never from provider-specific error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server could not be reached (DNS, connect, timeout).
    /// The store keeps its previous snapshot; the operation can be retried.
    #[error("network error: {0}")]
    Network(String),

    /// The server was reached but rejected the request.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The credential was rejected (HTTP 401). Kept distinct from `Api` so
    /// a credential-refresh collaborator is never confused with a not-found.
    #[error("unauthenticated")]
    Unauthenticated,

    /// An inbound push frame failed to parse. Logged and dropped by the
    /// channel, never delivered to subscribers.
    #[error("malformed push frame: {0}")]
    MalformedPush(String),

    /// The push channel spent its reconnect budget. Live updates are paused
    /// until an explicit reconnect; the store stays usable via manual refresh.
    #[error("push channel reconnect attempts exhausted")]
    ChannelExhausted,
}

impl ClientError {
    /// Returns true if the failed operation can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_) | ClientError::ChannelExhausted
        )
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        ClientError::Api {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        // Status-bearing responses are mapped by the transport adapter before
        // this conversion runs; anything that reaches it is connectivity.
        ClientError::Network(err.to_string())
    }
}
