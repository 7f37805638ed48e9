//! HTTP implementation of the notification API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::NotificationApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::store::{Notification, NotificationFilter, NotificationStats};

/// `{ "data": [...] }` envelope used by the list endpoints.
#[derive(Deserialize)]
struct ListResponse {
    data: Vec<Notification>,
}

#[derive(Deserialize)]
struct UnreadResponse {
    data: Vec<Notification>,
    count: usize,
}

#[derive(Deserialize)]
struct MarkAllResponse {
    updated: usize,
}

/// `{ "error": { "message": "..." } }` body returned on failures.
#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Notification API over HTTP with bearer authentication.
///
/// Performs exactly one request per call. Connection and timeout failures
/// become `ClientError::Network`, a 401 becomes `Unauthenticated`, and any
/// other non-2xx status becomes `Api` with the server message when the body
/// carries one.
pub struct HttpNotificationApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl HttpNotificationApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(format!("failed to create HTTP client: {}", e)))?;

        // Ensure base_url doesn't have trailing slash
        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 401 {
            return Err(ClientError::Unauthenticated);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(ClientError::api(status.as_u16(), message))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("failed to parse response body: {}", e)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_all(&self, filter: Option<&NotificationFilter>) -> Result<Vec<Notification>> {
        let mut path = "/notifications".to_string();
        if let Some(filter) = filter {
            let query = filter.to_query_string();
            if !query.is_empty() {
                path = format!("{}?{}", path, query);
            }
        }
        debug!(path = %path, "fetching notifications");
        let response: ListResponse = self.get_json(&path).await?;
        Ok(response.data)
    }

    async fn fetch_unread(&self) -> Result<(Vec<Notification>, usize)> {
        let response: UnreadResponse = self.get_json("/notifications/unread").await?;
        Ok((response.data, response.count))
    }

    async fn fetch_stats(&self) -> Result<NotificationStats> {
        self.get_json("/notifications/stats").await
    }

    async fn mark_read(&self, id: &str) -> Result<bool> {
        let response = self
            .client
            .put(self.url(&format!("/notifications/{}/read", id)))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        // The notification may have been deleted elsewhere in the meantime
        if response.status().as_u16() == 404 {
            debug!(id = %id, "mark-read target no longer exists");
            return Ok(false);
        }
        self.check_status(response).await?;
        Ok(true)
    }

    async fn mark_all_read(&self) -> Result<usize> {
        let response = self
            .client
            .put(self.url("/notifications/read-all"))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let body: MarkAllResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("failed to parse response body: {}", e)))?;
        Ok(body.updated)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let response = self
            .client
            .delete(self.url(&format!("/notifications/{}", id)))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            debug!(id = %id, "delete target no longer exists");
            return Ok(false);
        }
        self.check_status(response).await?;
        Ok(true)
    }
}
