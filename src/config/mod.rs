mod file_config;

pub use file_config::{FileConfig, ReconnectConfig};

use anyhow::{bail, Result};

/// Programmatic options for config resolution.
/// This struct mirrors the options that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub ws_path: Option<String>,
    pub reconcile_interval_secs: Option<u64>,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            auth_token: Some(auth_token.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    // Core settings
    pub base_url: String,
    pub auth_token: String,
    pub request_timeout_secs: u64,
    pub ws_path: String,
    /// Interval of the periodic stats reconciliation, 0 disables it.
    pub reconcile_interval_secs: u64,

    // Feature configs (with defaults)
    pub reconnect: ReconnectSettings,
}

impl ClientConfig {
    /// Resolve configuration from programmatic options and optional TOML
    /// file config. TOML values override programmatic values where present.
    pub fn resolve(options: &ClientOptions, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let base_url = file
            .base_url
            .or_else(|| options.base_url.clone())
            .ok_or_else(|| anyhow::anyhow!("base_url must be specified"))?;

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("base_url must use http or https: {}", base_url);
        }

        let auth_token = file
            .auth_token
            .or_else(|| options.auth_token.clone())
            .ok_or_else(|| anyhow::anyhow!("auth_token must be specified"))?;
        if auth_token.is_empty() {
            bail!("auth_token must not be empty");
        }

        let request_timeout_secs = file
            .request_timeout_secs
            .or(options.request_timeout_secs)
            .unwrap_or(30);
        let ws_path = file
            .ws_path
            .or_else(|| options.ws_path.clone())
            .unwrap_or_else(|| "/notifications/ws".to_string());
        let reconcile_interval_secs = file
            .reconcile_interval_secs
            .or(options.reconcile_interval_secs)
            .unwrap_or(300);

        // Reconnect settings - merge file config with defaults
        let rc_file = file.reconnect.unwrap_or_default();
        let reconnect = ReconnectSettings {
            max_attempts: rc_file.max_attempts.unwrap_or(10),
            initial_delay_ms: rc_file.initial_delay_ms.unwrap_or(1000),
            max_delay_ms: rc_file.max_delay_ms.unwrap_or(30000),
            multiplier: rc_file.multiplier.unwrap_or(2.0),
        };
        if reconnect.max_attempts == 0 {
            bail!("reconnect.max_attempts must be at least 1");
        }
        if reconnect.multiplier < 1.0 {
            bail!(
                "reconnect.multiplier must be at least 1.0, got {}",
                reconnect.multiplier
            );
        }
        if reconnect.max_delay_ms < reconnect.initial_delay_ms {
            bail!("reconnect.max_delay_ms must not be below initial_delay_ms");
        }

        Ok(Self {
            base_url,
            auth_token,
            request_timeout_secs,
            ws_path,
            reconcile_interval_secs,
            reconnect,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            auth_token: "test-token".to_string(),
            request_timeout_secs: 5,
            ws_path: "/notifications/ws".to_string(),
            reconcile_interval_secs: 0,
            reconnect: ReconnectSettings::default(),
        }
    }
}

/// Backoff parameters for the push channel reconnect loop.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 2.0,
        }
    }
}
