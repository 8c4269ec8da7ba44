use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::decoder::DATA_PREFIX;
use crate::error::{CoreResult, RecallError};

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}
fn default_token_env() -> String {
    "RECALL_TOKEN".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApiCfg {
    /// Base URL of the presentation service, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable that contains the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for ApiCfg {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total timeout for JSON calls in milliseconds (default 60000ms).
    /// For generation it bounds only the wait for the response head, not the streamed body.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_data_prefix() -> String {
    DATA_PREFIX.to_string()
}
fn default_idle_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamCfg {
    #[serde(default = "default_data_prefix")]
    pub data_prefix: String,
    /// Longest silence between body chunks before the stream counts as aborted.
    /// 0 disables the check.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for StreamCfg {
    fn default() -> Self {
        Self {
            data_prefix: default_data_prefix(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl StreamCfg {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

fn default_activation_distance() -> f32 {
    1.0
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReorderCfg {
    /// Pointer travel required before a press becomes a drag.
    #[serde(default = "default_activation_distance")]
    pub activation_distance: f32,
}

impl Default for ReorderCfg {
    fn default() -> Self {
        Self {
            activation_distance: default_activation_distance(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiCfg,
    /// HTTP client configuration (timeouts, pooling). Missing → defaults.
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub stream: StreamCfg,
    #[serde(default)]
    pub reorder: ReorderCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(RecallError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| RecallError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Self>(s).map_err(|e| RecallError::Other(e.into()))?
            }
            Some("toml") => toml::from_str::<Self>(s).map_err(|e| RecallError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| RecallError::Other(e.into()))
                .or_else(|_| toml::from_str::<Self>(s).map_err(|e| RecallError::Other(e.into())))?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(RecallError::Validation("api.base_url is empty".into()));
        }
        if self.stream.data_prefix.is_empty() {
            return Err(RecallError::Validation("stream.data_prefix is empty".into()));
        }
        let d = self.reorder.activation_distance;
        if !d.is_finite() || d < 0.0 {
            return Err(RecallError::Validation(format!(
                "reorder.activation_distance must be a finite, non-negative number, got {d}"
            )));
        }
        Ok(())
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }
}
