//! Client for the TeslaFi `lastGood` feed.

use crate::config::TeslaFiConfig;
use crate::error::{AppError, Result};
use crate::models::Payload;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Anything that can hand over one raw telemetry snapshot.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Payload>;
}

pub struct TeslaFiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl TeslaFiClient {
    pub fn new(cfg: &TeslaFiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
            token: cfg.token.clone(),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn feed_url(&self, token: &str) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(&self.base_url, &[("token", token), ("command", "lastGood")])
            .map_err(|e| AppError::Config(format!("invalid teslafi base_url: {}", e)))
    }
}

#[async_trait]
impl TelemetrySource for TeslaFiClient {
    async fn fetch_snapshot(&self) -> Result<Payload> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| AppError::Upstream("TESLAFI_API_TOKEN is not configured".into()))?;
        let url = self.feed_url(token)?;

        debug!(host = url.host_str().unwrap_or_default(), "fetching snapshot");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!("HTTP {}", status)));
        }

        let body = response.bytes().await?;
        let payload = parse_snapshot(&body)?;
        let data_id = payload.get("data_id").cloned().unwrap_or(Value::Null);
        info!(%data_id, "fetched snapshot");
        Ok(payload)
    }
}

/// The feed must answer with a JSON object; anything else is a fetch failure.
pub fn parse_snapshot(body: &[u8]) -> Result<Payload> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Upstream(format!("malformed JSON body: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Upstream(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
