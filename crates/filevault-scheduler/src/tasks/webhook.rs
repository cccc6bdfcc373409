//! Webhook delivery task and its HTTP sender.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use sha2::Sha256;

use filevault_core::config::WebhookConfig;
use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::traits::WebhookSender;
use filevault_entity::job::status::JobType;

use crate::registry::{TaskContext, TaskError, TaskHandler};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-FileVault-Signature";

/// Handles `webhook` jobs
#[derive(Debug)]
pub struct WebhookTask {
    sender: Arc<dyn WebhookSender>,
}

impl WebhookTask {
    /// Create a new webhook task
    pub fn new(sender: Arc<dyn WebhookSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl TaskHandler for WebhookTask {
    fn job_type(&self) -> JobType {
        JobType::Webhook
    }

    async fn execute(&self, ctx: TaskContext) -> Result<Option<Value>, TaskError> {
        let url = match ctx.config.get("url").and_then(Value::as_str) {
            Some(url) => parse_target(url)?,
            None => return Err(TaskError::InvalidConfig("'url' is required".to_string())),
        };

        let payload = match ctx.config.get("payload") {
            None | Some(Value::Null) => json!({}),
            Some(payload) => payload.clone(),
        };

        let secret = match ctx.config.get("secret") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            Some(_) => {
                return Err(TaskError::InvalidConfig(
                    "'secret' must be a non-empty string".to_string(),
                ));
            }
        };

        self.sender
            .deliver(url.as_str(), &payload, secret)
            .await?;

        tracing::info!("Delivered webhook to {}", url.host_str().unwrap_or_default());

        Ok(Some(json!({
            "url": url.as_str(),
            "signed": secret.is_some(),
        })))
    }
}

fn parse_target(raw: &str) -> Result<Url, TaskError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| TaskError::InvalidConfig(format!("'url' is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TaskError::InvalidConfig(format!(
            "'url' must use http or https, got '{other}'"
        ))),
    }
}

/// HMAC-SHA256 of `body` keyed by `secret`, hex encoded.
pub fn sign_payload(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::configuration("Invalid webhook secret"))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Delivers webhooks as JSON `POST` requests.
#[derive(Debug, Clone)]
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    /// Build a sender from the webhook settings.
    pub fn new(config: &WebhookConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build webhook HTTP client",
                    e,
                )
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn deliver(&self, url: &str, payload: &Value, secret: Option<&str>) -> AppResult<()> {
        let body = serde_json::to_vec(payload).map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Failed to encode webhook payload", e)
        })?;

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            request = request.header(
                SIGNATURE_HEADER,
                format!("sha256={}", sign_payload(secret, &body)?),
            );
        }

        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::with_source(ErrorKind::Timeout, "Webhook request timed out", e)
            } else {
                AppError::with_source(ErrorKind::ExternalService, "Webhook request failed", e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external_service(format!(
                "Webhook endpoint responded with {status}"
            )));
        }

        tracing::debug!(status = %status, "Webhook accepted");
        Ok(())
    }
}
