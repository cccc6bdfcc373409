//! Outbound notification boundary.

use async_trait::async_trait;

use crate::result::AppResult;

/// Delivers a JSON payload to a subscriber URL.
#[async_trait]
pub trait WebhookSender: Send + Sync + std::fmt::Debug + 'static {
    /// Deliver `payload` to `url`, signing it with `secret` when present.
    async fn deliver(
        &self,
        url: &str,
        payload: &serde_json::Value,
        secret: Option<&str>,
    ) -> AppResult<()>;
}
