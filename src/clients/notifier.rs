//! Outbound notifications to the community chat bot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ClientError, ClientResult, http_client};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSummary {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseNotice {
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub item: ItemSummary,
    pub order: OrderSummary,
}

/// Sent when the buyer leaves the first review; `user_id` is the seller who
/// now owes the closing review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNotice {
    pub user_id: Uuid,
    pub item: ItemSummary,
    pub order: OrderSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsNotice {
    pub user_id: Uuid,
    pub points: i64,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn purchase(&self, notice: &PurchaseNotice) -> ClientResult<()>;

    async fn review(&self, notice: &ReviewNotice) -> ClientResult<()>;

    async fn points(&self, notice: &PointsNotice) -> ClientResult<()>;
}

pub struct BotWebhook {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl BotWebhook {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> ClientResult<()> {
        if self.base_url.is_empty() {
            tracing::debug!(path, "bot webhook not configured, skipping");
            return Ok(());
        }
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret)
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::Rejected {
                service: "bot webhook",
                message: resp.status().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for BotWebhook {
    async fn purchase(&self, notice: &PurchaseNotice) -> ClientResult<()> {
        self.post("/purchase", notice).await
    }

    async fn review(&self, notice: &ReviewNotice) -> ClientResult<()> {
        self.post("/review", notice).await
    }

    async fn points(&self, notice: &PointsNotice) -> ClientResult<()> {
        self.post("/points", notice).await
    }
}
