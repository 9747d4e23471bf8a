//! Listing search backed by a Meilisearch index.
//!
//! The relational store stays authoritative; the index is a denormalized,
//! best-effort mirror of unsold and sold items used for full-text browsing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ClientError, ClientResult, http_client};

pub const SORTABLE_ATTRIBUTES: [&str; 3] = ["createdAt", "price", "favorites"];
pub const FILTERABLE_ATTRIBUTES: [&str; 7] = [
    "state", "shipping", "points", "price", "order", "category", "userId",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentImage {
    pub id: Uuid,
    pub format: String,
}

/// Search document for one item. Field names follow the index schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemDocument {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub state: String,
    pub shipping: String,
    pub category: i32,
    pub delivery_days: i32,
    pub points: bool,
    pub price: i64,
    /// Whether an order exists for the item.
    pub order: bool,
    pub image: Option<DocumentImage>,
    pub favorites: i64,
    pub user_id: Uuid,
    /// Unix seconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub q: String,
    pub filter: Vec<String>,
    pub sort: Vec<String>,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<ItemDocument>,
    pub total: i64,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Adds or replaces documents by id.
    async fn upsert(&self, docs: &[ItemDocument]) -> ClientResult<()>;

    async fn delete(&self, id: Uuid) -> ClientResult<()>;

    /// Bulk delete with an index filter expression, e.g. `userId = "..."`.
    async fn delete_by_filter(&self, filter: &str) -> ClientResult<()>;

    async fn search(&self, req: &SearchRequest) -> ClientResult<SearchPage>;

    /// Applies sortable and filterable attribute settings.
    async fn configure(&self) -> ClientResult<()>;

    /// Drops every document; used before a full rebuild.
    async fn clear(&self) -> ClientResult<()>;
}

pub fn user_filter(user_id: Uuid) -> String {
    format!("userId = \"{user_id}\"")
}

pub struct MeiliSearch {
    http: reqwest::Client,
    host: String,
    api_key: String,
    index: String,
}

impl MeiliSearch {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            http: http_client(),
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            index: index.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/indexes/{}{}", self.host, self.index, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> ClientResult<reqwest::Response> {
        let resp = self.authed(builder).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::Rejected {
            service: "meilisearch",
            message,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    hits: Vec<ItemDocument>,
    estimated_total_hits: Option<i64>,
}

#[async_trait]
impl SearchIndex for MeiliSearch {
    async fn upsert(&self, docs: &[ItemDocument]) -> ClientResult<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let builder = self
            .http
            .post(self.url("/documents"))
            .query(&[("primaryKey", "id")])
            .json(docs);
        self.send(builder).await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> ClientResult<()> {
        self.send(self.http.delete(self.url(&format!("/documents/{id}"))))
            .await?;
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &str) -> ClientResult<()> {
        let builder = self
            .http
            .post(self.url("/documents/delete"))
            .json(&json!({ "filter": filter }));
        self.send(builder).await?;
        Ok(())
    }

    async fn search(&self, req: &SearchRequest) -> ClientResult<SearchPage> {
        let mut body = json!({
            "q": req.q,
            "limit": req.limit,
            "offset": req.offset,
        });
        if !req.filter.is_empty() {
            body["filter"] = json!(req.filter);
        }
        if !req.sort.is_empty() {
            body["sort"] = json!(req.sort);
        }
        let resp = self
            .send(self.http.post(self.url("/search")).json(&body))
            .await?;
        let parsed: SearchResponse = resp.json().await?;
        let total = parsed.estimated_total_hits.unwrap_or(parsed.hits.len() as i64);
        Ok(SearchPage {
            hits: parsed.hits,
            total,
        })
    }

    async fn configure(&self) -> ClientResult<()> {
        self.send(
            self.http
                .put(self.url("/settings/sortable-attributes"))
                .json(&SORTABLE_ATTRIBUTES),
        )
        .await?;
        self.send(
            self.http
                .put(self.url("/settings/filterable-attributes"))
                .json(&FILTERABLE_ATTRIBUTES),
        )
        .await?;
        Ok(())
    }

    async fn clear(&self) -> ClientResult<()> {
        self.send(self.http.delete(self.url("/documents"))).await?;
        Ok(())
    }
}
