use std::sync::Arc;

use crate::{
    clients::{
        BotWebhook, MeiliSearch, Notifier, ObjectStore, PaymentGateway, R2Store, SearchIndex,
        StripeClient,
    },
    config::AppConfig,
    db::{OrmConn, create_orm_conn},
};

/// Everything a request handler needs, built once at startup and cloned into
/// each request.
#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub payments: Arc<dyn PaymentGateway>,
    pub search: Arc<dyn SearchIndex>,
    pub storage: Arc<dyn ObjectStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let orm = create_orm_conn(&config.database_url).await?;
        let payments = Arc::new(StripeClient::new(config.stripe_secret_key.clone()));
        let search = Arc::new(MeiliSearch::new(
            config.meilisearch_host.clone(),
            config.meilisearch_api_key.clone(),
            config.meilisearch_index.clone(),
        ));
        let storage = Arc::new(R2Store::new(
            &config.r2_endpoint,
            config.r2_bucket.clone(),
            &config.r2_access_key_id,
            &config.r2_secret_access_key,
            config.r2_public_url.clone(),
        ));
        let notifier = Arc::new(BotWebhook::new(
            config.bot_webhook_url.clone(),
            config.bot_webhook_secret.clone(),
        ));

        Ok(Self {
            orm,
            config: Arc::new(config),
            payments,
            search,
            storage,
            notifier,
        })
    }
}
