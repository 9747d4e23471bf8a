use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Origin used to build processor callback and cancel URLs.
    pub public_url: String,
    pub currency: String,
    pub stripe_secret_key: String,
    pub meilisearch_host: String,
    pub meilisearch_api_key: String,
    pub meilisearch_index: String,
    pub r2_endpoint: String,
    pub r2_bucket: String,
    pub r2_access_key_id: String,
    pub r2_secret_access_key: String,
    pub r2_public_url: String,
    pub bot_webhook_url: String,
    pub bot_webhook_secret: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            public_url: var_or("PUBLIC_URL", "http://localhost:3000"),
            currency: var_or("CURRENCY", "jpy"),
            stripe_secret_key: var_or("STRIPE_SECRET_KEY", ""),
            meilisearch_host: var_or("MEILISEARCH_HOST", "http://localhost:7700"),
            meilisearch_api_key: var_or("MEILISEARCH_API_KEY", ""),
            meilisearch_index: var_or("MEILISEARCH_INDEX", "items"),
            r2_endpoint: var_or("R2_ENDPOINT", ""),
            r2_bucket: var_or("R2_BUCKET", "marketplace"),
            r2_access_key_id: var_or("R2_ACCESS_KEY_ID", ""),
            r2_secret_access_key: var_or("R2_SECRET_ACCESS_KEY", ""),
            r2_public_url: var_or("R2_PUBLIC_URL", ""),
            bot_webhook_url: var_or("BOT_WEBHOOK_URL", ""),
            bot_webhook_secret: var_or("BOT_WEBHOOK_SECRET", ""),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
