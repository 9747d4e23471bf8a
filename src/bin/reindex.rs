use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_api::{config::AppConfig, services::search_sync, state::AppState};

/// Rebuilds the search index from the database.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marketplace_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let state = AppState::from_config(config).await?;

    let indexed = search_sync::reindex(&state).await?;
    println!("Indexed {indexed} items");
    Ok(())
}
