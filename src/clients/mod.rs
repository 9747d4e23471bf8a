//! Handles for the services the marketplace talks to over the network.
//!
//! Each collaborator sits behind a trait so request handlers receive an
//! explicitly constructed client through [`crate::state::AppState`] and tests
//! can swap in in-process fakes.

use thiserror::Error;

pub mod notifier;
pub mod payment;
pub mod search;
pub mod storage;

pub use notifier::{BotWebhook, Notifier};
pub use payment::{PaymentGateway, StripeClient};
pub use search::{MeiliSearch, SearchIndex};
pub use storage::{ObjectStore, R2Store};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} rejected request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}
