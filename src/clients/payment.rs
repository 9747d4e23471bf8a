//! Payment processor integration via the Stripe REST API (no SDK dependency).

use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};

use super::{ClientError, ClientResult, http_client};

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// One-line-item checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub product_name: String,
    pub image_url: Option<String>,
    pub unit_amount: i64,
    pub currency: String,
    /// Connected account that receives the transfer; `None` keeps the funds
    /// on the platform (point top-ups).
    pub destination: Option<String>,
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// The fields of a retrieved session that settlement trusts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionStatus {
    pub id: String,
    pub payment_status: String,
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub client_reference_id: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, req: &CheckoutRequest) -> ClientResult<CheckoutSession>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> ClientResult<SessionStatus>;

    /// Creates an express connected account and returns its id.
    async fn create_connected_account(&self, display_name: &str) -> ClientResult<String>;

    async fn create_onboarding_link(&self, account_id: &str, return_url: &str)
    -> ClientResult<String>;

    async fn create_login_link(&self, account_id: &str) -> ClientResult<String>;
}

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: http_client(),
            secret_key: secret_key.into(),
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> ClientResult<T> {
        let resp = self
            .http
            .post(format!("{STRIPE_API}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await?;
        decode(resp).await
    }
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct UrlOnly {
    url: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> ClientResult<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }
    let message = match resp.json::<StripeErrorBody>().await {
        Ok(body) => body.error.message.unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    };
    Err(ClientError::Rejected {
        service: "stripe",
        message,
    })
}

fn kv(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Form body for `POST /v1/checkout/sessions`.
pub fn checkout_form(req: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        kv("mode", "payment"),
        kv("locale", "ja"),
        kv("line_items[0][quantity]", 1),
        kv("line_items[0][price_data][currency]", &req.currency),
        kv("line_items[0][price_data][unit_amount]", req.unit_amount),
        kv("line_items[0][price_data][product_data][name]", &req.product_name),
        kv("client_reference_id", &req.client_reference_id),
        kv("success_url", &req.success_url),
        kv("cancel_url", &req.cancel_url),
    ];
    if let Some(image) = &req.image_url {
        form.push(kv("line_items[0][price_data][product_data][images][0]", image));
    }
    if let Some(destination) = &req.destination {
        form.push(kv(
            "payment_intent_data[transfer_data][destination]",
            destination,
        ));
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(&self, req: &CheckoutRequest) -> ClientResult<CheckoutSession> {
        self.post_form("/checkout/sessions", &checkout_form(req)).await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> ClientResult<SessionStatus> {
        let resp = self
            .http
            .get(format!("{STRIPE_API}/checkout/sessions/{session_id}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;
        decode(resp).await
    }

    async fn create_connected_account(&self, display_name: &str) -> ClientResult<String> {
        let form = vec![
            kv("type", "express"),
            kv("country", "JP"),
            kv("business_type", "individual"),
            kv("default_currency", "jpy"),
            kv("capabilities[card_payments][requested]", true),
            kv("capabilities[transfers][requested]", true),
            kv("business_profile[name]", display_name),
        ];
        let account: IdOnly = self.post_form("/accounts", &form).await?;
        Ok(account.id)
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        return_url: &str,
    ) -> ClientResult<String> {
        let form = vec![
            kv("account", account_id),
            kv("refresh_url", return_url),
            kv("return_url", return_url),
            kv("type", "account_onboarding"),
        ];
        let link: UrlOnly = self.post_form("/account_links", &form).await?;
        Ok(link.url)
    }

    async fn create_login_link(&self, account_id: &str) -> ClientResult<String> {
        let link: UrlOnly = self
            .post_form(&format!("/accounts/{account_id}/login_links"), &[])
            .await?;
        Ok(link.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            product_name: "Vinyl".into(),
            image_url: None,
            unit_amount: 700,
            currency: "jpy".into(),
            destination: Some("acct_123".into()),
            client_reference_id: "item-1".into(),
            success_url: "https://shop.test/ok".into(),
            cancel_url: "https://shop.test/cancel".into(),
        }
    }

    #[test]
    fn checkout_form_carries_amount_and_destination() {
        let form = checkout_form(&request());
        assert!(form.contains(&kv("line_items[0][price_data][unit_amount]", 700)));
        assert!(form.contains(&kv(
            "payment_intent_data[transfer_data][destination]",
            "acct_123"
        )));
        assert!(
            !form
                .iter()
                .any(|(k, _)| k == "line_items[0][price_data][product_data][images][0]")
        );
    }

    #[test]
    fn checkout_form_without_destination_keeps_funds_on_platform() {
        let mut req = request();
        req.destination = None;
        let form = checkout_form(&req);
        assert!(!form.iter().any(|(k, _)| k.starts_with("payment_intent_data")));
    }

    #[test]
    fn session_status_parses_unexpanded_intent() {
        let raw = r#"{"id":"cs_1","payment_status":"paid","payment_intent":"pi_9","amount_total":1000,"client_reference_id":"abc","object":"checkout.session"}"#;
        let status: SessionStatus = serde_json::from_str(raw).expect("parse");
        assert_eq!(status.payment_intent.as_deref(), Some("pi_9"));
        assert_eq!(status.amount_total, Some(1000));
    }
}
