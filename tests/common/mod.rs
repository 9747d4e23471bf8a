#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, EntityTrait, Set};
use uuid::Uuid;

use marketplace_api::{
    clients::{
        ClientError, ClientResult, Notifier, ObjectStore, PaymentGateway, SearchIndex,
        notifier::{PointsNotice, PurchaseNotice, ReviewNotice},
        payment::{CheckoutRequest, CheckoutSession, SessionStatus},
        search::{ItemDocument, SearchPage, SearchRequest, user_filter},
    },
    config::AppConfig,
    db,
    entity::{Users, addresses, items, orders, users},
    middleware::auth::{ADMIN_ROLE, AuthUser, USER_ROLE},
    state::AppState,
};

pub const PUBLIC_URL: &str = "https://market.test";

#[derive(Default)]
pub struct FakePayments {
    pub sessions: Mutex<HashMap<String, SessionStatus>>,
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakePayments {
    /// Last checkout request and the id of the session created for it.
    pub fn last_session(&self) -> (String, CheckoutRequest) {
        let requests = self.requests.lock().unwrap();
        let request = requests.last().cloned().expect("no checkout session created");
        (format!("cs_test_{}", requests.len()), request)
    }

    pub fn set_payment_status(&self, session_id: &str, payment_status: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(session_id).expect("unknown session");
        session.payment_status = payment_status.to_string();
    }

    pub fn set_amount(&self, session_id: &str, amount: i64) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(session_id).expect("unknown session");
        session.amount_total = Some(amount);
    }

    /// Registers a paid session directly, as if the buyer had completed it.
    pub fn insert_paid(&self, session_id: &str, amount: i64, reference: &str) {
        self.sessions.lock().unwrap().insert(
            session_id.to_string(),
            SessionStatus {
                id: session_id.to_string(),
                payment_status: "paid".to_string(),
                payment_intent: Some(format!("pi_{session_id}")),
                amount_total: Some(amount),
                client_reference_id: Some(reference.to_string()),
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn create_checkout_session(&self, req: &CheckoutRequest) -> ClientResult<CheckoutSession> {
        let id = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(req.clone());
            format!("cs_test_{}", requests.len())
        };
        self.insert_paid(&id, req.unit_amount, &req.client_reference_id);
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.test/{id}")),
            id,
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> ClientResult<SessionStatus> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or(ClientError::Rejected {
                service: "stripe",
                message: format!("no such session {session_id}"),
            })
    }

    async fn create_connected_account(&self, _display_name: &str) -> ClientResult<String> {
        Ok("acct_test".to_string())
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        return_url: &str,
    ) -> ClientResult<String> {
        Ok(format!("https://connect.test/onboard/{account_id}?return={return_url}"))
    }

    async fn create_login_link(&self, account_id: &str) -> ClientResult<String> {
        Ok(format!("https://connect.test/login/{account_id}"))
    }
}

#[derive(Default)]
pub struct FakeSearch {
    pub docs: Mutex<HashMap<Uuid, ItemDocument>>,
}

impl FakeSearch {
    pub fn get(&self, id: Uuid) -> Option<ItemDocument> {
        self.docs.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchIndex for FakeSearch {
    async fn upsert(&self, docs: &[ItemDocument]) -> ClientResult<()> {
        let mut stored = self.docs.lock().unwrap();
        for doc in docs {
            stored.insert(doc.id, doc.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> ClientResult<()> {
        self.docs.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &str) -> ClientResult<()> {
        self.docs
            .lock()
            .unwrap()
            .retain(|_, doc| user_filter(doc.user_id) != filter);
        Ok(())
    }

    async fn search(&self, req: &SearchRequest) -> ClientResult<SearchPage> {
        let hits: Vec<ItemDocument> = self
            .docs
            .lock()
            .unwrap()
            .values()
            .filter(|doc| req.q.is_empty() || doc.name.contains(&req.q))
            .cloned()
            .collect();
        Ok(SearchPage {
            total: hits.len() as i64,
            hits,
        })
    }

    async fn configure(&self) -> ClientResult<()> {
        Ok(())
    }

    async fn clear(&self) -> ClientResult<()> {
        self.docs.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> ClientResult<()> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/{key}")
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub purchases: Mutex<Vec<PurchaseNotice>>,
    pub reviews: Mutex<Vec<ReviewNotice>>,
    pub points: Mutex<Vec<PointsNotice>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn purchase(&self, notice: &PurchaseNotice) -> ClientResult<()> {
        self.purchases.lock().unwrap().push(notice.clone());
        Ok(())
    }

    async fn review(&self, notice: &ReviewNotice) -> ClientResult<()> {
        self.reviews.lock().unwrap().push(notice.clone());
        Ok(())
    }

    async fn points(&self, notice: &PointsNotice) -> ClientResult<()> {
        self.points.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub payments: Arc<FakePayments>,
    pub search: Arc<FakeSearch>,
    pub storage: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: "test-secret".to_string(),
        public_url: PUBLIC_URL.to_string(),
        currency: "jpy".to_string(),
        stripe_secret_key: String::new(),
        meilisearch_host: String::new(),
        meilisearch_api_key: String::new(),
        meilisearch_index: "items".to_string(),
        r2_endpoint: String::new(),
        r2_bucket: "test".to_string(),
        r2_access_key_id: String::new(),
        r2_secret_access_key: String::new(),
        r2_public_url: "https://cdn.test".to_string(),
        bot_webhook_url: String::new(),
        bot_webhook_secret: String::new(),
    }
}

pub async fn setup() -> TestApp {
    // One connection keeps the in-memory database alive and serializes
    // transactions the way row locks would.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(options).await.expect("connect sqlite");
    db::create_schema(&orm).await.expect("create schema");

    let payments = Arc::new(FakePayments::default());
    let search = Arc::new(FakeSearch::default());
    let storage = Arc::new(MemoryStore::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let state = AppState {
        orm,
        config: Arc::new(test_config()),
        payments: payments.clone(),
        search: search.clone(),
        storage: storage.clone(),
        notifier: notifier.clone(),
    };

    TestApp {
        state,
        payments,
        search,
        storage,
        notifier,
    }
}

pub fn auth(user: &users::Model) -> AuthUser {
    AuthUser {
        user_id: user.id,
        role: user.role.clone(),
    }
}

async fn insert_user(app: &TestApp, name: &str, points: i64, role: &str) -> users::Model {
    users::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        avatar_url: Set(None),
        points: Set(points),
        suspended: Set(false),
        role: Set(role.to_string()),
        payout_account_id: Set(Some(format!("acct_{name}"))),
        created_at: Set(Utc::now().into()),
    }
    .insert(&app.state.orm)
    .await
    .expect("insert user")
}

pub async fn create_user(app: &TestApp, name: &str, points: i64) -> users::Model {
    insert_user(app, name, points, USER_ROLE).await
}

pub async fn create_admin(app: &TestApp, name: &str) -> users::Model {
    insert_user(app, name, 0, ADMIN_ROLE).await
}

pub async fn suspend(app: &TestApp, user: &users::Model) {
    let mut active: users::ActiveModel = user.clone().into();
    active.suspended = Set(true);
    active.update(&app.state.orm).await.expect("suspend user");
}

pub async fn points_of(app: &TestApp, user_id: Uuid) -> i64 {
    Users::find_by_id(user_id)
        .one(&app.state.orm)
        .await
        .expect("load user")
        .expect("user exists")
        .points
}

#[derive(Debug, Clone, Copy)]
pub struct Terms {
    pub price: i64,
    pub accepts_points: bool,
    pub processor_opt_out: bool,
}

impl Terms {
    pub fn card(price: i64) -> Self {
        Self {
            price,
            accepts_points: true,
            processor_opt_out: false,
        }
    }

    pub fn manual(price: i64) -> Self {
        Self {
            price,
            accepts_points: true,
            processor_opt_out: true,
        }
    }
}

pub async fn create_item(app: &TestApp, seller: &users::Model, terms: Terms) -> items::Model {
    let now = Utc::now();
    items::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(seller.id),
        name: Set("Used laptop".to_string()),
        description: Set("Works fine".to_string()),
        condition: Set("good".to_string()),
        shipping: Set("seller".to_string()),
        delivery_days: Set(3),
        category: Set(331),
        price: Set(terms.price),
        accepts_points: Set(terms.accepts_points),
        processor_opt_out: Set(terms.processor_opt_out),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&app.state.orm)
    .await
    .expect("insert item")
}

pub async fn create_address(app: &TestApp, user: &users::Model) -> addresses::Model {
    addresses::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        zip: Set("1000001".to_string()),
        prefecture: Set("Tokyo".to_string()),
        city: Set("Chiyoda".to_string()),
        street: Set("1-1".to_string()),
        building: Set(None),
        phone: Set("0312345678".to_string()),
        last_name: Set("Yamada".to_string()),
        first_name: Set("Taro".to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&app.state.orm)
    .await
    .expect("insert address")
}

/// A manual-payment order placed four days ago whose deadline has passed.
pub async fn create_lapsed_order(
    app: &TestApp,
    buyer: &users::Model,
    address: &addresses::Model,
    item: &items::Model,
) -> orders::Model {
    let placed = Utc::now() - Duration::days(4);
    orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(buyer.id),
        item_id: Set(item.id),
        address_id: Set(address.id),
        session_id: Set(None),
        expires_at: Set(Some((placed + Duration::days(3)).into())),
        shipped: Set(false),
        complete: Set(false),
        tracking: Set(None),
        created_at: Set(placed.into()),
        updated_at: Set(placed.into()),
    }
    .insert(&app.state.orm)
    .await
    .expect("insert lapsed order")
}
