use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PurchaseRequest {
    pub item_id: Uuid,
    pub address_id: Uuid,
}

/// Query carried back on the processor success URL (or built directly for
/// manual-payment items).
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurchaseCallback {
    pub item_id: Uuid,
    pub address_id: Uuid,
    pub session_id: Option<String>,
    /// Balance reserved for a split payment.
    pub points: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TopupRequest {
    pub points: i64,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TopupCallback {
    pub session_id: String,
    pub points: i64,
}

/// Where the client goes next, and the order when one was created.
#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseOutcome {
    pub redirect: String,
    pub order: Option<Order>,
}
