//! Item purchase settlement.
//!
//! Every path validates the buyer and the item, then settles in a single
//! transaction: the item row is locked, exclusivity is re-checked, points
//! move with a conditional update and the order is inserted. Notifications,
//! search mirroring and audit logging run after commit and never fail the
//! purchase.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    clients::{
        ClientError,
        notifier::{ItemSummary, OrderSummary, PurchaseNotice},
        payment::CheckoutRequest,
    },
    db::is_unique_violation,
    dto::purchase::{PurchaseCallback, PurchaseOutcome, PurchaseRequest},
    entity::{
        Addresses, Items, Orders, Users, addresses, items,
        orders::{self, ActiveModel as OrderActive},
        users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::{
        active_user,
        item_service::{find_item, first_image_url},
        order_service::release_lapsed,
        search_sync,
    },
    settlement::{
        ItemTerms, POINTS_SESSION, PaymentRoute, manual_payment_deadline, route_callback,
        route_checkout, route_point_purchase, verify_session,
    },
    state::AppState,
};

/// Buyer, item and seller of a purchase that passed validation.
struct Purchase {
    buyer: users::Model,
    item: items::Model,
    seller: users::Model,
    address_id: Uuid,
}

pub fn completion_path(item_id: Uuid, order_id: Uuid) -> String {
    format!("/purchase/complete?item_id={item_id}&order_id={order_id}")
}

fn callback_url(public_url: &str, item_id: Uuid, address_id: Uuid, points: i64) -> String {
    let mut url = format!(
        "{}/api/purchase/callback?item_id={item_id}&address_id={address_id}",
        public_url.trim_end_matches('/')
    );
    if points > 0 {
        url.push_str(&format!("&points={points}"));
    }
    url
}

async fn validate<C: ConnectionTrait>(
    conn: &C,
    buyer_id: Uuid,
    item_id: Uuid,
    address_id: Uuid,
) -> AppResult<Purchase> {
    let buyer = active_user(conn, buyer_id).await?;
    let item = find_item(conn, item_id).await?;

    let sold = Orders::find()
        .filter(orders::Column::ItemId.eq(item.id))
        .count(conn)
        .await?;
    if sold > 0 {
        return Err(AppError::ItemAlreadyPurchased);
    }
    if item.user_id == buyer.id {
        return Err(AppError::BadRequest("cannot purchase your own item".into()));
    }

    Addresses::find_by_id(address_id)
        .filter(addresses::Column::UserId.eq(buyer.id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let seller = Users::find_by_id(item.user_id)
        .one(conn)
        .await?
        .filter(|seller| !seller.suspended)
        .ok_or(AppError::ItemNotFound)?;

    Ok(Purchase {
        buyer,
        item,
        seller,
        address_id,
    })
}

/// Creates a checkout session charging `charge`; `reserved_points` ride
/// along on the success URL for the callback to deduct.
async fn open_session(
    state: &AppState,
    purchase: &Purchase,
    charge: i64,
    reserved_points: i64,
) -> AppResult<PurchaseOutcome> {
    let destination = purchase
        .seller
        .payout_account_id
        .clone()
        .ok_or_else(|| AppError::BadRequest("seller cannot accept card payments".into()))?;

    let item = &purchase.item;
    let success_url = format!(
        "{}&session_id={{CHECKOUT_SESSION_ID}}",
        callback_url(
            &state.config.public_url,
            item.id,
            purchase.address_id,
            reserved_points
        )
    );
    let cancel_url = format!(
        "{}/purchase/{}?canceled=true",
        state.config.public_url.trim_end_matches('/'),
        item.id
    );

    let request = CheckoutRequest {
        product_name: item.name.clone(),
        image_url: first_image_url(state, item.id).await?,
        unit_amount: charge,
        currency: state.config.currency.clone(),
        destination: Some(destination),
        client_reference_id: item.id.to_string(),
        success_url,
        cancel_url,
    };
    let session = state.payments.create_checkout_session(&request).await?;
    let redirect = session.url.ok_or(ClientError::Rejected {
        service: "stripe",
        message: "checkout session has no url".into(),
    })?;

    tracing::info!(
        item_id = %item.id,
        buyer_id = %purchase.buyer.id,
        session_id = %session.id,
        charge,
        reserved_points,
        "checkout session created"
    );

    Ok(PurchaseOutcome {
        redirect,
        order: None,
    })
}

/// Moves `points` from buyer to seller and records the order, all or
/// nothing.
async fn settle(
    state: &AppState,
    buyer_id: Uuid,
    item_id: Uuid,
    address_id: Uuid,
    session_id: Option<String>,
    points: i64,
    manual_payment: bool,
) -> AppResult<orders::Model> {
    let txn = state.orm.begin().await?;

    let item = Items::find_by_id(item_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::ItemNotFound)?;

    Orders::delete_many()
        .filter(orders::Column::ItemId.eq(item.id))
        .filter(orders::Column::ExpiresAt.lte(DateTime::<FixedOffset>::from(Utc::now())))
        .exec(&txn)
        .await?;
    let existing = Orders::find()
        .filter(orders::Column::ItemId.eq(item.id))
        .count(&txn)
        .await?;
    if existing > 0 {
        return Err(AppError::ItemAlreadyPurchased);
    }

    if points > 0 {
        let debit = Users::update_many()
            .col_expr(
                users::Column::Points,
                Expr::col(users::Column::Points).sub(points),
            )
            .filter(users::Column::Id.eq(buyer_id))
            .filter(users::Column::Points.gte(points))
            .exec(&txn)
            .await?;
        if debit.rows_affected == 0 {
            return Err(AppError::InsufficientPoints);
        }

        Users::update_many()
            .col_expr(
                users::Column::Points,
                Expr::col(users::Column::Points).add(points),
            )
            .filter(users::Column::Id.eq(item.user_id))
            .exec(&txn)
            .await?;
    }

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(buyer_id),
        item_id: Set(item.id),
        address_id: Set(address_id),
        session_id: Set(session_id),
        expires_at: Set(manual_payment.then(|| manual_payment_deadline(now).into())),
        shipped: Set(false),
        complete: Set(false),
        tracking: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let order = record_order(&txn, order).await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        item_id = %item.id,
        buyer_id = %buyer_id,
        points,
        "order settled"
    );
    Ok(order)
}

/// Inserts an order row. The unique index on `orders.item_id` turns a second
/// order for the same item into `ItemAlreadyPurchased`.
pub async fn record_order<C: ConnectionTrait>(
    conn: &C,
    order: OrderActive,
) -> AppResult<orders::Model> {
    order.insert(conn).await.map_err(|err| {
        if is_unique_violation(&err) {
            AppError::ItemAlreadyPurchased
        } else {
            err.into()
        }
    })
}

async fn after_settlement(state: &AppState, purchase: &Purchase, order: &orders::Model, points: i64) {
    let image = match first_image_url(state, purchase.item.id).await {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(error = %err, "image lookup for notification failed");
            None
        }
    };
    let notice = PurchaseNotice {
        seller_id: purchase.seller.id,
        buyer_id: purchase.buyer.id,
        item: ItemSummary {
            id: purchase.item.id,
            name: purchase.item.name.clone(),
            price: purchase.item.price,
            image,
        },
        order: OrderSummary {
            id: order.id,
            created_at: order.created_at.with_timezone(&Utc),
        },
    };
    if let Err(err) = state.notifier.purchase(&notice).await {
        tracing::warn!(error = %err, order_id = %order.id, "purchase notification failed");
    }

    search_sync::mirror_item(state, purchase.item.id).await;

    audit::record(
        &state.orm,
        Some(purchase.buyer.id),
        "purchase",
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "item_id": purchase.item.id,
            "points": points,
        }),
    )
    .await;
}

async fn settle_purchase(
    state: &AppState,
    purchase: Purchase,
    route: PaymentRoute,
    session_id: Option<String>,
) -> AppResult<ApiResponse<PurchaseOutcome>> {
    let points = route.reserved_points(purchase.item.price);
    let manual_payment = matches!(route, PaymentRoute::ManualTransfer);

    let order = settle(
        state,
        purchase.buyer.id,
        purchase.item.id,
        purchase.address_id,
        session_id,
        points,
        manual_payment,
    )
    .await?;

    after_settlement(state, &purchase, &order, points).await;

    Ok(ApiResponse::success(
        "Purchase complete",
        PurchaseOutcome {
            redirect: completion_path(order.item_id, order.id),
            order: Some(order.into()),
        },
        Some(Meta::empty()),
    ))
}

/// First leg of a card purchase: returns the processor checkout page, or
/// the callback itself for items paid outside the platform.
pub async fn start_checkout(
    state: &AppState,
    user: &AuthUser,
    payload: PurchaseRequest,
) -> AppResult<ApiResponse<PurchaseOutcome>> {
    release_lapsed(state, payload.item_id).await?;
    let purchase = validate(&state.orm, user.user_id, payload.item_id, payload.address_id).await?;

    let outcome = match route_checkout(ItemTerms::from(&purchase.item)) {
        PaymentRoute::Processor {
            charge,
            reserved_points,
        } => open_session(state, &purchase, charge, reserved_points).await?,
        PaymentRoute::ManualTransfer | PaymentRoute::Points => PurchaseOutcome {
            redirect: callback_url(
                &state.config.public_url,
                purchase.item.id,
                purchase.address_id,
                0,
            ),
            order: None,
        },
    };

    Ok(ApiResponse::success(
        "Checkout started",
        outcome,
        Some(Meta::empty()),
    ))
}

/// Second leg: the processor (or the manual-payment shortcut) sends the
/// buyer back here.
pub async fn complete_checkout(
    state: &AppState,
    user: &AuthUser,
    callback: PurchaseCallback,
) -> AppResult<ApiResponse<PurchaseOutcome>> {
    let session_id = callback.session_id.filter(|s| !s.trim().is_empty());

    // A reloaded success page finds the order it already created.
    if let Some(session_id) = session_id.as_deref() {
        let replay = Orders::find()
            .filter(orders::Column::SessionId.eq(session_id))
            .filter(orders::Column::UserId.eq(user.user_id))
            .filter(orders::Column::ItemId.eq(callback.item_id))
            .one(&state.orm)
            .await?;
        if let Some(order) = replay {
            return Ok(ApiResponse::success(
                "Purchase complete",
                PurchaseOutcome {
                    redirect: completion_path(order.item_id, order.id),
                    order: Some(order.into()),
                },
                Some(Meta::empty()),
            ));
        }
    }

    release_lapsed(state, callback.item_id).await?;
    let purchase = validate(
        &state.orm,
        user.user_id,
        callback.item_id,
        callback.address_id,
    )
    .await?;

    let terms = ItemTerms::from(&purchase.item);
    let route = route_callback(terms, callback.points.unwrap_or(0))?;

    let session_id = match route {
        PaymentRoute::Processor { charge, .. } => {
            let session_id = session_id
                .ok_or_else(|| AppError::BadRequest("missing session_id".into()))?;
            let status = state.payments.retrieve_checkout_session(&session_id).await?;
            verify_session(&status, charge, &purchase.item.id.to_string())?;
            Some(session_id)
        }
        PaymentRoute::ManualTransfer | PaymentRoute::Points => None,
    };

    settle_purchase(state, purchase, route, session_id).await
}

/// Pays from the point balance, falling back to a split card payment for
/// the shortfall when the item allows it.
pub async fn purchase_with_points(
    state: &AppState,
    user: &AuthUser,
    payload: PurchaseRequest,
) -> AppResult<ApiResponse<PurchaseOutcome>> {
    release_lapsed(state, payload.item_id).await?;
    let purchase = validate(&state.orm, user.user_id, payload.item_id, payload.address_id).await?;

    let route = route_point_purchase(ItemTerms::from(&purchase.item), purchase.buyer.points)?;
    match route {
        PaymentRoute::Points => {
            settle_purchase(state, purchase, route, Some(POINTS_SESSION.to_string())).await
        }
        PaymentRoute::Processor {
            charge,
            reserved_points,
        } => {
            let outcome = open_session(state, &purchase, charge, reserved_points).await?;
            Ok(ApiResponse::success(
                "Checkout started",
                outcome,
                Some(Meta::empty()),
            ))
        }
        PaymentRoute::ManualTransfer => Err(AppError::Internal(anyhow::anyhow!(
            "point purchase routed to manual transfer"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_url_carries_reserved_points_only_when_present() {
        let item = Uuid::nil();
        let address = Uuid::nil();
        assert_eq!(
            callback_url("https://shop.test/", item, address, 0),
            format!("https://shop.test/api/purchase/callback?item_id={item}&address_id={address}")
        );
        assert!(callback_url("https://shop.test", item, address, 300).ends_with("&points=300"));
    }

    #[test]
    fn completion_path_names_item_and_order() {
        let id = Uuid::nil();
        assert_eq!(
            completion_path(id, id),
            format!("/purchase/complete?item_id={id}&order_id={id}")
        );
    }
}
