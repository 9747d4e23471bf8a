//! Post-purchase ledger: viewing orders, manual payment confirmation,
//! tracking, chat and the two-step review handshake.
//!
//! Manual-payment orders carry `expires_at`. Expiry is lazy: an order past
//! its deadline is deleted the next time it is read, and the item goes back
//! on sale.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    clients::notifier::{ItemSummary, OrderSummary, ReviewNotice},
    dto::orders::{ChatList, ChatRequest, OrderDetail, OrderList, ReviewRequest, TrackingRequest},
    entity::{
        Addresses, Chats, Items, Orders, Reviews,
        chats::{self, ActiveModel as ChatActive},
        items,
        orders::{self, ActiveModel as OrderActive},
        reviews::{self, ActiveModel as ReviewActive},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, Chat, Order, Review},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        active_user,
        item_service::{first_image_url, item_view},
        required_text, search_sync,
    },
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Buyer,
    Seller,
}

/// Which step of the review handshake an order is waiting for. Either
/// party may open it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    /// The first review marks the order shipped.
    FirstReview,
    /// The other party's review completes the transaction.
    SecondReview,
    Complete,
}

pub fn handshake_step(order: &orders::Model) -> HandshakeStep {
    match (order.shipped, order.complete) {
        (_, true) => HandshakeStep::Complete,
        (false, false) => HandshakeStep::FirstReview,
        (true, false) => HandshakeStep::SecondReview,
    }
}

fn is_expired(order: &orders::Model) -> bool {
    order
        .expires_at
        .is_some_and(|deadline| deadline.with_timezone(&Utc) <= Utc::now())
}

/// Deletes a lapsed manual-payment order and puts the item back on sale.
async fn expire(state: &AppState, order: &orders::Model) -> AppResult<()> {
    Orders::delete_by_id(order.id).exec(&state.orm).await?;
    tracing::info!(order_id = %order.id, item_id = %order.item_id, "order expired");
    search_sync::mirror_item(state, order.item_id).await;
    audit::record(
        &state.orm,
        None,
        "order_expired",
        "orders",
        serde_json::json!({ "order_id": order.id, "item_id": order.item_id }),
    )
    .await;
    Ok(())
}

/// Clears a lapsed manual-payment order holding `item_id`, so the item can
/// be bought again without either party opening the order first.
pub(crate) async fn release_lapsed(state: &AppState, item_id: Uuid) -> AppResult<()> {
    sweep_expired(state, Condition::all().add(orders::Column::ItemId.eq(item_id))).await
}

async fn sweep_expired(state: &AppState, scope: Condition) -> AppResult<()> {
    let pending = Orders::find()
        .filter(scope)
        .filter(orders::Column::ExpiresAt.is_not_null())
        .all(&state.orm)
        .await?;
    for order in pending.iter().filter(|o| is_expired(o)) {
        expire(state, order).await?;
    }
    Ok(())
}

struct Participation {
    order: orders::Model,
    item: items::Model,
    party: Party,
}

/// Loads an order the caller takes part in. Expired orders are removed and
/// reported as `OrderExpired`.
async fn participation(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<Participation> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let item = Items::find_by_id(order.item_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let party = if order.user_id == user.user_id {
        Party::Buyer
    } else if item.user_id == user.user_id {
        Party::Seller
    } else {
        return Err(AppError::Forbidden);
    };

    if is_expired(&order) {
        expire(state, &order).await?;
        return Err(AppError::OrderExpired);
    }

    Ok(Participation { order, item, party })
}

fn sold_by(seller_id: Uuid) -> Condition {
    let seller_items = Query::select()
        .column(items::Column::Id)
        .from(Items)
        .and_where(Expr::col(items::Column::UserId).eq(seller_id))
        .to_owned();
    Condition::all().add(orders::Column::ItemId.in_subquery(seller_items))
}

async fn list_orders(
    state: &AppState,
    scope: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    sweep_expired(state, scope.clone()).await?;

    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = scope;
    if let Some(complete) = query.complete {
        condition = condition.add(orders::Column::Complete.eq(complete));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(orders::Column::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(orders::Column::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn list_purchases(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let scope = Condition::all().add(orders::Column::UserId.eq(user.user_id));
    list_orders(state, scope, query).await
}

pub async fn list_sales(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    list_orders(state, sold_by(user.user_id), query).await
}

async fn chats_for<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<Chat>> {
    Ok(Chats::find()
        .filter(chats::Column::OrderId.eq(order_id))
        .order_by_asc(chats::Column::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(Chat::from)
        .collect())
}

pub async fn view_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let Participation { order, item, .. } = participation(state, user, id).await?;

    let address = Addresses::find_by_id(order.address_id)
        .one(&state.orm)
        .await?
        .map(Address::from);
    let reviews = Reviews::find()
        .filter(reviews::Column::OrderId.eq(order.id))
        .order_by_asc(reviews::Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();
    let chats = chats_for(&state.orm, order.id).await?;

    let detail = OrderDetail {
        item: item_view(&state.orm, state.storage.as_ref(), item).await?,
        order: order.into(),
        address,
        reviews,
        chats,
    };
    Ok(ApiResponse::success("Order found", detail, Some(Meta::empty())))
}

/// Seller acknowledges a manual payment; the order stops expiring.
pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    active_user(&state.orm, user.user_id).await?;
    let Participation { order, party, .. } = participation(state, user, id).await?;
    if party != Party::Seller {
        return Err(AppError::Forbidden);
    }
    if order.expires_at.is_none() {
        return Ok(ApiResponse::success(
            "Payment already confirmed",
            order.into(),
            Some(Meta::empty()),
        ));
    }

    let mut active: OrderActive = order.into();
    active.expires_at = Set(None);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_confirm",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment confirmed",
        order.into(),
        Some(Meta::empty()),
    ))
}

pub async fn set_tracking(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: TrackingRequest,
) -> AppResult<ApiResponse<Order>> {
    active_user(&state.orm, user.user_id).await?;
    let tracking = required_text(&payload.tracking, "tracking")?;
    let Participation { order, party, .. } = participation(state, user, id).await?;
    if party != Party::Seller {
        return Err(AppError::Forbidden);
    }
    if order.complete {
        return Err(AppError::BadRequest("transaction already complete".into()));
    }

    let mut active: OrderActive = order.into();
    active.tracking = Set(Some(tracking));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Tracking updated",
        order.into(),
        Some(Meta::empty()),
    ))
}

/// Records a review and advances the handshake. Whoever reviews first marks
/// the order shipped; the other party's review completes it.
pub async fn review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    active_user(&state.orm, user.user_id).await?;
    let text = required_text(&payload.text, "text")?;
    let Participation { order, item, party } = participation(state, user, id).await?;

    if order.expires_at.is_some() {
        return Err(AppError::BadRequest("payment not confirmed yet".into()));
    }

    let step = handshake_step(&order);
    let flag = match step {
        HandshakeStep::FirstReview => orders::Column::Shipped,
        HandshakeStep::SecondReview => {
            let reviewed = Reviews::find()
                .filter(reviews::Column::OrderId.eq(order.id))
                .filter(reviews::Column::UserId.eq(user.user_id))
                .count(&state.orm)
                .await?;
            if reviewed > 0 {
                return Err(AppError::BadRequest("waiting for the other party".into()));
            }
            orders::Column::Complete
        }
        HandshakeStep::Complete => {
            return Err(AppError::BadRequest("transaction already complete".into()));
        }
    };
    let target_user_id = match party {
        Party::Buyer => item.user_id,
        Party::Seller => order.user_id,
    };

    let txn = state.orm.begin().await?;

    // Guarded on the current flags so two racing reviews cannot both advance.
    let advanced = Orders::update_many()
        .col_expr(flag, Expr::value(true))
        .col_expr(
            orders::Column::UpdatedAt,
            Expr::value(DateTime::<FixedOffset>::from(Utc::now())),
        )
        .filter(orders::Column::Id.eq(order.id))
        .filter(orders::Column::Shipped.eq(order.shipped))
        .filter(orders::Column::Complete.eq(false))
        .exec(&txn)
        .await?;
    if advanced.rows_affected == 0 {
        return Err(AppError::BadRequest("waiting for the other party".into()));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        target_user_id: Set(target_user_id),
        item_id: Set(item.id),
        order_id: Set(order.id),
        rating: Set(payload.rating),
        text: Set(text),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, reviewer = %user.user_id, ?party, ?step, "review recorded");

    if step == HandshakeStep::FirstReview {
        let image = first_image_url(state, item.id).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "image lookup for notification failed");
            None
        });
        let notice = ReviewNotice {
            user_id: target_user_id,
            item: ItemSummary {
                id: item.id,
                name: item.name.clone(),
                price: item.price,
                image,
            },
            order: OrderSummary {
                id: order.id,
                created_at: order.created_at.with_timezone(&Utc),
            },
        };
        if let Err(err) = state.notifier.review(&notice).await {
            tracing::warn!(error = %err, order_id = %order.id, "review notification failed");
        }
    }

    Ok(ApiResponse::success(
        "Review recorded",
        review.into(),
        Some(Meta::empty()),
    ))
}

pub async fn post_chat(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ChatRequest,
) -> AppResult<ApiResponse<Chat>> {
    active_user(&state.orm, user.user_id).await?;
    let text = required_text(&payload.text, "text")?;
    let Participation { order, .. } = participation(state, user, id).await?;

    let chat = ChatActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        order_id: Set(order.id),
        text: Set(text),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Message sent",
        chat.into(),
        Some(Meta::empty()),
    ))
}

pub async fn list_chats(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ChatList>> {
    let Participation { order, .. } = participation(state, user, id).await?;
    let items = chats_for(&state.orm, order.id).await?;
    Ok(ApiResponse::success(
        "Messages",
        ChatList { items },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn order(shipped: bool, complete: bool, expires_at: Option<DateTime<Utc>>) -> orders::Model {
        let now = Utc::now();
        orders::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            session_id: None,
            expires_at: expires_at.map(Into::into),
            shipped,
            complete,
            tracking: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn handshake_follows_the_order_flags() {
        assert_eq!(handshake_step(&order(false, false, None)), HandshakeStep::FirstReview);
        assert_eq!(handshake_step(&order(true, false, None)), HandshakeStep::SecondReview);
        assert_eq!(handshake_step(&order(true, true, None)), HandshakeStep::Complete);
    }

    #[test]
    fn only_past_deadlines_expire() {
        assert!(!is_expired(&order(false, false, None)));
        assert!(!is_expired(&order(false, false, Some(Utc::now() + Duration::days(1)))));
        assert!(is_expired(&order(false, false, Some(Utc::now() - Duration::minutes(1)))));
    }
}
