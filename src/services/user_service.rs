use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    clients::{ClientError, notifier::PointsNotice, payment::CheckoutRequest},
    db::is_unique_violation,
    dto::{
        items::ItemList,
        purchase::{TopupCallback, TopupRequest},
        users::{
            AddressList, AddressRequest, Balance, FavoriteState, PublicProfile, ReportRequest,
            UpdateProfileRequest,
        },
    },
    entity::{
        Addresses, Favorites, Items, Orders, PointTopups, Reviews, Users,
        addresses::{self, ActiveModel as AddressActive},
        favorites::{self, ActiveModel as FavoriteActive},
        items,
        point_topups::{self, ActiveModel as TopupActive},
        reports::ActiveModel as ReportActive,
        reviews,
        users::{self, ActiveModel as UserActive},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Account, Address, Report, Review},
    response::{ApiResponse, Deleted, Meta, Redirect},
    routes::params::Pagination,
    services::{
        active_user,
        item_service::{find_item, item_views},
        required_text, search_sync,
    },
    settlement::verify_session,
    state::AppState,
};

const MAX_TOPUP: i64 = 1_000_000;
const MAX_DESCRIPTION: usize = 1000;

/// Share of good reviews on a five-point scale, one decimal place.
pub fn rating(good: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (good as f64 / total as f64 * 5.0 * 10.0).round() / 10.0
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Account>> {
    let account = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(ApiResponse::success(
        "Account",
        account.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<Account>> {
    let account = active_user(&state.orm, user.user_id).await?;

    let description = payload
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION)
    {
        return Err(AppError::BadRequest(format!(
            "description is limited to {MAX_DESCRIPTION} characters"
        )));
    }

    let mut active: UserActive = account.into();
    active.description = Set(description);
    let account = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Profile updated",
        account.into(),
        Some(Meta::empty()),
    ))
}

pub async fn public_profile(state: &AppState, id: Uuid) -> AppResult<ApiResponse<PublicProfile>> {
    let profile_user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|u| !u.suspended)
        .ok_or(AppError::NotFound)?;

    let reviews: Vec<reviews::Model> = Reviews::find()
        .filter(reviews::Column::TargetUserId.eq(id))
        .order_by_desc(reviews::Column::CreatedAt)
        .all(&state.orm)
        .await?;
    let good = reviews.iter().filter(|r| r.rating).count();
    let score = rating(good, reviews.len());
    let review_count = reviews.len() as u64;

    let listed = Items::find()
        .filter(items::Column::UserId.eq(id))
        .order_by_desc(items::Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let profile = PublicProfile {
        user: profile_user.into(),
        rating: score,
        review_count,
        reviews: reviews.into_iter().map(Review::from).collect(),
        items: item_views(&state.orm, state.storage.as_ref(), listed).await?,
    };
    Ok(ApiResponse::success("Profile", profile, Some(Meta::empty())))
}

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    let items = Addresses::find()
        .filter(addresses::Column::UserId.eq(user.user_id))
        .order_by_asc(addresses::Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Address::from)
        .collect();
    Ok(ApiResponse::success(
        "Addresses",
        AddressList { items },
        Some(Meta::empty()),
    ))
}

pub async fn add_address(
    state: &AppState,
    user: &AuthUser,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    active_user(&state.orm, user.user_id).await?;

    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        zip: Set(required_text(&payload.zip, "zip")?),
        prefecture: Set(required_text(&payload.prefecture, "prefecture")?),
        city: Set(required_text(&payload.city, "city")?),
        street: Set(required_text(&payload.street, "street")?),
        building: Set(payload
            .building
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())),
        phone: Set(required_text(&payload.phone, "phone")?),
        last_name: Set(required_text(&payload.last_name, "last_name")?),
        first_name: Set(required_text(&payload.first_name, "first_name")?),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Address added",
        address.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    active_user(&state.orm, user.user_id).await?;
    let result = Addresses::delete_many()
        .filter(addresses::Column::Id.eq(id))
        .filter(addresses::Column::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(ApiResponse::success(
        "Address deleted",
        Deleted { id },
        Some(Meta::empty()),
    ))
}

/// Adds the item to the caller's favorites, or removes it if already there.
pub async fn toggle_favorite(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<FavoriteState>> {
    active_user(&state.orm, user.user_id).await?;
    find_item(&state.orm, item_id).await?;

    let removed = Favorites::delete_many()
        .filter(favorites::Column::UserId.eq(user.user_id))
        .filter(favorites::Column::ItemId.eq(item_id))
        .exec(&state.orm)
        .await?;

    let favorited = if removed.rows_affected > 0 {
        false
    } else {
        let inserted = FavoriteActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.user_id),
            item_id: Set(item_id),
            created_at: Set(Utc::now().into()),
        }
        .insert(&state.orm)
        .await;
        match inserted {
            Ok(_) => true,
            Err(err) if is_unique_violation(&err) => true,
            Err(err) => return Err(err.into()),
        }
    };

    search_sync::mirror_item(state, item_id).await;

    Ok(ApiResponse::success(
        if favorited { "Favorited" } else { "Unfavorited" },
        FavoriteState { item_id, favorited },
        Some(Meta::empty()),
    ))
}

pub async fn list_favorites(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ItemList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Favorites::find()
        .filter(favorites::Column::UserId.eq(user.user_id))
        .order_by_desc(favorites::Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let ids: Vec<Uuid> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|f| f.item_id)
        .collect();

    let mut by_id: HashMap<Uuid, items::Model> = Items::find()
        .filter(items::Column::Id.is_in(ids.clone()))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|item| (item.id, item))
        .collect();
    let ordered = ids.iter().filter_map(|id| by_id.remove(id)).collect();

    let items = item_views(&state.orm, state.storage.as_ref(), ordered).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Favorites", ItemList { items }, Some(meta)))
}

pub async fn report(
    state: &AppState,
    user: &AuthUser,
    payload: ReportRequest,
) -> AppResult<ApiResponse<Report>> {
    active_user(&state.orm, user.user_id).await?;
    let text = required_text(&payload.text, "text")?;

    match (payload.item_id, payload.order_id) {
        (Some(item_id), None) => {
            find_item(&state.orm, item_id).await?;
        }
        (None, Some(order_id)) => {
            Orders::find_by_id(order_id)
                .one(&state.orm)
                .await?
                .ok_or(AppError::NotFound)?;
        }
        _ => {
            return Err(AppError::BadRequest(
                "report exactly one of item_id or order_id".into(),
            ));
        }
    }

    let report = ReportActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        item_id: Set(payload.item_id),
        order_id: Set(payload.order_id),
        text: Set(text),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(report_id = %report.id, reporter = %user.user_id, "report filed");

    Ok(ApiResponse::success(
        "Report received",
        report.into(),
        Some(Meta::empty()),
    ))
}

/// Returns the processor onboarding page for a new payout account, or the
/// account dashboard once one exists.
pub async fn connect_payout_account(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<Redirect>> {
    let account = active_user(&state.orm, user.user_id).await?;

    if let Some(account_id) = account.payout_account_id.as_deref() {
        let url = state.payments.create_login_link(account_id).await?;
        return Ok(ApiResponse::success(
            "Payout dashboard",
            Redirect { redirect: url },
            Some(Meta::empty()),
        ));
    }

    let account_id = state.payments.create_connected_account(&account.name).await?;
    let mut active: UserActive = account.into();
    active.payout_account_id = Set(Some(account_id.clone()));
    active.update(&state.orm).await?;

    let return_url = format!(
        "{}/mypage/bank",
        state.config.public_url.trim_end_matches('/')
    );
    let url = state
        .payments
        .create_onboarding_link(&account_id, &return_url)
        .await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "payout_connect",
        "users",
        serde_json::json!({ "account_id": account_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payout onboarding",
        Redirect { redirect: url },
        Some(Meta::empty()),
    ))
}

pub async fn start_topup(
    state: &AppState,
    user: &AuthUser,
    payload: TopupRequest,
) -> AppResult<ApiResponse<Redirect>> {
    active_user(&state.orm, user.user_id).await?;
    if !(1..=MAX_TOPUP).contains(&payload.points) {
        return Err(AppError::BadRequest(format!(
            "points must be between 1 and {MAX_TOPUP}"
        )));
    }

    let base = state.config.public_url.trim_end_matches('/');
    let request = CheckoutRequest {
        product_name: format!("{} ポイント", payload.points),
        image_url: None,
        unit_amount: payload.points,
        currency: state.config.currency.clone(),
        destination: None,
        client_reference_id: user.user_id.to_string(),
        success_url: format!(
            "{base}/api/users/me/points/callback?points={}&session_id={{CHECKOUT_SESSION_ID}}",
            payload.points
        ),
        cancel_url: format!("{base}/mypage/points?canceled=true"),
    };
    let session = state.payments.create_checkout_session(&request).await?;
    let redirect = session.url.ok_or(ClientError::Rejected {
        service: "stripe",
        message: "checkout session has no url".into(),
    })?;

    Ok(ApiResponse::success(
        "Checkout started",
        Redirect { redirect },
        Some(Meta::empty()),
    ))
}

async fn balance_of(state: &AppState, user_id: Uuid) -> AppResult<i64> {
    let user = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(user.points)
}

/// Credits a paid top-up once. Replaying the same session id is a no-op.
pub async fn complete_topup(
    state: &AppState,
    user: &AuthUser,
    callback: TopupCallback,
) -> AppResult<ApiResponse<Balance>> {
    active_user(&state.orm, user.user_id).await?;

    let already = PointTopups::find()
        .filter(point_topups::Column::SessionId.eq(callback.session_id.as_str()))
        .one(&state.orm)
        .await?;
    if let Some(topup) = already {
        if topup.user_id != user.user_id {
            return Err(AppError::Forbidden);
        }
        let points = balance_of(state, user.user_id).await?;
        return Ok(ApiResponse::success(
            "Points already added",
            Balance { points },
            Some(Meta::empty()),
        ));
    }

    let status = state
        .payments
        .retrieve_checkout_session(&callback.session_id)
        .await?;
    verify_session(&status, callback.points, &user.user_id.to_string())?;

    let txn = state.orm.begin().await?;
    let recorded = TopupActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        session_id: Set(callback.session_id.clone()),
        points: Set(callback.points),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await;
    match recorded {
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {
            drop(txn);
            let points = balance_of(state, user.user_id).await?;
            return Ok(ApiResponse::success(
                "Points already added",
                Balance { points },
                Some(Meta::empty()),
            ));
        }
        Err(err) => return Err(err.into()),
    }
    Users::update_many()
        .col_expr(
            users::Column::Points,
            Expr::col(users::Column::Points).add(callback.points),
        )
        .filter(users::Column::Id.eq(user.user_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!(user_id = %user.user_id, points = callback.points, "points topped up");

    let notice = PointsNotice {
        user_id: user.user_id,
        points: callback.points,
    };
    if let Err(err) = state.notifier.points(&notice).await {
        tracing::warn!(error = %err, "points notification failed");
    }
    audit::record(
        &state.orm,
        Some(user.user_id),
        "points_topup",
        "point_topups",
        serde_json::json!({ "session_id": callback.session_id, "points": callback.points }),
    )
    .await;

    let points = balance_of(state, user.user_id).await?;
    Ok(ApiResponse::success(
        "Points added",
        Balance { points },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_scales_good_share_to_five() {
        assert_eq!(rating(0, 0), 0.0);
        assert_eq!(rating(3, 3), 5.0);
        assert_eq!(rating(2, 3), 3.3);
        assert_eq!(rating(1, 4), 1.3);
        assert_eq!(rating(0, 5), 0.0);
    }
}
