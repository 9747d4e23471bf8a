use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        admin::{
            DeleteResourceRequest, ReindexSummary, ReportList, ResourceKind, ReviewList,
            SetRoleRequest, UserList,
        },
        orders::OrderList,
    },
    entity::{
        Items, Orders, Reports, Reviews, Users, orders, reports, reviews,
        users::{self, ActiveModel as UserActive},
    },
    error::{AppError, AppResult},
    middleware::auth::{ADMIN_ROLE, AuthUser, USER_ROLE, ensure_admin},
    models::{Account, Order, Report, Review},
    response::{ApiResponse, Deleted, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::{active_user, search_sync},
    state::AppState,
};

/// The token must carry the admin role and the stored account must still
/// hold it.
async fn require_admin(state: &AppState, user: &AuthUser) -> AppResult<()> {
    ensure_admin(user)?;
    let account = active_user(&state.orm, user.user_id).await?;
    if account.role != ADMIN_ROLE {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

async fn find_user(state: &AppState, id: Uuid) -> AppResult<users::Model> {
    Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn delete_resource(
    state: &AppState,
    user: &AuthUser,
    payload: DeleteResourceRequest,
) -> AppResult<ApiResponse<Deleted>> {
    require_admin(state, user).await?;
    let id = payload.id;

    match payload.kind {
        ResourceKind::Item => {
            let result = Items::delete_by_id(id).exec(&state.orm).await?;
            if result.rows_affected == 0 {
                return Err(AppError::NotFound);
            }
            search_sync::unlist_item(state, id).await;
        }
        ResourceKind::Report => {
            let result = Reports::delete_by_id(id).exec(&state.orm).await?;
            if result.rows_affected == 0 {
                return Err(AppError::NotFound);
            }
        }
        ResourceKind::Order => {
            let order = Orders::find_by_id(id)
                .one(&state.orm)
                .await?
                .ok_or(AppError::NotFound)?;
            Orders::delete_by_id(id).exec(&state.orm).await?;
            search_sync::mirror_item(state, order.item_id).await;
        }
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "admin_delete",
        "admin",
        serde_json::json!({ "kind": payload.kind, "id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        Deleted { id },
        Some(Meta::empty()),
    ))
}

async fn set_suspended(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    suspended: bool,
) -> AppResult<users::Model> {
    require_admin(state, user).await?;
    if id == user.user_id {
        return Err(AppError::BadRequest("cannot change your own suspension".into()));
    }
    let target = find_user(state, id).await?;

    let mut active: UserActive = target.into();
    active.suspended = Set(suspended);
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        if suspended { "user_suspend" } else { "user_recover" },
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;
    Ok(updated)
}

/// Suspends a user and pulls all of their listings from search.
pub async fn suspend_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Account>> {
    let updated = set_suspended(state, user, id, true).await?;
    search_sync::unlist_user(state, id).await;
    tracing::info!(user_id = %id, admin = %user.user_id, "user suspended");
    Ok(ApiResponse::success(
        "User suspended",
        updated.into(),
        Some(Meta::empty()),
    ))
}

pub async fn recover_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Account>> {
    let updated = set_suspended(state, user, id, false).await?;
    search_sync::relist_user(state, id).await;
    tracing::info!(user_id = %id, admin = %user.user_id, "user recovered");
    Ok(ApiResponse::success(
        "User recovered",
        updated.into(),
        Some(Meta::empty()),
    ))
}

pub async fn set_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SetRoleRequest,
) -> AppResult<ApiResponse<Account>> {
    require_admin(state, user).await?;
    let role = payload.role.trim();
    if role != ADMIN_ROLE && role != USER_ROLE {
        return Err(AppError::BadRequest(format!("unknown role {role}")));
    }
    let target = find_user(state, id).await?;

    let mut active: UserActive = target.into();
    active.role = Set(role.to_string());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "role_change",
        "users",
        serde_json::json!({ "user_id": id, "role": role }),
    )
    .await;

    Ok(ApiResponse::success(
        "Role updated",
        updated.into(),
        Some(Meta::empty()),
    ))
}

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    require_admin(state, user).await?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_desc(users::Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Account::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    require_admin(state, user).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = Orders::find();
    if let Some(complete) = query.complete {
        finder = finder.filter(orders::Column::Complete.eq(complete));
    }
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

pub async fn list_reports(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReportList>> {
    require_admin(state, user).await?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Reports::find().order_by_desc(reports::Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Report::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Reports", ReportList { items }, Some(meta)))
}

pub async fn list_reviews(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    require_admin(state, user).await?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Reviews::find().order_by_desc(reviews::Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}

pub async fn reindex(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<ReindexSummary>> {
    require_admin(state, user).await?;
    let indexed = search_sync::reindex(state).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "search_reindex",
        "items",
        serde_json::json!({ "indexed": indexed }),
    )
    .await;

    Ok(ApiResponse::success(
        "Search index rebuilt",
        ReindexSummary { indexed },
        Some(Meta::empty()),
    ))
}
