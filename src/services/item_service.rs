use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    category,
    clients::{ObjectStore, search::SearchRequest},
    dto::items::{
        CommentRequest, CreateItemRequest, ItemDetail, ItemList, MAX_IMAGES, SearchHits,
        UpdateItemRequest,
    },
    entity::{
        Comments, Favorites, Images, Items, Orders, Users,
        comments::{self, ActiveModel as CommentActive},
        favorites, images,
        items::{self, ActiveModel as ItemActive},
        orders, users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Comment, ImageRef, Item},
    response::{ApiResponse, Deleted, Meta},
    routes::params::{ItemQuery, ItemSortBy, SearchQuery, SortOrder},
    services::{active_user, order_service, required_text, search_sync},
    state::AppState,
};

fn item_model(
    model: items::Model,
    images: Vec<ImageRef>,
    sold: bool,
) -> Item {
    let category_path = u32::try_from(model.category)
        .map(category::id_to_category)
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect();
    Item {
        id: model.id,
        user_id: model.user_id,
        name: model.name,
        description: model.description,
        condition: model.condition,
        shipping: model.shipping,
        delivery_days: model.delivery_days,
        category: model.category,
        category_path,
        price: model.price,
        accepts_points: model.accepts_points,
        processor_opt_out: model.processor_opt_out,
        sold,
        images,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

/// API views for a batch of items, with image URLs and sold flags.
pub(crate) async fn item_views<C: ConnectionTrait>(
    conn: &C,
    storage: &dyn ObjectStore,
    models: Vec<items::Model>,
) -> AppResult<Vec<Item>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();

    let mut images_by_item: HashMap<Uuid, Vec<ImageRef>> = HashMap::new();
    for image in Images::find()
        .filter(images::Column::ItemId.is_in(ids.clone()))
        .order_by_asc(images::Column::Position)
        .all(conn)
        .await?
    {
        if let Some(item_id) = image.item_id {
            images_by_item.entry(item_id).or_default().push(ImageRef {
                id: image.id,
                url: storage.image_url(image.id, &image.format),
            });
        }
    }

    let sold: HashSet<Uuid> = Orders::find()
        .filter(orders::Column::ItemId.is_in(ids))
        .select_only()
        .column(orders::Column::ItemId)
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect();

    Ok(models
        .into_iter()
        .map(|m| {
            let images = images_by_item.remove(&m.id).unwrap_or_default();
            let is_sold = sold.contains(&m.id);
            item_model(m, images, is_sold)
        })
        .collect())
}

pub(crate) async fn item_view<C: ConnectionTrait>(
    conn: &C,
    storage: &dyn ObjectStore,
    model: items::Model,
) -> AppResult<Item> {
    item_views(conn, storage, vec![model])
        .await?
        .pop()
        .ok_or(AppError::ItemNotFound)
}

pub(crate) async fn first_image_url(state: &AppState, item_id: Uuid) -> AppResult<Option<String>> {
    let image = Images::find()
        .filter(images::Column::ItemId.eq(item_id))
        .order_by_asc(images::Column::Position)
        .one(&state.orm)
        .await?;
    Ok(image.map(|img| state.storage.image_url(img.id, &img.format)))
}

pub(crate) async fn find_item<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<items::Model> {
    Items::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::ItemNotFound)
}

async fn is_sold<C: ConnectionTrait>(conn: &C, item_id: Uuid) -> AppResult<bool> {
    let count = Orders::find()
        .filter(orders::Column::ItemId.eq(item_id))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Loads an item the caller may still edit: theirs and without an order.
async fn editable_item<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<items::Model> {
    let item = find_item(conn, id).await?;
    if item.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if is_sold(conn, id).await? {
        return Err(AppError::ItemAlreadyPurchased);
    }
    Ok(item)
}

fn validate_price(price: i64) -> AppResult<()> {
    if price <= 0 {
        return Err(AppError::BadRequest("price must be positive".into()));
    }
    Ok(())
}

fn validate_category(code: i32) -> AppResult<()> {
    let known = u32::try_from(code).map(category::is_known).unwrap_or(false);
    if !known {
        return Err(AppError::BadRequest(format!("unknown category {code}")));
    }
    Ok(())
}

fn validate_delivery_days(days: i32) -> AppResult<()> {
    if !(1..=30).contains(&days) {
        return Err(AppError::BadRequest("delivery_days must be 1-30".into()));
    }
    Ok(())
}

fn validate_images(ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() || ids.len() > MAX_IMAGES {
        return Err(AppError::BadRequest(format!(
            "an item needs 1-{MAX_IMAGES} images"
        )));
    }
    let unique: HashSet<&Uuid> = ids.iter().collect();
    if unique.len() != ids.len() {
        return Err(AppError::BadRequest("duplicate image".into()));
    }
    Ok(())
}

pub async fn create_item(
    state: &AppState,
    user: &AuthUser,
    payload: CreateItemRequest,
) -> AppResult<ApiResponse<Item>> {
    active_user(&state.orm, user.user_id).await?;

    let name = required_text(&payload.name, "name")?;
    let condition = required_text(&payload.condition, "condition")?;
    let shipping = required_text(&payload.shipping, "shipping")?;
    validate_price(payload.price)?;
    validate_category(payload.category)?;
    validate_delivery_days(payload.delivery_days)?;
    validate_images(&payload.images)?;

    let txn = state.orm.begin().await?;

    let available = Images::find()
        .filter(
            Condition::all()
                .add(images::Column::Id.is_in(payload.images.clone()))
                .add(images::Column::UserId.eq(user.user_id))
                .add(images::Column::ItemId.is_null()),
        )
        .count(&txn)
        .await?;
    if available != payload.images.len() as u64 {
        return Err(AppError::BadRequest("unknown or already used image".into()));
    }

    let now = Utc::now();
    let item = ItemActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        name: Set(name),
        description: Set(payload.description.trim().to_string()),
        condition: Set(condition),
        shipping: Set(shipping),
        delivery_days: Set(payload.delivery_days),
        category: Set(payload.category),
        price: Set(payload.price),
        accepts_points: Set(payload.accepts_points),
        processor_opt_out: Set(payload.processor_opt_out),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    for (position, image_id) in payload.images.iter().enumerate() {
        Images::update_many()
            .col_expr(images::Column::ItemId, Expr::value(item.id))
            .col_expr(images::Column::Position, Expr::value(position as i32))
            .filter(images::Column::Id.eq(*image_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::info!(item_id = %item.id, seller_id = %user.user_id, "item listed");
    search_sync::mirror_item(state, item.id).await;
    audit::record(
        &state.orm,
        Some(user.user_id),
        "item_create",
        "items",
        serde_json::json!({ "item_id": item.id }),
    )
    .await;

    let view = item_view(&state.orm, state.storage.as_ref(), item).await?;
    Ok(ApiResponse::success("Item created", view, Some(Meta::empty())))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateItemRequest,
) -> AppResult<ApiResponse<Item>> {
    active_user(&state.orm, user.user_id).await?;
    let existing = editable_item(&state.orm, user, id).await?;

    let mut active: ItemActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(required_text(&name, "name")?);
    }
    if let Some(description) = payload.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(condition) = payload.condition {
        active.condition = Set(required_text(&condition, "condition")?);
    }
    if let Some(shipping) = payload.shipping {
        active.shipping = Set(required_text(&shipping, "shipping")?);
    }
    if let Some(days) = payload.delivery_days {
        validate_delivery_days(days)?;
        active.delivery_days = Set(days);
    }
    if let Some(code) = payload.category {
        validate_category(code)?;
        active.category = Set(code);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(accepts_points) = payload.accepts_points {
        active.accepts_points = Set(accepts_points);
    }
    if let Some(opt_out) = payload.processor_opt_out {
        active.processor_opt_out = Set(opt_out);
    }
    active.updated_at = Set(Utc::now().into());
    let item = active.update(&state.orm).await?;

    search_sync::mirror_item(state, item.id).await;

    let view = item_view(&state.orm, state.storage.as_ref(), item).await?;
    Ok(ApiResponse::success("Item updated", view, Some(Meta::empty())))
}

pub async fn delete_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    active_user(&state.orm, user.user_id).await?;
    let item = editable_item(&state.orm, user, id).await?;

    Items::delete_by_id(item.id).exec(&state.orm).await?;

    search_sync::unlist_item(state, id).await;
    audit::record(
        &state.orm,
        Some(user.user_id),
        "item_delete",
        "items",
        serde_json::json!({ "item_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Item deleted",
        Deleted { id },
        Some(Meta::empty()),
    ))
}

pub async fn get_item(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<ItemDetail>> {
    let item = find_item(&state.orm, id).await?;
    order_service::release_lapsed(state, id).await?;
    let seller = Users::find_by_id(item.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::ItemNotFound)?;

    let favorites = Favorites::find()
        .filter(favorites::Column::ItemId.eq(id))
        .count(&state.orm)
        .await? as i64;

    let favorited = match viewer {
        Some(viewer) => {
            Favorites::find()
                .filter(favorites::Column::ItemId.eq(id))
                .filter(favorites::Column::UserId.eq(viewer.user_id))
                .count(&state.orm)
                .await?
                > 0
        }
        None => false,
    };

    let comments: Vec<Comment> = Comments::find()
        .filter(comments::Column::ItemId.eq(id))
        .order_by_asc(comments::Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Comment::from)
        .collect();

    let detail = ItemDetail {
        item: item_view(&state.orm, state.storage.as_ref(), item).await?,
        seller: seller.into(),
        favorites,
        favorited,
        comments,
    };
    Ok(ApiResponse::success("Item found", detail, Some(Meta::empty())))
}

/// Browse straight from the database. Items of suspended sellers are hidden.
pub async fn list_items(
    state: &AppState,
    query: ItemQuery,
) -> AppResult<ApiResponse<ItemList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let suspended_sellers = Query::select()
        .column(users::Column::Id)
        .from(Users)
        .and_where(Expr::col(users::Column::Suspended).eq(true))
        .to_owned();
    let mut condition =
        Condition::all().add(items::Column::UserId.not_in_subquery(suspended_sellers));

    if let Some(code) = query.category {
        let codes: Vec<i32> = category::descendants(code)
            .into_iter()
            .filter_map(|c| i32::try_from(c).ok())
            .collect();
        condition = condition.add(items::Column::Category.is_in(codes));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(items::Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(items::Column::Price.lte(max_price));
    }
    if let Some(seller) = query.seller {
        condition = condition.add(items::Column::UserId.eq(seller));
    }
    if query.unsold.unwrap_or(false) {
        let sold = Query::select()
            .column(orders::Column::ItemId)
            .from(Orders)
            .to_owned();
        condition = condition.add(items::Column::Id.not_in_subquery(sold));
    }

    let sort_col = match query.sort_by.unwrap_or(ItemSortBy::CreatedAt) {
        ItemSortBy::CreatedAt => items::Column::CreatedAt,
        ItemSortBy::Price => items::Column::Price,
        ItemSortBy::Favorites => {
            return Err(AppError::BadRequest(
                "sorting by favorites is only available in search".into(),
            ));
        }
    };

    let mut finder = Items::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = item_views(&state.orm, state.storage.as_ref(), models).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Items", ItemList { items }, Some(meta)))
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Translates browse parameters into an index query.
pub fn search_request(query: &SearchQuery) -> SearchRequest {
    let (_, limit, offset) = query.pagination().normalize();
    let mut filter = Vec::new();

    if let Some(code) = query.category {
        let codes: Vec<String> = category::descendants(code)
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        filter.push(format!("category IN [{}]", codes.join(", ")));
    }
    if let Some(min_price) = query.min_price {
        filter.push(format!("price >= {min_price}"));
    }
    if let Some(max_price) = query.max_price {
        filter.push(format!("price <= {max_price}"));
    }
    if let Some(condition) = query.condition.as_deref().filter(|s| !s.is_empty()) {
        filter.push(format!("state = {}", quoted(condition)));
    }
    if let Some(shipping) = query.shipping.as_deref().filter(|s| !s.is_empty()) {
        filter.push(format!("shipping = {}", quoted(shipping)));
    }
    if query.points.unwrap_or(false) {
        filter.push("points = true".to_string());
    }
    if query.unsold.unwrap_or(false) {
        filter.push("order = false".to_string());
    }

    let sort_by = query.sort_by.unwrap_or(ItemSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    SearchRequest {
        q: query.q.clone().unwrap_or_default(),
        filter,
        sort: vec![format!(
            "{}:{}",
            sort_by.index_attribute(),
            sort_order.as_str()
        )],
        limit: limit as u64,
        offset: offset as u64,
    }
}

pub async fn search_items(
    state: &AppState,
    query: SearchQuery,
) -> AppResult<ApiResponse<SearchHits>> {
    let (page, limit, _) = query.pagination().normalize();
    let request = search_request(&query);
    let result = state.search.search(&request).await?;

    let meta = Meta::new(page, limit, result.total);
    Ok(ApiResponse::success(
        "Search results",
        SearchHits { items: result.hits },
        Some(meta),
    ))
}

pub async fn post_comment(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: CommentRequest,
) -> AppResult<ApiResponse<Comment>> {
    active_user(&state.orm, user.user_id).await?;
    let text = required_text(&payload.text, "text")?;
    find_item(&state.orm, item_id).await?;

    let comment = CommentActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        item_id: Set(item_id),
        text: Set(text),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Comment posted",
        comment.into(),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_filters_cover_category_subtree_and_flags() {
        let query = SearchQuery {
            category: Some(330),
            min_price: Some(500),
            condition: Some("新品".into()),
            points: Some(true),
            unsold: Some(true),
            sort_by: Some(ItemSortBy::Price),
            sort_order: Some(SortOrder::Asc),
            page: Some(2),
            per_page: Some(10),
            ..Default::default()
        };
        let req = search_request(&query);
        assert_eq!(
            req.filter,
            vec![
                "category IN [330, 331, 332]".to_string(),
                "price >= 500".to_string(),
                "state = \"新品\"".to_string(),
                "points = true".to_string(),
                "order = false".to_string(),
            ]
        );
        assert_eq!(req.sort, vec!["price:asc".to_string()]);
        assert_eq!((req.limit, req.offset), (10, 10));
    }

    #[test]
    fn filter_values_are_escaped() {
        let query = SearchQuery {
            shipping: Some("say \"hi\"".into()),
            ..Default::default()
        };
        let req = search_request(&query);
        assert_eq!(req.filter, vec!["shipping = \"say \\\"hi\\\"\"".to_string()]);
        assert_eq!(req.sort, vec!["createdAt:desc".to_string()]);
    }
}
