//! Keeps the search index in step with the relational store.
//!
//! Every write here is best-effort: a failed mirror is logged and the
//! request that triggered it still succeeds. `reindex` repairs drift.

use std::collections::{HashMap, HashSet};

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::{
    clients::search::{DocumentImage, ItemDocument, user_filter},
    entity::{Favorites, Images, Items, Orders, Users, favorites, images, items, orders, users},
    error::AppResult,
    state::AppState,
};

const REINDEX_BATCH: u64 = 500;

fn document(
    item: &items::Model,
    image: Option<&images::Model>,
    favorites: i64,
    sold: bool,
) -> ItemDocument {
    ItemDocument {
        id: item.id,
        name: item.name.clone(),
        description: item.description.clone(),
        state: item.condition.clone(),
        shipping: item.shipping.clone(),
        category: item.category,
        delivery_days: item.delivery_days,
        points: item.accepts_points,
        price: item.price,
        order: sold,
        image: image.map(|img| DocumentImage {
            id: img.id,
            format: img.format.clone(),
        }),
        favorites,
        user_id: item.user_id,
        created_at: item.created_at.timestamp(),
    }
}

/// Builds index documents for a batch of items with three queries.
pub async fn documents<C: ConnectionTrait>(
    conn: &C,
    items: &[items::Model],
) -> AppResult<Vec<ItemDocument>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();

    let mut first_images: HashMap<Uuid, images::Model> = HashMap::new();
    for image in Images::find()
        .filter(images::Column::ItemId.is_in(ids.clone()))
        .order_by_asc(images::Column::Position)
        .all(conn)
        .await?
    {
        if let Some(item_id) = image.item_id {
            first_images.entry(item_id).or_insert(image);
        }
    }

    let mut favorite_counts: HashMap<Uuid, i64> = HashMap::new();
    for favorite in Favorites::find()
        .filter(favorites::Column::ItemId.is_in(ids.clone()))
        .all(conn)
        .await?
    {
        *favorite_counts.entry(favorite.item_id).or_default() += 1;
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

    Ok(items
        .iter()
        .map(|item| {
            document(
                item,
                first_images.get(&item.id),
                favorite_counts.get(&item.id).copied().unwrap_or(0),
                sold.contains(&item.id),
            )
        })
        .collect())
}

async fn refresh(state: &AppState, item_id: Uuid) -> AppResult<()> {
    let item = Items::find_by_id(item_id).one(&state.orm).await?;
    let seller_suspended = match &item {
        Some(item) => Users::find_by_id(item.user_id)
            .one(&state.orm)
            .await?
            .is_none_or(|seller| seller.suspended),
        None => false,
    };
    match item.filter(|_| !seller_suspended) {
        Some(item) => {
            let docs = documents(&state.orm, std::slice::from_ref(&item)).await?;
            state.search.upsert(&docs).await?;
        }
        None => state.search.delete(item_id).await?,
    }
    Ok(())
}

/// Re-reads the item and writes its current document, or removes it when
/// the item is gone.
pub async fn mirror_item(state: &AppState, item_id: Uuid) {
    if let Err(err) = refresh(state, item_id).await {
        tracing::warn!(error = %err, %item_id, "search mirror failed");
    }
}

pub async fn unlist_item(state: &AppState, item_id: Uuid) {
    if let Err(err) = state.search.delete(item_id).await {
        tracing::warn!(error = %err, %item_id, "search delete failed");
    }
}

pub async fn unlist_user(state: &AppState, user_id: Uuid) {
    if let Err(err) = state.search.delete_by_filter(&user_filter(user_id)).await {
        tracing::warn!(error = %err, %user_id, "search bulk delete failed");
    }
}

async fn relist(state: &AppState, user_id: Uuid) -> AppResult<usize> {
    let items = Items::find()
        .filter(items::Column::UserId.eq(user_id))
        .all(&state.orm)
        .await?;
    let docs = documents(&state.orm, &items).await?;
    state.search.upsert(&docs).await?;
    Ok(docs.len())
}

/// Puts a recovered user's items back into the index.
pub async fn relist_user(state: &AppState, user_id: Uuid) {
    match relist(state, user_id).await {
        Ok(count) => tracing::debug!(%user_id, count, "user items relisted"),
        Err(err) => tracing::warn!(error = %err, %user_id, "search relist failed"),
    }
}

/// Rebuilds the whole index from the database. Items of suspended users are
/// left out.
pub async fn reindex(state: &AppState) -> AppResult<usize> {
    state.search.clear().await?;

    let suspended: HashSet<Uuid> = Users::find()
        .filter(users::Column::Suspended.eq(true))
        .select_only()
        .column(users::Column::Id)
        .into_tuple::<Uuid>()
        .all(&state.orm)
        .await?
        .into_iter()
        .collect();

    let mut pages = Items::find()
        .order_by_asc(items::Column::CreatedAt)
        .paginate(&state.orm, REINDEX_BATCH);
    let mut indexed = 0;
    while let Some(batch) = pages.fetch_and_next().await? {
        let visible: Vec<items::Model> = batch
            .into_iter()
            .filter(|item| !suspended.contains(&item.user_id))
            .collect();
        let docs = documents(&state.orm, &visible).await?;
        state.search.upsert(&docs).await?;
        indexed += docs.len();
    }

    state.search.configure().await?;
    tracing::info!(indexed, "search index rebuilt");
    Ok(indexed)
}
