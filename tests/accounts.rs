mod common;

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};

use common::{Terms, auth, create_admin, create_item, create_user, points_of, setup};
use marketplace_api::{
    dto::{
        admin::{DeleteResourceRequest, ResourceKind, SetRoleRequest},
        items::CreateItemRequest,
        purchase::{TopupCallback, TopupRequest},
    },
    error::AppError,
    routes::params::{ItemQuery, Pagination},
    services::{admin_service, image_service, item_service, user_service},
};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode png");
    buf.into_inner()
}

fn listing(category: i32, images: Vec<uuid::Uuid>) -> CreateItemRequest {
    CreateItemRequest {
        name: "Desk lamp".to_string(),
        description: "Barely used".to_string(),
        condition: "like_new".to_string(),
        shipping: "buyer".to_string(),
        delivery_days: 2,
        category,
        price: 1200,
        accepts_points: true,
        processor_opt_out: false,
        images,
    }
}

#[tokio::test]
async fn topup_is_credited_once_per_session() {
    let app = setup().await;
    let user = create_user(&app, "saver", 100).await;
    let caller = auth(&user);

    user_service::start_topup(&app.state, &caller, TopupRequest { points: 500 })
        .await
        .expect("topup session");
    let (session_id, checkout) = app.payments.last_session();
    assert_eq!(checkout.unit_amount, 500);
    assert!(checkout.destination.is_none());
    assert_eq!(checkout.client_reference_id, user.id.to_string());

    let callback = || TopupCallback {
        session_id: session_id.clone(),
        points: 500,
    };
    let balance = user_service::complete_topup(&app.state, &caller, callback())
        .await
        .expect("credit")
        .data
        .expect("balance");
    assert_eq!(balance.points, 600);

    let again = user_service::complete_topup(&app.state, &caller, callback())
        .await
        .expect("replay")
        .data
        .expect("balance");
    assert_eq!(again.points, 600);
    assert_eq!(points_of(&app, user.id).await, 600);
    assert_eq!(app.notifier.points.lock().unwrap().len(), 1);

    let other = create_user(&app, "other", 0).await;
    let err = user_service::complete_topup(&app.state, &auth(&other), callback())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(points_of(&app, other.id).await, 0);
}

#[tokio::test]
async fn topup_amount_must_match_the_session() {
    let app = setup().await;
    let user = create_user(&app, "saver", 0).await;
    let caller = auth(&user);

    user_service::start_topup(&app.state, &caller, TopupRequest { points: 500 })
        .await
        .expect("topup session");
    let (session_id, _) = app.payments.last_session();

    let err = user_service::complete_topup(
        &app.state,
        &caller,
        TopupCallback {
            session_id,
            points: 50_000,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::PaymentNotCompleted));
    assert_eq!(points_of(&app, user.id).await, 0);

    let err = user_service::start_topup(&app.state, &caller, TopupRequest { points: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn listing_attaches_uploaded_images() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let caller = auth(&seller);

    let uploaded = image_service::upload_image(
        &app.state,
        &caller,
        png(64, 48),
        "image/png".to_string(),
    )
    .await
    .expect("upload")
    .data
    .expect("image");
    assert!(uploaded.url.ends_with(&format!("{}.jpg", uploaded.id)));
    assert_eq!(app.storage.objects.lock().unwrap().len(), 1);

    let item = item_service::create_item(&app.state, &caller, listing(331, vec![uploaded.id]))
        .await
        .expect("create item")
        .data
        .expect("item");
    assert_eq!(item.images.len(), 1);
    assert_eq!(item.images[0].id, uploaded.id);
    let doc = app.search.get(item.id).expect("mirrored");
    assert_eq!(doc.image.expect("document image").id, uploaded.id);

    // An image belongs to one listing only.
    let err = item_service::create_item(&app.state, &caller, listing(331, vec![uploaded.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = item_service::create_item(&app.state, &caller, listing(777, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn browsing_by_category_includes_subcategories() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let laptop = create_item(&app, &seller, Terms::card(50_000)).await;

    let query = ItemQuery {
        category: Some(330),
        ..ItemQuery::default()
    };
    let found = item_service::list_items(&app.state, query)
        .await
        .expect("list")
        .data
        .expect("items");
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id, laptop.id);

    let query = ItemQuery {
        category: Some(200),
        ..ItemQuery::default()
    };
    let found = item_service::list_items(&app.state, query)
        .await
        .expect("list")
        .data
        .expect("items");
    assert!(found.items.is_empty());
}

#[tokio::test]
async fn favorites_toggle_on_and_off() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let fan = create_user(&app, "fan", 0).await;
    let item = create_item(&app, &seller, Terms::card(900)).await;
    let caller = auth(&fan);

    let on = user_service::toggle_favorite(&app.state, &caller, item.id)
        .await
        .expect("favorite")
        .data
        .expect("state");
    assert!(on.favorited);
    assert_eq!(app.search.get(item.id).expect("mirrored").favorites, 1);

    let listed = user_service::list_favorites(&app.state, &caller, Pagination::default())
        .await
        .expect("favorites")
        .data
        .expect("items");
    assert_eq!(listed.items.len(), 1);

    let off = user_service::toggle_favorite(&app.state, &caller, item.id)
        .await
        .expect("unfavorite")
        .data
        .expect("state");
    assert!(!off.favorited);
    assert_eq!(app.search.get(item.id).expect("mirrored").favorites, 0);
}

#[tokio::test]
async fn admin_actions_require_the_admin_role() {
    let app = setup().await;
    let user = create_user(&app, "user", 0).await;
    let target = create_user(&app, "target", 0).await;

    let err = admin_service::suspend_user(&app.state, &auth(&user), target.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let admin = create_admin(&app, "admin").await;
    let err = admin_service::set_role(
        &app.state,
        &auth(&admin),
        target.id,
        SetRoleRequest {
            role: "superuser".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn suspension_unlists_and_recovery_relists() {
    let app = setup().await;
    let admin = create_admin(&app, "admin").await;
    let seller = create_user(&app, "seller", 0).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;
    let other = create_item(&app, &admin, Terms::card(2000)).await;
    let caller = auth(&admin);

    let indexed = admin_service::reindex(&app.state, &caller)
        .await
        .expect("reindex")
        .data
        .expect("summary");
    assert_eq!(indexed.indexed, 2);

    let account = admin_service::suspend_user(&app.state, &caller, seller.id)
        .await
        .expect("suspend")
        .data
        .expect("account");
    assert!(account.suspended);
    assert!(app.search.get(item.id).is_none());
    assert!(app.search.get(other.id).is_some());

    let browse = item_service::list_items(&app.state, ItemQuery::default())
        .await
        .expect("list")
        .data
        .expect("items");
    assert_eq!(browse.items.len(), 1);

    let err = user_service::public_profile(&app.state, seller.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let indexed = admin_service::reindex(&app.state, &caller)
        .await
        .expect("reindex")
        .data
        .expect("summary");
    assert_eq!(indexed.indexed, 1);

    admin_service::recover_user(&app.state, &caller, seller.id)
        .await
        .expect("recover");
    assert!(app.search.get(item.id).is_some());
}

#[tokio::test]
async fn admin_can_remove_an_item() {
    let app = setup().await;
    let admin = create_admin(&app, "admin").await;
    let seller = create_user(&app, "seller", 0).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;
    let caller = auth(&admin);

    admin_service::reindex(&app.state, &caller)
        .await
        .expect("reindex");
    assert_eq!(app.search.len(), 1);

    admin_service::delete_resource(
        &app.state,
        &caller,
        DeleteResourceRequest {
            kind: ResourceKind::Item,
            id: item.id,
        },
    )
    .await
    .expect("delete item");
    assert_eq!(app.search.len(), 0);

    let err = item_service::get_item(&app.state, None, item.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ItemNotFound));
}
