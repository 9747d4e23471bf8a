mod common;

use chrono::Utc;
use sea_orm::{EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

use common::{
    Terms, auth, create_address, create_item, create_lapsed_order, create_user, points_of,
    setup, suspend,
};
use marketplace_api::{
    dto::purchase::{PurchaseCallback, PurchaseRequest},
    entity::{Orders, orders},
    error::AppError,
    services::purchase_service,
};

fn request(item_id: uuid::Uuid, address_id: uuid::Uuid) -> PurchaseRequest {
    PurchaseRequest {
        item_id,
        address_id,
    }
}

#[tokio::test]
async fn points_cover_the_whole_price() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 1500).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;

    let resp = purchase_service::purchase_with_points(
        &app.state,
        &auth(&buyer),
        request(item.id, address.id),
    )
    .await
    .expect("points purchase");

    let outcome = resp.data.expect("outcome");
    let order = outcome.order.expect("order created");
    assert_eq!(order.buyer_id, buyer.id);
    assert_eq!(order.session_id.as_deref(), Some("points"));
    assert!(order.expires_at.is_none());
    assert!(outcome.redirect.contains(&order.id.to_string()));

    assert_eq!(points_of(&app, buyer.id).await, 500);
    assert_eq!(points_of(&app, seller.id).await, 1000);
    assert!(app.payments.requests.lock().unwrap().is_empty());
    assert_eq!(app.notifier.purchases.lock().unwrap().len(), 1);
    assert!(app.search.get(item.id).expect("mirrored").order);
}

#[tokio::test]
async fn opt_out_item_refuses_partial_points() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 300).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::manual(1000)).await;

    let err = purchase_service::purchase_with_points(
        &app.state,
        &auth(&buyer),
        request(item.id, address.id),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::InsufficientPoints));
    assert_eq!(points_of(&app, buyer.id).await, 300);
    assert_eq!(Orders::find().count(&app.state.orm).await.unwrap(), 0);
}

#[tokio::test]
async fn item_without_points_rejects_point_purchase() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 5000).await;
    let address = create_address(&app, &buyer).await;
    let terms = Terms {
        accepts_points: false,
        ..Terms::card(1000)
    };
    let item = create_item(&app, &seller, terms).await;

    let err = purchase_service::purchase_with_points(
        &app.state,
        &auth(&buyer),
        request(item.id, address.id),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::PointsNotAccepted));
    assert_eq!(points_of(&app, buyer.id).await, 5000);
}

#[tokio::test]
async fn hybrid_purchase_charges_the_shortfall_and_deducts_on_callback() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 300).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;
    let user = auth(&buyer);

    let started = purchase_service::purchase_with_points(
        &app.state,
        &user,
        request(item.id, address.id),
    )
    .await
    .expect("session opened")
    .data
    .expect("outcome");
    assert!(started.order.is_none());
    assert!(started.redirect.starts_with("https://checkout.test/"));

    let (session_id, checkout) = app.payments.last_session();
    assert_eq!(checkout.unit_amount, 700);
    assert_eq!(checkout.destination.as_deref(), Some("acct_seller"));
    assert_eq!(checkout.client_reference_id, item.id.to_string());
    assert!(checkout.success_url.contains("points=300"));
    assert!(checkout.success_url.ends_with("&session_id={CHECKOUT_SESSION_ID}"));
    // Nothing moves until the processor confirms payment.
    assert_eq!(points_of(&app, buyer.id).await, 300);

    let callback = || PurchaseCallback {
        item_id: item.id,
        address_id: address.id,
        session_id: Some(session_id.clone()),
        points: Some(300),
    };
    let settled = purchase_service::complete_checkout(&app.state, &user, callback())
        .await
        .expect("callback settles")
        .data
        .expect("outcome");
    let order = settled.order.expect("order created");
    assert_eq!(order.session_id.as_deref(), Some(session_id.as_str()));
    assert_eq!(points_of(&app, buyer.id).await, 0);
    assert_eq!(points_of(&app, seller.id).await, 300);

    // A reloaded success page returns the same order without charging again.
    let replay = purchase_service::complete_checkout(&app.state, &user, callback())
        .await
        .expect("replay")
        .data
        .expect("outcome");
    assert_eq!(replay.order.expect("order").id, order.id);
    assert_eq!(points_of(&app, buyer.id).await, 0);
    assert_eq!(Orders::find().count(&app.state.orm).await.unwrap(), 1);
}

#[tokio::test]
async fn tampered_point_reservation_fails_verification() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 500).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;
    let user = auth(&buyer);

    purchase_service::start_checkout(&app.state, &user, request(item.id, address.id))
        .await
        .expect("session opened");
    let (session_id, checkout) = app.payments.last_session();
    assert_eq!(checkout.unit_amount, 1000);

    let err = purchase_service::complete_checkout(
        &app.state,
        &user,
        PurchaseCallback {
            item_id: item.id,
            address_id: address.id,
            session_id: Some(session_id),
            points: Some(300),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::PaymentNotCompleted));
    assert_eq!(points_of(&app, buyer.id).await, 500);
    assert_eq!(Orders::find().count(&app.state.orm).await.unwrap(), 0);
}

#[tokio::test]
async fn unpaid_or_mismatched_session_is_rejected() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 0).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;
    let user = auth(&buyer);

    purchase_service::start_checkout(&app.state, &user, request(item.id, address.id))
        .await
        .expect("session opened");
    let (session_id, _) = app.payments.last_session();
    let callback = || PurchaseCallback {
        item_id: item.id,
        address_id: address.id,
        session_id: Some(session_id.clone()),
        points: None,
    };

    app.payments.set_payment_status(&session_id, "unpaid");
    let err = purchase_service::complete_checkout(&app.state, &user, callback())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentNotCompleted));

    app.payments.set_payment_status(&session_id, "paid");
    app.payments.set_amount(&session_id, 1);
    let err = purchase_service::complete_checkout(&app.state, &user, callback())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentNotCompleted));

    let err = purchase_service::complete_checkout(
        &app.state,
        &user,
        PurchaseCallback {
            session_id: None,
            ..callback()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert_eq!(Orders::find().count(&app.state.orm).await.unwrap(), 0);
}

#[tokio::test]
async fn manual_transfer_order_carries_a_three_day_deadline() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 0).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::manual(2000)).await;
    let user = auth(&buyer);

    let started = purchase_service::start_checkout(&app.state, &user, request(item.id, address.id))
        .await
        .expect("manual checkout")
        .data
        .expect("outcome");
    assert!(started.redirect.starts_with("https://market.test/api/purchase/callback?"));
    assert!(app.payments.requests.lock().unwrap().is_empty());

    let order = purchase_service::complete_checkout(
        &app.state,
        &user,
        PurchaseCallback {
            item_id: item.id,
            address_id: address.id,
            session_id: None,
            points: None,
        },
    )
    .await
    .expect("manual settle")
    .data
    .and_then(|outcome| outcome.order)
    .expect("order created");

    let deadline = order.expires_at.expect("deadline set");
    assert_eq!((deadline - order.created_at).num_days(), 3);
    assert!(order.session_id.is_none());
}

#[tokio::test]
async fn sold_item_cannot_be_bought_again() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let first = create_user(&app, "first", 1000).await;
    let second = create_user(&app, "second", 1000).await;
    let first_address = create_address(&app, &first).await;
    let second_address = create_address(&app, &second).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;

    purchase_service::purchase_with_points(
        &app.state,
        &auth(&first),
        request(item.id, first_address.id),
    )
    .await
    .expect("first purchase");

    let err = purchase_service::start_checkout(
        &app.state,
        &auth(&second),
        request(item.id, second_address.id),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::ItemAlreadyPurchased));
    assert_eq!(points_of(&app, second.id).await, 1000);
}

#[tokio::test]
async fn lapsed_manual_order_does_not_block_a_new_buyer() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let absent = create_user(&app, "absent", 0).await;
    let buyer = create_user(&app, "buyer", 3000).await;
    let absent_address = create_address(&app, &absent).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::manual(2000)).await;
    let lapsed = create_lapsed_order(&app, &absent, &absent_address, &item).await;

    let order = purchase_service::purchase_with_points(
        &app.state,
        &auth(&buyer),
        request(item.id, address.id),
    )
    .await
    .expect("purchase after lapse")
    .data
    .and_then(|outcome| outcome.order)
    .expect("order created");

    assert_eq!(order.buyer_id, buyer.id);
    assert!(
        Orders::find_by_id(lapsed.id)
            .one(&app.state.orm)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(Orders::find().count(&app.state.orm).await.unwrap(), 1);
    assert_eq!(points_of(&app, seller.id).await, 2000);
    assert!(app.search.get(item.id).expect("mirrored").order);
}

#[tokio::test]
async fn second_order_row_for_an_item_maps_to_already_purchased() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 1000).await;
    let rival = create_user(&app, "rival", 0).await;
    let address = create_address(&app, &buyer).await;
    let rival_address = create_address(&app, &rival).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;

    purchase_service::purchase_with_points(
        &app.state,
        &auth(&buyer),
        request(item.id, address.id),
    )
    .await
    .expect("first purchase");

    let now = Utc::now();
    let duplicate = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(rival.id),
        item_id: Set(item.id),
        address_id: Set(rival_address.id),
        session_id: Set(None),
        expires_at: Set(None),
        shipped: Set(false),
        complete: Set(false),
        tracking: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let err = purchase_service::record_order(&app.state.orm, duplicate)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ItemAlreadyPurchased));
    assert_eq!(Orders::find().count(&app.state.orm).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_purchases_create_a_single_order() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let alice = create_user(&app, "alice", 2000).await;
    let bob = create_user(&app, "bob", 2000).await;
    let alice_address = create_address(&app, &alice).await;
    let bob_address = create_address(&app, &bob).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;
    let (alice_auth, bob_auth) = (auth(&alice), auth(&bob));

    let (a, b) = tokio::join!(
        purchase_service::purchase_with_points(
            &app.state,
            &alice_auth,
            request(item.id, alice_address.id),
        ),
        purchase_service::purchase_with_points(
            &app.state,
            &bob_auth,
            request(item.id, bob_address.id),
        ),
    );

    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::ItemAlreadyPurchased)))
    );

    assert_eq!(Orders::find().count(&app.state.orm).await.unwrap(), 1);
    assert_eq!(points_of(&app, seller.id).await, 1000);
    let spent = 4000 - points_of(&app, alice.id).await - points_of(&app, bob.id).await;
    assert_eq!(spent, 1000);
}

#[tokio::test]
async fn suspended_buyer_is_refused_without_side_effects() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 5000).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;
    suspend(&app, &buyer).await;

    let err = purchase_service::purchase_with_points(
        &app.state,
        &auth(&buyer),
        request(item.id, address.id),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::AccountSuspended));
    assert_eq!(points_of(&app, buyer.id).await, 5000);
    assert_eq!(Orders::find().count(&app.state.orm).await.unwrap(), 0);
    assert!(app.notifier.purchases.lock().unwrap().is_empty());
}

#[tokio::test]
async fn items_of_suspended_sellers_are_not_for_sale() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 0).await;
    let buyer = create_user(&app, "buyer", 5000).await;
    let address = create_address(&app, &buyer).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;
    suspend(&app, &seller).await;

    let err = purchase_service::start_checkout(&app.state, &auth(&buyer), request(item.id, address.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ItemNotFound));
}

#[tokio::test]
async fn sellers_cannot_buy_their_own_items() {
    let app = setup().await;
    let seller = create_user(&app, "seller", 5000).await;
    let address = create_address(&app, &seller).await;
    let item = create_item(&app, &seller, Terms::card(1000)).await;

    let err = purchase_service::purchase_with_points(
        &app.state,
        &auth(&seller),
        request(item.id, address.id),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}
