use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{Items, Users, addresses, items, users},
    middleware::auth::{ADMIN_ROLE, USER_ROLE, issue_token},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin", ADMIN_ROLE, 0).await?;
    let seller_id = ensure_user(&orm, "seller", USER_ROLE, 0).await?;
    let buyer_id = ensure_user(&orm, "buyer", USER_ROLE, 5_000).await?;
    ensure_address(&orm, buyer_id).await?;
    seed_items(&orm, seller_id).await?;

    let ttl = Duration::days(30);
    for (label, id, role) in [
        ("admin", admin_id, ADMIN_ROLE),
        ("seller", seller_id, USER_ROLE),
        ("buyer", buyer_id, USER_ROLE),
    ] {
        let token = issue_token(&config.jwt_secret, id, role, ttl)?;
        println!("{label} {id}\n  token: {token}");
    }

    println!("Seed completed");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    name: &str,
    role: &str,
    points: i64,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(users::Column::Name.eq(name))
        .one(orm)
        .await?
    {
        return Ok(existing.id);
    }

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        avatar_url: Set(None),
        points: Set(points),
        suspended: Set(false),
        role: Set(role.to_string()),
        payout_account_id: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Ensured user {name} (role={role})");
    Ok(user.id)
}

async fn ensure_address(orm: &DatabaseConnection, user_id: Uuid) -> anyhow::Result<()> {
    let exists = addresses::Entity::find()
        .filter(addresses::Column::UserId.eq(user_id))
        .one(orm)
        .await?
        .is_some();
    if exists {
        return Ok(());
    }

    addresses::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        zip: Set("1000001".to_string()),
        prefecture: Set("東京都".to_string()),
        city: Set("千代田区".to_string()),
        street: Set("千代田1-1".to_string()),
        building: Set(None),
        phone: Set("0312345678".to_string()),
        last_name: Set("山田".to_string()),
        first_name: Set("太郎".to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;
    Ok(())
}

async fn seed_items(orm: &DatabaseConnection, seller_id: Uuid) -> anyhow::Result<()> {
    // (name, category, price, accepts_points, processor_opt_out)
    let listings = [
        ("ThinkPad X1 Carbon", 331, 48_000, true, false),
        ("Window Air Conditioner", 412, 12_000, false, false),
        ("Manga Volume 1", 203, 800, true, true),
        ("Ferris Plush", 999, 1_500, true, false),
    ];

    for (name, category, price, accepts_points, processor_opt_out) in listings {
        let exists = Items::find()
            .filter(items::Column::UserId.eq(seller_id))
            .filter(items::Column::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let now = Utc::now();
        items::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(seller_id),
            name: Set(name.to_string()),
            description: Set(format!("{name} in good shape")),
            condition: Set("good".to_string()),
            shipping: Set("seller".to_string()),
            delivery_days: Set(3),
            category: Set(category),
            price: Set(price),
            accepts_points: Set(accepts_points),
            processor_opt_out: Set(processor_opt_out),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded items; run the reindex binary to publish them to search");
    Ok(())
}
