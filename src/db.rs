use anyhow::{Result, bail};
use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, EntityTrait, Schema, SqlErr,
};

use crate::entity::{
    Addresses, AuditLogs, Chats, Comments, Favorites, Images, Items, Orders, PointTopups, Reports,
    Reviews, Users, favorites,
};

pub type OrmConn = DatabaseConnection;

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let conn = Database::connect(database_url).await?;
    Ok(conn)
}

/// Applies the SQL migrations in `migrations/` to a PostgreSQL database.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    if conn.get_database_backend() != DbBackend::Postgres {
        bail!("SQL migrations target PostgreSQL; use create_schema for other backends");
    }
    let pool = conn.get_postgres_connection_pool();
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Builds every table straight from the entity definitions. Used for
/// throwaway SQLite databases where the PostgreSQL migrations do not apply.
pub async fn create_schema(conn: &DatabaseConnection) -> Result<()> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    create_table(conn, &schema, Users).await?;
    create_table(conn, &schema, Items).await?;
    create_table(conn, &schema, Images).await?;
    create_table(conn, &schema, Addresses).await?;
    create_table(conn, &schema, Orders).await?;
    create_table(conn, &schema, Comments).await?;
    create_table(conn, &schema, Chats).await?;
    create_table(conn, &schema, Reviews).await?;
    create_table(conn, &schema, Reports).await?;
    create_table(conn, &schema, Favorites).await?;
    create_table(conn, &schema, PointTopups).await?;
    create_table(conn, &schema, AuditLogs).await?;

    let favorites_unique = Index::create()
        .name("idx_favorites_user_item")
        .table(Favorites)
        .col(favorites::Column::UserId)
        .col(favorites::Column::ItemId)
        .unique()
        .if_not_exists()
        .to_owned();
    conn.execute(backend.build(&favorites_unique)).await?;

    Ok(())
}

async fn create_table<E: EntityTrait>(
    conn: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<()> {
    let backend = conn.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
