use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comparison {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub listing_ids: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct CountedComparison {
    #[sqlx(flatten)]
    pub inner: Comparison,
    pub total_count: i64,
}

const COLUMNS: &str = "id, user_id, name, listing_ids, created_at, updated_at";

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
    listing_ids: &[Uuid],
) -> sqlx::Result<Comparison> {
    sqlx::query_as::<_, Comparison>(&format!(
        r#"
        INSERT INTO comparisons (user_id, name, listing_ids)
        VALUES ($1, $2, $3)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(name)
    .bind(listing_ids)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Comparison>> {
    sqlx::query_as::<_, Comparison>(&format!(
        "SELECT {COLUMNS} FROM comparisons WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Comparison>, i64)> {
    let rows: Vec<CountedComparison> = sqlx::query_as(&format!(
        r#"
        SELECT {COLUMNS}, COUNT(*) OVER () AS total_count
        FROM comparisons
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    Ok((rows.into_iter().map(|r| r.inner).collect(), total))
}

pub async fn update_fields(
    db: &PgPool,
    id: Uuid,
    name: Option<&str>,
    listing_ids: Option<&[Uuid]>,
) -> sqlx::Result<Comparison> {
    sqlx::query_as::<_, Comparison>(&format!(
        r#"
        UPDATE comparisons SET
            name        = COALESCE($2, name),
            listing_ids = COALESCE($3, listing_ids),
            updated_at  = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(listing_ids)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM comparisons WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
