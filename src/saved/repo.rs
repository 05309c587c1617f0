use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedProperty {
    pub id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct CountedSavedProperty {
    #[sqlx(flatten)]
    pub inner: SavedProperty,
    pub total_count: i64,
}

const COLUMNS: &str =
    "id, user_id, listing_id, status, notes, pros, cons, created_at, updated_at";

pub struct NewSavedProperty {
    pub listing_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

/// The `(user_id, listing_id)` unique constraint is the duplicate-save
/// gate; violations surface to the caller as validation errors.
pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    new: &NewSavedProperty,
) -> sqlx::Result<SavedProperty> {
    sqlx::query_as::<_, SavedProperty>(&format!(
        r#"
        INSERT INTO saved_properties (user_id, listing_id, status, notes, pros, cons)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(new.listing_id)
    .bind(&new.status)
    .bind(&new.notes)
    .bind(&new.pros)
    .bind(&new.cons)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<SavedProperty>> {
    sqlx::query_as::<_, SavedProperty>(&format!(
        "SELECT {COLUMNS} FROM saved_properties WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_by_user_listing(
    db: &PgPool,
    user_id: Uuid,
    listing_id: Uuid,
) -> sqlx::Result<Option<SavedProperty>> {
    sqlx::query_as::<_, SavedProperty>(&format!(
        "SELECT {COLUMNS} FROM saved_properties WHERE user_id = $1 AND listing_id = $2"
    ))
    .bind(user_id)
    .bind(listing_id)
    .fetch_optional(db)
    .await
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<SavedProperty>, i64)> {
    let rows: Vec<CountedSavedProperty> = sqlx::query_as(&format!(
        r#"
        SELECT {COLUMNS}, COUNT(*) OVER () AS total_count
        FROM saved_properties
        WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(user_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    Ok((rows.into_iter().map(|r| r.inner).collect(), total))
}

pub struct SavedPatch {
    pub status: Option<String>,
    pub notes: Option<String>,
    pub pros: Option<Vec<String>>,
    pub cons: Option<Vec<String>>,
}

pub async fn update_fields(
    db: &PgPool,
    id: Uuid,
    patch: &SavedPatch,
) -> sqlx::Result<SavedProperty> {
    sqlx::query_as::<_, SavedProperty>(&format!(
        r#"
        UPDATE saved_properties SET
            status     = COALESCE($2, status),
            notes      = COALESCE($3, notes),
            pros       = COALESCE($4, pros),
            cons       = COALESCE($5, cons),
            updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&patch.status)
    .bind(&patch.notes)
    .bind(&patch.pros)
    .bind(&patch.cons)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM saved_properties WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Which of the given listings has this user already saved? One query per
/// page of search results.
pub async fn saved_listing_ids(
    db: &PgPool,
    user_id: Uuid,
    listing_ids: &[Uuid],
) -> sqlx::Result<Vec<Uuid>> {
    if listing_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_scalar::<_, Uuid>(
        "SELECT listing_id FROM saved_properties WHERE user_id = $1 AND listing_id = ANY($2)",
    )
    .bind(user_id)
    .bind(listing_ids)
    .fetch_all(db)
    .await
}
