use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Viewing {
    pub id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub saved_property_id: Option<Uuid>,
    pub scheduled_at: OffsetDateTime,
    pub duration_minutes: i32,
    pub attended: bool,
    pub notes: Option<String>,
    pub rating: Option<i16>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct CountedViewing {
    #[sqlx(flatten)]
    pub inner: Viewing,
    pub total_count: i64,
}

const COLUMNS: &str = "id, user_id, listing_id, saved_property_id, scheduled_at, \
     duration_minutes, attended, notes, rating, created_at, updated_at";

pub struct NewViewing {
    pub listing_id: Uuid,
    pub saved_property_id: Option<Uuid>,
    pub scheduled_at: OffsetDateTime,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

pub async fn insert(db: &PgPool, user_id: Uuid, new: &NewViewing) -> sqlx::Result<Viewing> {
    sqlx::query_as::<_, Viewing>(&format!(
        r#"
        INSERT INTO viewings
            (user_id, listing_id, saved_property_id, scheduled_at, duration_minutes, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(new.listing_id)
    .bind(new.saved_property_id)
    .bind(new.scheduled_at)
    .bind(new.duration_minutes)
    .bind(&new.notes)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Viewing>> {
    sqlx::query_as::<_, Viewing>(&format!("SELECT {COLUMNS} FROM viewings WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Viewing>, i64)> {
    let rows: Vec<CountedViewing> = sqlx::query_as(&format!(
        r#"
        SELECT {COLUMNS}, COUNT(*) OVER () AS total_count
        FROM viewings
        WHERE user_id = $1
        ORDER BY scheduled_at DESC
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

/// Future, not-yet-attended appointments, soonest first.
pub async fn upcoming_by_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Viewing>> {
    sqlx::query_as::<_, Viewing>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM viewings
        WHERE user_id = $1 AND attended = FALSE AND scheduled_at > now()
        ORDER BY scheduled_at ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub struct ViewingPatch {
    pub scheduled_at: Option<OffsetDateTime>,
    pub duration_minutes: Option<i32>,
    pub attended: Option<bool>,
    pub notes: Option<String>,
    pub rating: Option<i16>,
}

pub async fn update_fields(db: &PgPool, id: Uuid, patch: &ViewingPatch) -> sqlx::Result<Viewing> {
    sqlx::query_as::<_, Viewing>(&format!(
        r#"
        UPDATE viewings SET
            scheduled_at     = COALESCE($2, scheduled_at),
            duration_minutes = COALESCE($3, duration_minutes),
            attended         = COALESCE($4, attended),
            notes            = COALESCE($5, notes),
            rating           = COALESCE($6, rating),
            updated_at       = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(patch.scheduled_at)
    .bind(patch.duration_minutes)
    .bind(patch.attended)
    .bind(&patch.notes)
    .bind(patch.rating)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM viewings WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn count_upcoming(db: &PgPool, user_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM viewings WHERE user_id = $1 AND attended = FALSE AND scheduled_at > now()",
    )
    .bind(user_id)
    .fetch_one(db)
    .await
}
