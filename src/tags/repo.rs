use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at: OffsetDateTime,
}

const COLUMNS: &str = "id, user_id, name, color, created_at";

/// The `(user_id, name)` unique constraint scopes tag names per user.
pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
    color: Option<&str>,
) -> sqlx::Result<Tag> {
    sqlx::query_as::<_, Tag>(&format!(
        r#"
        INSERT INTO tags (user_id, name, color)
        VALUES ($1, $2, $3)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(name)
    .bind(color)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Tag>> {
    sqlx::query_as::<_, Tag>(&format!("SELECT {COLUMNS} FROM tags WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(&format!(
        "SELECT {COLUMNS} FROM tags WHERE user_id = $1 ORDER BY name ASC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn update_fields(
    db: &PgPool,
    id: Uuid,
    name: Option<&str>,
    color: Option<&str>,
) -> sqlx::Result<Tag> {
    sqlx::query_as::<_, Tag>(&format!(
        r#"
        UPDATE tags SET
            name  = COALESCE($2, name),
            color = COALESCE($3, color)
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(color)
    .fetch_one(db)
    .await
}

/// Associations go with the tag (ON DELETE CASCADE on the join table).
pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn attach(db: &PgPool, saved_property_id: Uuid, tag_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO saved_property_tags (saved_property_id, tag_id) VALUES ($1, $2)")
        .bind(saved_property_id)
        .bind(tag_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Returns the number of associations removed; zero means the pair was
/// never associated.
pub async fn detach(db: &PgPool, saved_property_id: Uuid, tag_id: Uuid) -> sqlx::Result<u64> {
    let result =
        sqlx::query("DELETE FROM saved_property_tags WHERE saved_property_id = $1 AND tag_id = $2")
            .bind(saved_property_id)
            .bind(tag_id)
            .execute(db)
            .await?;
    Ok(result.rows_affected())
}

pub async fn tags_for_saved_property(
    db: &PgPool,
    saved_property_id: Uuid,
) -> sqlx::Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.user_id, t.name, t.color, t.created_at
        FROM tags t
        JOIN saved_property_tags spt ON spt.tag_id = t.id
        WHERE spt.saved_property_id = $1
        ORDER BY t.name ASC
        "#,
    )
    .bind(saved_property_id)
    .fetch_all(db)
    .await
}
