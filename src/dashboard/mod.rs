use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    enums::ClosedEnum,
    error::ApiResult,
    saved::dto::SavedStatus,
    state::AppState,
    viewings,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[derive(Debug, Serialize)]
pub struct SavedStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub active_listings: i64,
    pub saved_properties: SavedStats,
    pub upcoming_viewings: i64,
    pub comparisons: i64,
    pub tags: i64,
}

async fn count_owned(db: &PgPool, table_sql: &str, user_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(table_sql)
        .bind(user_id)
        .fetch_one(db)
        .await
}

async fn saved_stats(db: &PgPool, user_id: Uuid) -> sqlx::Result<SavedStats> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM saved_properties WHERE user_id = $1 GROUP BY status",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    // every status is present in the payload, zeroed when unused
    let mut by_status: BTreeMap<String, i64> = SavedStatus::VALUES
        .iter()
        .map(|(name, _)| (name.to_string(), 0))
        .collect();
    let mut total = 0;
    for (status, count) in rows {
        total += count;
        by_status.insert(status, count);
    }
    Ok(SavedStats { total, by_status })
}

/// Aggregate counts across the caller's resources.
#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<DashboardResponse>> {
    let active_listings = count_owned(
        &state.db,
        "SELECT COUNT(*) FROM listings WHERE user_id = $1 AND is_active = TRUE",
        user_id,
    )
    .await?;
    let saved_properties = saved_stats(&state.db, user_id).await?;
    let upcoming_viewings = viewings::repo::count_upcoming(&state.db, user_id).await?;
    let comparisons = count_owned(
        &state.db,
        "SELECT COUNT(*) FROM comparisons WHERE user_id = $1",
        user_id,
    )
    .await?;
    let tags = count_owned(
        &state.db,
        "SELECT COUNT(*) FROM tags WHERE user_id = $1",
        user_id,
    )
    .await?;

    Ok(Json(DashboardResponse {
        active_listings,
        saved_properties,
        upcoming_viewings,
        comparisons,
        tags,
    }))
}
