use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, ApiResult},
    listings, ownership::ensure_found_and_owned,
    pagination::Paginated,
    saved,
    state::AppState,
};

use super::{
    dto::{CreateViewingRequest, ListViewingsQuery, UpdateViewingRequest, ViewingResponse},
    repo::{self, NewViewing, Viewing, ViewingPatch},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/viewings", get(list_viewings).post(create_viewing))
        .route("/viewings/upcoming", get(upcoming_viewings))
        .route(
            "/viewings/:id",
            axum::routing::patch(update_viewing).delete(delete_viewing),
        )
}

async fn owned_viewing(state: &AppState, id: Uuid, requester: Uuid) -> ApiResult<Viewing> {
    let row = repo::find_by_id(&state.db, id).await?;
    ensure_found_and_owned(row, requester, |v| v.user_id, "viewing")
}

fn validated_rating(rating: Option<i16>) -> ApiResult<Option<i16>> {
    if let Some(r) = rating {
        if !(1..=5).contains(&r) {
            return Err(ApiError::validation("rating must be between 1 and 5"));
        }
    }
    Ok(rating)
}

fn validated_duration(minutes: i32) -> ApiResult<i32> {
    if minutes <= 0 {
        return Err(ApiError::validation("duration_minutes must be positive"));
    }
    Ok(minutes)
}

#[instrument(skip(state, payload))]
pub async fn create_viewing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateViewingRequest>,
) -> ApiResult<(StatusCode, Json<ViewingResponse>)> {
    let duration = validated_duration(payload.duration_minutes.unwrap_or(30))?;

    let listing = listings::repo::find_by_id(&state.db, payload.listing_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing"))?;
    if !listing.is_active {
        return Err(ApiError::validation("Listing is no longer active"));
    }

    // Link an existing saved property for this (user, listing) now or never;
    // the link is not attached retroactively.
    let saved_property_id =
        saved::repo::find_by_user_listing(&state.db, user_id, payload.listing_id)
            .await?
            .map(|s| s.id);

    let new = NewViewing {
        listing_id: payload.listing_id,
        saved_property_id,
        scheduled_at: payload.scheduled_at,
        duration_minutes: duration,
        notes: payload.notes,
    };
    let viewing = repo::insert(&state.db, user_id, &new).await?;
    info!(viewing_id = %viewing.id, listing_id = %viewing.listing_id, "viewing scheduled");
    Ok((StatusCode::CREATED, Json(viewing.into())))
}

#[instrument(skip(state))]
pub async fn list_viewings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListViewingsQuery>,
) -> ApiResult<Json<Paginated<ViewingResponse>>> {
    let (page, limit, offset) = q.page_params().normalize(20);
    let (rows, total) = repo::list_by_user(&state.db, user_id, limit, offset).await?;
    let data = rows.into_iter().map(ViewingResponse::from).collect();
    Ok(Json(Paginated::new(data, total, page, limit)))
}

#[instrument(skip(state))]
pub async fn upcoming_viewings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<ViewingResponse>>> {
    let rows = repo::upcoming_by_user(&state.db, user_id).await?;
    Ok(Json(rows.into_iter().map(ViewingResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn update_viewing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateViewingRequest>,
) -> ApiResult<Json<ViewingResponse>> {
    if payload.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }
    let rating = validated_rating(payload.rating)?;
    if let Some(minutes) = payload.duration_minutes {
        validated_duration(minutes)?;
    }

    owned_viewing(&state, id, user_id).await?;
    let patch = ViewingPatch {
        scheduled_at: payload.scheduled_at,
        duration_minutes: payload.duration_minutes,
        attended: payload.attended,
        notes: payload.notes,
        rating,
    };
    let viewing = repo::update_fields(&state.db, id, &patch).await?;
    Ok(Json(viewing.into()))
}

#[instrument(skip(state))]
pub async fn delete_viewing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_viewing(&state, id, user_id).await?;
    repo::delete(&state.db, id).await?;
    info!(viewing_id = %id, "viewing removed");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(validated_rating(None).is_ok());
        assert!(validated_rating(Some(1)).is_ok());
        assert!(validated_rating(Some(5)).is_ok());
        assert!(validated_rating(Some(0)).is_err());
        assert!(validated_rating(Some(6)).is_err());
    }

    #[test]
    fn duration_must_be_positive() {
        assert_eq!(validated_duration(45).unwrap(), 45);
        assert!(validated_duration(0).is_err());
        assert!(validated_duration(-15).is_err());
    }
}
