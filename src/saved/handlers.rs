use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    enums::ClosedEnum,
    error::{map_unique, ApiError, ApiResult},
    listings::{self, dto::ListingResponse},
    ownership::ensure_found_and_owned,
    pagination::Paginated,
    state::AppState,
    tags,
};

use super::{
    dto::{
        CreateSavedRequest, ListSavedQuery, SavedPropertyResponse, SavedStatus,
        UpdateSavedRequest,
    },
    repo::{self, NewSavedProperty, SavedPatch, SavedProperty},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/saved-properties", get(list_saved).post(create_saved))
        .route(
            "/saved-properties/:id",
            get(get_saved).patch(update_saved).delete(delete_saved),
        )
        .route(
            "/saved-properties/:id/tags/:tag_id",
            post(attach_tag).delete(detach_tag),
        )
}

pub async fn owned_saved(
    state: &AppState,
    id: Uuid,
    requester: Uuid,
) -> ApiResult<SavedProperty> {
    let row = repo::find_by_id(&state.db, id).await?;
    ensure_found_and_owned(row, requester, |s| s.user_id, "saved property")
}

#[instrument(skip(state, payload))]
pub async fn create_saved(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateSavedRequest>,
) -> ApiResult<(StatusCode, Json<SavedPropertyResponse>)> {
    let status = match payload.status.as_deref() {
        Some(raw) => SavedStatus::parse(raw)?,
        None => SavedStatus::Saved,
    };

    let listing = listings::repo::find_by_id(&state.db, payload.listing_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing"))?;
    if !listing.is_active {
        return Err(ApiError::validation("Listing is no longer active"));
    }

    let new = NewSavedProperty {
        listing_id: payload.listing_id,
        status: status.as_str().to_string(),
        notes: payload.notes,
        pros: payload.pros.unwrap_or_default(),
        cons: payload.cons.unwrap_or_default(),
    };
    let saved = repo::insert(&state.db, user_id, &new)
        .await
        .map_err(|e| map_unique(e, "Listing already saved"))?;

    info!(saved_id = %saved.id, listing_id = %saved.listing_id, "listing saved");
    Ok((
        StatusCode::CREATED,
        Json(SavedPropertyResponse::from_row(saved, None, None)),
    ))
}

#[instrument(skip(state))]
pub async fn list_saved(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListSavedQuery>,
) -> ApiResult<Json<Paginated<SavedPropertyResponse>>> {
    let status = q
        .status
        .as_deref()
        .map(|raw| SavedStatus::parse(raw).map(|s| s.as_str()))
        .transpose()?;
    let (page, limit, offset) = q.page_params().normalize(20);

    let (rows, total) = repo::list_by_user(&state.db, user_id, status, limit, offset).await?;

    // one listing fetch for the page
    let listing_ids: Vec<Uuid> = rows.iter().map(|r| r.listing_id).collect();
    let mut listings_by_id: HashMap<Uuid, ListingResponse> =
        listings::repo::find_many(&state.db, &listing_ids)
            .await?
            .into_iter()
            .map(|l| (l.id, ListingResponse::from_listing(l, None)))
            .collect();

    let data = rows
        .into_iter()
        .map(|row| {
            let listing = listings_by_id.remove(&row.listing_id);
            SavedPropertyResponse::from_row(row, listing, None)
        })
        .collect();
    Ok(Json(Paginated::new(data, total, page, limit)))
}

#[instrument(skip(state))]
pub async fn get_saved(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SavedPropertyResponse>> {
    let saved = owned_saved(&state, id, user_id).await?;

    let listing = listings::repo::find_by_id(&state.db, saved.listing_id)
        .await?
        .map(|l| ListingResponse::from_listing(l, None));
    let tag_rows = tags::repo::tags_for_saved_property(&state.db, saved.id).await?;
    let tag_dtos = tag_rows.into_iter().map(Into::into).collect();

    Ok(Json(SavedPropertyResponse::from_row(
        saved,
        listing,
        Some(tag_dtos),
    )))
}

#[instrument(skip(state, payload))]
pub async fn update_saved(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSavedRequest>,
) -> ApiResult<Json<SavedPropertyResponse>> {
    if payload.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }
    let status = payload
        .status
        .as_deref()
        .map(|raw| SavedStatus::parse(raw).map(|s| s.as_str().to_string()))
        .transpose()?;

    owned_saved(&state, id, user_id).await?;
    let patch = SavedPatch {
        status,
        notes: payload.notes,
        pros: payload.pros,
        cons: payload.cons,
    };
    let saved = repo::update_fields(&state.db, id, &patch).await?;
    Ok(Json(SavedPropertyResponse::from_row(saved, None, None)))
}

#[instrument(skip(state))]
pub async fn delete_saved(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_saved(&state, id, user_id).await?;
    repo::delete(&state.db, id).await?;
    info!(saved_id = %id, "saved property removed");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Both sides must belong to the caller before an association is made.
#[instrument(skip(state))]
pub async fn attach_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_saved(&state, id, user_id).await?;
    tags::handlers::owned_tag(&state, tag_id, user_id).await?;

    tags::repo::attach(&state.db, id, tag_id)
        .await
        .map_err(|e| map_unique(e, "Tag already attached"))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[instrument(skip(state))]
pub async fn detach_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((id, tag_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_saved(&state, id, user_id).await?;
    tags::handlers::owned_tag(&state, tag_id, user_id).await?;

    let removed = tags::repo::detach(&state.db, id, tag_id).await?;
    if removed == 0 {
        return Err(ApiError::not_found("Tag association"));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
