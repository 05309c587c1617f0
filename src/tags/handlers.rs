use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{map_unique, ApiError, ApiResult},
    ownership::ensure_found_and_owned,
    state::AppState,
};

use super::{
    dto::{CreateTagRequest, TagResponse, UpdateTagRequest},
    repo::{self, Tag},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/:id", axum::routing::patch(update_tag).delete(delete_tag))
}

pub async fn owned_tag(state: &AppState, id: Uuid, requester: Uuid) -> ApiResult<Tag> {
    let row = repo::find_by_id(&state.db, id).await?;
    ensure_found_and_owned(row, requester, |t| t.user_id, "tag")
}

fn validated_name(raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Tag name cannot be empty"));
    }
    if name.len() > 50 {
        return Err(ApiError::validation("Tag name is too long"));
    }
    Ok(name.to_string())
}

#[instrument(skip(state, payload))]
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTagRequest>,
) -> ApiResult<(StatusCode, Json<TagResponse>)> {
    let name = validated_name(&payload.name)?;
    let tag = repo::insert(&state.db, user_id, &name, payload.color.as_deref())
        .await
        .map_err(|e| map_unique(e, "A tag with this name already exists"))?;
    info!(tag_id = %tag.id, "tag created");
    Ok((StatusCode::CREATED, Json(tag.into())))
}

#[instrument(skip(state))]
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<TagResponse>>> {
    let tags = repo::list_by_user(&state.db, user_id).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn update_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTagRequest>,
) -> ApiResult<Json<TagResponse>> {
    if payload.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }
    let name = payload.name.as_deref().map(validated_name).transpose()?;

    owned_tag(&state, id, user_id).await?;
    let tag = repo::update_fields(&state.db, id, name.as_deref(), payload.color.as_deref())
        .await
        .map_err(|e| map_unique(e, "A tag with this name already exists"))?;
    Ok(Json(tag.into()))
}

#[instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_tag(&state, id, user_id).await?;
    repo::delete(&state.db, id).await?;
    info!(tag_id = %id, "tag deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_names_are_trimmed_and_bounded() {
        assert_eq!(validated_name("  Favorite ").unwrap(), "Favorite");
        assert!(validated_name("   ").is_err());
        assert!(validated_name(&"x".repeat(51)).is_err());
    }
}
