use tracing::{error, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::images::services as images;
use crate::images::services::UploadItem;
use crate::ownership::ensure_found_and_owned;
use crate::state::AppState;

use super::repo::{self, Listing, NewListing};

/// Loads a listing and asserts the requester owns it.
pub async fn owned_listing(state: &AppState, id: Uuid, requester: Uuid) -> ApiResult<Listing> {
    let row = repo::find_by_id(&state.db, id).await?;
    ensure_found_and_owned(row, requester, |l| l.user_id, "listing")
}

fn check_image_cap(state: &AppState, total: usize) -> ApiResult<()> {
    let cap = state.config.max_images_per_listing;
    if total > cap {
        return Err(ApiError::Validation(format!(
            "A listing can have at most {cap} images"
        )));
    }
    Ok(())
}

/// Create path: the row is inserted first, then images are uploaded and
/// attached. If anything after the insert fails, the uploads are rolled back
/// and the row is deleted, so no listing survives with zero or partial images.
pub async fn create_with_images(
    state: &AppState,
    user_id: Uuid,
    new: NewListing,
    files: Vec<UploadItem>,
) -> ApiResult<Listing> {
    if files.is_empty() {
        return Err(ApiError::validation("At least one image is required"));
    }
    check_image_cap(state, files.len())?;

    let listing = repo::insert(&state.db, user_id, &new).await?;

    let keys = match images::upload_many(&state.storage, listing.id, files).await {
        Ok(keys) => keys,
        Err(e) => {
            undo_create(state, listing.id, &[]).await;
            return Err(e);
        }
    };

    match repo::set_images(&state.db, listing.id, &keys).await {
        Ok(listing) => {
            info!(listing_id = %listing.id, images = keys.len(), "listing created");
            Ok(listing)
        }
        Err(e) => {
            undo_create(state, listing.id, &keys).await;
            Err(e.into())
        }
    }
}

async fn undo_create(state: &AppState, listing_id: Uuid, uploaded: &[String]) {
    images::delete_keys(&state.storage, uploaded).await;
    if let Err(e) = repo::delete_row(&state.db, listing_id).await {
        error!(error = %e, %listing_id, "failed to remove listing after create rollback");
    }
}

/// Pure additions append after the existing order.
pub async fn add_images(
    state: &AppState,
    listing_id: Uuid,
    requester: Uuid,
    files: Vec<UploadItem>,
) -> ApiResult<Listing> {
    if files.is_empty() {
        return Err(ApiError::validation("No images provided"));
    }
    let listing = owned_listing(state, listing_id, requester).await?;
    check_image_cap(state, listing.images.len() + files.len())?;

    let new_keys = images::upload_many(&state.storage, listing.id, files).await?;

    let mut all = listing.images;
    all.extend(new_keys.iter().cloned());
    match repo::set_images(&state.db, listing.id, &all).await {
        Ok(listing) => Ok(listing),
        Err(e) => {
            // keep the listing, discard only this call's uploads
            images::delete_keys(&state.storage, &new_keys).await;
            Err(e.into())
        }
    }
}

/// Removals commit the new reference list first; the remote objects are then
/// cleaned up best-effort.
pub async fn remove_images(
    state: &AppState,
    listing_id: Uuid,
    requester: Uuid,
    to_remove: Vec<String>,
) -> ApiResult<Listing> {
    if to_remove.is_empty() {
        return Err(ApiError::validation("No images provided"));
    }
    let listing = owned_listing(state, listing_id, requester).await?;

    for key in &to_remove {
        if !listing.images.contains(key) {
            return Err(ApiError::not_found("Image"));
        }
    }

    let retained: Vec<String> = listing
        .images
        .iter()
        .filter(|key| !to_remove.contains(key))
        .cloned()
        .collect();
    if retained.is_empty() {
        return Err(ApiError::validation("A listing must keep at least one image"));
    }

    let removed = images::diff_removed(&listing.images, &retained);
    let updated = repo::set_images(&state.db, listing.id, &retained).await?;
    // the row now holds the retained list; remote deletes are queued,
    // retried in the background and never block or fail this request
    state.cleanup.enqueue(removed);
    Ok(updated)
}

/// Reordering only permutes the existing reference set.
pub async fn reorder_images(
    state: &AppState,
    listing_id: Uuid,
    requester: Uuid,
    submitted: Vec<String>,
) -> ApiResult<Listing> {
    let listing = owned_listing(state, listing_id, requester).await?;
    images::validate_reorder(&listing.images, &submitted)?;
    Ok(repo::set_images(&state.db, listing.id, &submitted).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rust_decimal::Decimal;

    fn new_listing() -> NewListing {
        NewListing {
            title: "Sunny cottage".into(),
            description: None,
            address: "1 Shore Rd".into(),
            city: "Galway".into(),
            county: "Galway".into(),
            price: Decimal::new(285_000, 0),
            bedrooms: 3,
            bathrooms: 2,
            floor_area_sqm: None,
            property_type: "house".into(),
        }
    }

    fn jpeg() -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"jpeg-bytes"),
            content_type: "image/jpeg".into(),
        }
    }

    #[tokio::test]
    async fn create_requires_at_least_one_image() {
        let state = AppState::fake();
        let err = create_with_images(&state, Uuid::new_v4(), new_listing(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn create_rejects_more_images_than_the_cap() {
        let state = AppState::fake();
        let cap = state.config.max_images_per_listing;
        let files: Vec<UploadItem> = (0..cap + 1).map(|_| jpeg()).collect();
        let err = create_with_images(&state, Uuid::new_v4(), new_listing(), files)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
