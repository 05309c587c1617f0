use std::collections::{HashMap, HashSet};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::{AuthUser, OptionalAuthUser},
    enums::ClosedEnum,
    error::{ApiError, ApiResult},
    images::services::UploadItem,
    pagination::{Paginated, SortKey},
    saved,
    state::AppState,
};

use super::{
    dto::{
        ListingResponse, MyListingsQuery, PropertyType, RemoveImagesRequest,
        ReorderImagesRequest, SearchListingsQuery, UpdateListingRequest,
    },
    repo::{self, ListingPatch, NewListing, SearchFilter},
    services,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/listings", get(search_listings).post(create_listing))
        .route("/listings/mine", get(my_listings))
        .route(
            "/listings/:id",
            get(get_listing).patch(update_listing).delete(delete_listing),
        )
        .route(
            "/listings/:id/images",
            post(add_images).delete(remove_images),
        )
        .route("/listings/:id/images/order", put(reorder_images))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

fn validated_types(raw: Option<&str>) -> ApiResult<Option<Vec<String>>> {
    let Some(raw) = raw else { return Ok(None) };
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        out.push(PropertyType::parse(part)?.as_str().to_string());
    }
    Ok((!out.is_empty()).then_some(out))
}

#[instrument(skip(state))]
pub async fn search_listings(
    State(state): State<AppState>,
    OptionalAuthUser(user_id): OptionalAuthUser,
    Query(q): Query<SearchListingsQuery>,
) -> ApiResult<Json<Paginated<ListingResponse>>> {
    let filter = SearchFilter {
        owner: None,
        only_active: true,
        city: q.city.clone(),
        county: q.county.clone(),
        price_min: q.price_min,
        price_max: q.price_max,
        min_bedrooms: q.min_bedrooms.or(q.bedrooms),
        min_bathrooms: q.min_bathrooms.or(q.bathrooms),
        property_types: validated_types(q.property_types.as_deref())?,
    };
    let sort = SortKey::parse(q.sort.as_deref());
    let (page, limit, offset) = q.page_params().normalize(10);

    let (listings, total) = repo::search(&state.db, &filter, sort, limit, offset).await?;

    // one existence lookup for the whole page, not one per row
    let saved_ids: HashSet<Uuid> = match user_id {
        Some(user_id) => {
            let ids: Vec<Uuid> = listings.iter().map(|l| l.id).collect();
            saved::repo::saved_listing_ids(&state.db, user_id, &ids)
                .await?
                .into_iter()
                .collect()
        }
        None => HashSet::new(),
    };

    let data = listings
        .into_iter()
        .map(|l| {
            let is_saved = saved_ids.contains(&l.id);
            ListingResponse::from_listing(l, Some(is_saved))
        })
        .collect();
    Ok(Json(Paginated::new(data, total, page, limit)))
}

#[instrument(skip(state))]
pub async fn my_listings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<MyListingsQuery>,
) -> ApiResult<Json<Paginated<ListingResponse>>> {
    let filter = SearchFilter {
        owner: Some(user_id),
        only_active: !q.include_inactive,
        ..SearchFilter::default()
    };
    let sort = SortKey::parse(q.sort.as_deref());
    let (page, limit, offset) = q.page_params().normalize(20);

    let (listings, total) = repo::search(&state.db, &filter, sort, limit, offset).await?;
    let data = listings
        .into_iter()
        .map(|l| ListingResponse::from_listing(l, None))
        .collect();
    Ok(Json(Paginated::new(data, total, page, limit)))
}

/// Soft-deleted listings stay addressable by id so saved-property and
/// viewing history keeps resolving; they just carry `is_active: false`.
#[instrument(skip(state))]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ListingResponse>> {
    let listing = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing"))?;
    Ok(Json(ListingResponse::from_listing(listing, None)))
}

struct ListingForm {
    new: NewListing,
    files: Vec<UploadItem>,
}

async fn parse_listing_form(mut mp: Multipart) -> ApiResult<ListingForm> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut files: Vec<UploadItem> = Vec::new();

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        if name == "images" || name == "images[]" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read image: {e}")))?;
            files.push(UploadItem {
                body: data,
                content_type,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read field {name}: {e}")))?;
            fields.insert(name, value);
        }
    }

    let new = build_new_listing(&fields)?;
    Ok(ListingForm { new, files })
}

fn required(fields: &HashMap<String, String>, name: &str) -> ApiResult<String> {
    fields
        .get(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("Missing required field: {name}")))
}

fn parse_decimal(raw: &str, name: &str) -> ApiResult<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|_| ApiError::Validation(format!("Invalid {name}: '{raw}'")))
}

fn parse_int(raw: &str, name: &str) -> ApiResult<i32> {
    raw.parse::<i32>()
        .map_err(|_| ApiError::Validation(format!("Invalid {name}: '{raw}'")))
}

fn build_new_listing(fields: &HashMap<String, String>) -> ApiResult<NewListing> {
    let price = parse_decimal(&required(fields, "price")?, "price")?;
    if price <= Decimal::ZERO {
        return Err(ApiError::validation("price must be positive"));
    }
    let bedrooms = parse_int(&required(fields, "bedrooms")?, "bedrooms")?;
    let bathrooms = parse_int(&required(fields, "bathrooms")?, "bathrooms")?;
    if bedrooms < 0 || bathrooms < 0 {
        return Err(ApiError::validation("bedrooms and bathrooms cannot be negative"));
    }
    let floor_area_sqm = fields
        .get("floor_area_sqm")
        .filter(|s| !s.trim().is_empty())
        .map(|raw| parse_decimal(raw, "floor_area_sqm"))
        .transpose()?;
    if matches!(floor_area_sqm, Some(a) if a <= Decimal::ZERO) {
        return Err(ApiError::validation("floor_area_sqm must be positive"));
    }
    let property_type = PropertyType::parse(&required(fields, "property_type")?)?
        .as_str()
        .to_string();

    Ok(NewListing {
        title: required(fields, "title")?,
        description: fields.get("description").cloned().filter(|s| !s.is_empty()),
        address: required(fields, "address")?,
        city: required(fields, "city")?,
        county: required(fields, "county")?,
        price,
        bedrooms,
        bathrooms,
        floor_area_sqm,
        property_type,
    })
}

#[instrument(skip(state, mp))]
pub async fn create_listing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> ApiResult<(StatusCode, HeaderMap, Json<ListingResponse>)> {
    let form = parse_listing_form(mp).await?;
    let listing = services::create_with_images(&state, user_id, form.new, form.files).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/listings/{}", listing.id).parse() {
        headers.insert(header::LOCATION, location);
    }
    Ok((
        StatusCode::CREATED,
        headers,
        Json(ListingResponse::from_listing(listing, None)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_listing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateListingRequest>,
) -> ApiResult<Json<ListingResponse>> {
    if payload.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }
    if matches!(payload.price, Some(p) if p <= Decimal::ZERO) {
        return Err(ApiError::validation("price must be positive"));
    }
    let property_type = payload
        .property_type
        .as_deref()
        .map(|raw| PropertyType::parse(raw).map(|t| t.as_str().to_string()))
        .transpose()?;

    services::owned_listing(&state, id, user_id).await?;
    let patch = ListingPatch {
        title: payload.title,
        description: payload.description,
        address: payload.address,
        city: payload.city,
        county: payload.county,
        price: payload.price,
        bedrooms: payload.bedrooms,
        bathrooms: payload.bathrooms,
        floor_area_sqm: payload.floor_area_sqm,
        property_type,
    };
    let listing = repo::update_fields(&state.db, id, &patch).await?;
    Ok(Json(ListingResponse::from_listing(listing, None)))
}

#[instrument(skip(state))]
pub async fn delete_listing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    services::owned_listing(&state, id, user_id).await?;
    repo::soft_delete(&state.db, id).await?;
    info!(listing_id = %id, "listing soft-deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[instrument(skip(state, mp))]
pub async fn add_images(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> ApiResult<Json<ListingResponse>> {
    let mut files: Vec<UploadItem> = Vec::new();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        if name.as_deref() == Some("images") || name.as_deref() == Some("images[]") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read image: {e}")))?;
            files.push(UploadItem {
                body: data,
                content_type,
            });
        }
    }

    let listing = services::add_images(&state, id, user_id, files).await?;
    Ok(Json(ListingResponse::from_listing(listing, None)))
}

#[instrument(skip(state, payload))]
pub async fn remove_images(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveImagesRequest>,
) -> ApiResult<Json<ListingResponse>> {
    let listing = services::remove_images(&state, id, user_id, payload.images).await?;
    Ok(Json(ListingResponse::from_listing(listing, None)))
}

#[instrument(skip(state, payload))]
pub async fn reorder_images(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReorderImagesRequest>,
) -> ApiResult<Json<ListingResponse>> {
    let listing = services::reorder_images(&state, id, user_id, payload.images).await?;
    Ok(Json(ListingResponse::from_listing(listing, None)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn valid_form() -> HashMap<String, String> {
        form(&[
            ("title", "Bright two-bed near the quays"),
            ("address", "12 Ormond Quay"),
            ("city", "Dublin"),
            ("county", "Dublin"),
            ("price", "2200.00"),
            ("bedrooms", "2"),
            ("bathrooms", "1"),
            ("property_type", "apartment"),
        ])
    }

    #[test]
    fn build_accepts_a_complete_form() {
        let new = build_new_listing(&valid_form()).unwrap();
        assert_eq!(new.city, "Dublin");
        assert_eq!(new.bedrooms, 2);
        assert_eq!(new.property_type, "apartment");
        assert!(new.floor_area_sqm.is_none());
    }

    #[test]
    fn build_rejects_missing_required_field() {
        let mut f = valid_form();
        f.remove("price");
        let err = build_new_listing(&f).unwrap_err();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn build_rejects_non_positive_price() {
        let mut f = valid_form();
        f.insert("price".into(), "0".into());
        assert!(matches!(
            build_new_listing(&f),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn build_rejects_unknown_property_type() {
        let mut f = valid_form();
        f.insert("property_type".into(), "yurt".into());
        assert!(matches!(
            build_new_listing(&f),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn build_rejects_non_positive_floor_area() {
        let mut f = valid_form();
        f.insert("floor_area_sqm".into(), "-10".into());
        assert!(matches!(
            build_new_listing(&f),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn property_type_filter_is_validated_as_a_set() {
        let types = validated_types(Some("apartment, house")).unwrap().unwrap();
        assert_eq!(types, vec!["apartment", "house"]);
        assert!(validated_types(Some("apartment,spaceship")).is_err());
        assert!(validated_types(None).unwrap().is_none());
        assert!(validated_types(Some(" , ")).unwrap().is_none());
    }
}
