use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::enums::ClosedEnum;
use crate::pagination::PageParams;

use super::repo::Listing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Apartment,
    House,
    Studio,
    Townhouse,
    Condo,
}

impl ClosedEnum for PropertyType {
    const FIELD: &'static str = "property_type";
    const VALUES: &'static [(&'static str, Self)] = &[
        ("apartment", PropertyType::Apartment),
        ("house", PropertyType::House),
        ("studio", PropertyType::Studio),
        ("townhouse", PropertyType::Townhouse),
        ("condo", PropertyType::Condo),
    ];
}

/// Query string for the public search.
#[derive(Debug, Default, Deserialize)]
pub struct SearchListingsQuery {
    pub city: Option<String>,
    pub county: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    /// A bare `bedrooms` value is a minimum: someone searching for
    /// "2 bedrooms" also wants to see 3-bedroom listings.
    pub bedrooms: Option<i32>,
    pub min_bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub min_bathrooms: Option<i32>,
    /// Comma-separated set, e.g. `property_types=apartment,house`.
    pub property_types: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl SearchListingsQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MyListingsQuery {
    #[serde(default)]
    pub include_inactive: bool,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl MyListingsQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Fields accepted on update; all optional, but an empty patch is rejected.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub price: Option<Decimal>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floor_area_sqm: Option<Decimal>,
    pub property_type: Option<String>,
}

impl UpdateListingRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.county.is_none()
            && self.price.is_none()
            && self.bedrooms.is_none()
            && self.bathrooms.is_none()
            && self.floor_area_sqm.is_none()
            && self.property_type.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveImagesRequest {
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderImagesRequest {
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub county: String,
    pub price: Decimal,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub floor_area_sqm: Option<Decimal>,
    pub property_type: String,
    pub images: Vec<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Only set on the public search, computed per page for the requester.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_saved: Option<bool>,
}

impl ListingResponse {
    pub fn from_listing(listing: Listing, is_saved: Option<bool>) -> Self {
        Self {
            id: listing.id,
            user_id: listing.user_id,
            title: listing.title,
            description: listing.description,
            address: listing.address,
            city: listing.city,
            county: listing.county,
            price: listing.price,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            floor_area_sqm: listing.floor_area_sqm,
            property_type: listing.property_type,
            images: listing.images,
            is_active: listing.is_active,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
            is_saved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn property_type_is_a_closed_set() {
        assert_eq!(
            PropertyType::parse("apartment").unwrap(),
            PropertyType::Apartment
        );
        assert!(matches!(
            PropertyType::parse("castle"),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(UpdateListingRequest::default().is_empty());
        let patch = UpdateListingRequest {
            price: Some(Decimal::new(125_000, 0)),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
