use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::listings::dto::ListingResponse;
use crate::listings::repo::Listing;
use crate::pagination::PageParams;

use super::repo::Comparison;

#[derive(Debug, Deserialize)]
pub struct CreateComparisonRequest {
    pub name: String,
    pub listing_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateComparisonRequest {
    pub name: Option<String>,
    pub listing_ids: Option<Vec<Uuid>>,
}

impl UpdateComparisonRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.listing_ids.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListComparisonsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListComparisonsQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Listing as it appears inside a comparison, with the derived
/// price-per-area figure. Computed on read, never stored.
#[derive(Debug, Serialize)]
pub struct ComparedListing {
    #[serde(flatten)]
    pub listing: ListingResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqm: Option<Decimal>,
}

impl ComparedListing {
    pub fn from_listing(listing: Listing) -> Self {
        let price_per_sqm = price_per_sqm(listing.price, listing.floor_area_sqm);
        Self {
            listing: ListingResponse::from_listing(listing, None),
            price_per_sqm,
        }
    }
}

/// Omitted when floor area is absent or not positive.
pub fn price_per_sqm(price: Decimal, floor_area: Option<Decimal>) -> Option<Decimal> {
    let area = floor_area.filter(|a| a > &Decimal::ZERO)?;
    price.checked_div(area).map(|v| v.round_dp(2))
}

#[derive(Debug, Serialize)]
pub struct ComparisonResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub listing_ids: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listings: Option<Vec<ComparedListing>>,
}

impl ComparisonResponse {
    pub fn from_row(row: Comparison, listings: Option<Vec<ComparedListing>>) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            listing_ids: row.listing_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
            listings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn price_per_sqm_divides_and_rounds() {
        assert_eq!(
            price_per_sqm(dec("250000"), Some(dec("80"))),
            Some(dec("3125.00"))
        );
        assert_eq!(
            price_per_sqm(dec("1000"), Some(dec("3"))),
            Some(dec("333.33"))
        );
    }

    #[test]
    fn price_per_sqm_omitted_without_positive_area() {
        assert_eq!(price_per_sqm(dec("250000"), None), None);
        assert_eq!(price_per_sqm(dec("250000"), Some(Decimal::ZERO)), None);
        assert_eq!(price_per_sqm(dec("250000"), Some(dec("-5"))), None);
    }
}
