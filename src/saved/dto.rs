use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::enums::ClosedEnum;
use crate::listings::dto::ListingResponse;
use crate::pagination::PageParams;
use crate::tags::dto::TagResponse;

use super::repo::SavedProperty;

/// Hunter-side tracking status of a saved listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedStatus {
    Saved,
    Interested,
    Viewed,
    Applied,
    Rejected,
}

impl ClosedEnum for SavedStatus {
    const FIELD: &'static str = "status";
    const VALUES: &'static [(&'static str, Self)] = &[
        ("saved", SavedStatus::Saved),
        ("interested", SavedStatus::Interested),
        ("viewed", SavedStatus::Viewed),
        ("applied", SavedStatus::Applied),
        ("rejected", SavedStatus::Rejected),
    ];
}

#[derive(Debug, Deserialize)]
pub struct CreateSavedRequest {
    pub listing_id: Uuid,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub pros: Option<Vec<String>>,
    pub cons: Option<Vec<String>>,
}

/// Partial update; supplying no recognized field rejects the call.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSavedRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
    pub pros: Option<Vec<String>>,
    pub cons: Option<Vec<String>>,
}

impl UpdateSavedRequest {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.notes.is_none()
            && self.pros.is_none()
            && self.cons.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSavedQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListSavedQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SavedPropertyResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<ListingResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagResponse>>,
}

impl SavedPropertyResponse {
    pub fn from_row(
        row: SavedProperty,
        listing: Option<ListingResponse>,
        tags: Option<Vec<TagResponse>>,
    ) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            listing_id: row.listing_id,
            status: row.status,
            notes: row.notes,
            pros: row.pros,
            cons: row.cons,
            created_at: row.created_at,
            updated_at: row.updated_at,
            listing,
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn status_is_a_closed_set() {
        for raw in ["saved", "interested", "viewed", "applied", "rejected"] {
            assert!(SavedStatus::parse(raw).is_ok());
        }
        assert!(matches!(
            SavedStatus::parse("ghosted"),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(UpdateSavedRequest::default().is_empty());
        let patch = UpdateSavedRequest {
            notes: Some("ask about parking".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
