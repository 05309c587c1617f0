use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageParams;

use super::repo::Viewing;

#[derive(Debug, Deserialize)]
pub struct CreateViewingRequest {
    pub listing_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

/// Partial update; supplying no recognized field rejects the call.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateViewingRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
    pub duration_minutes: Option<i32>,
    pub attended: Option<bool>,
    pub notes: Option<String>,
    pub rating: Option<i16>,
}

impl UpdateViewingRequest {
    pub fn is_empty(&self) -> bool {
        self.scheduled_at.is_none()
            && self.duration_minutes.is_none()
            && self.attended.is_none()
            && self.notes.is_none()
            && self.rating.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListViewingsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListViewingsQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ViewingResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub saved_property_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    pub duration_minutes: i32,
    pub attended: bool,
    pub notes: Option<String>,
    pub rating: Option<i16>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Viewing> for ViewingResponse {
    fn from(v: Viewing) -> Self {
        Self {
            id: v.id,
            user_id: v.user_id,
            listing_id: v.listing_id,
            saved_property_id: v.saved_property_id,
            scheduled_at: v.scheduled_at,
            duration_minutes: v.duration_minutes,
            attended: v.attended,
            notes: v.notes,
            rating: v.rating,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_is_detected() {
        assert!(UpdateViewingRequest::default().is_empty());
        let patch = UpdateViewingRequest {
            attended: Some(true),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
