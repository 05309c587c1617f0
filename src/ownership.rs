use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Asserts that `requester` owns a row whose owner column is `owner`.
///
/// Loading the row is the caller's job (each repo exposes a plain
/// `find_by_id`); a missing row is a NotFound before this check runs, so a
/// mismatch here always means a real owner conflict, not a dangling id.
pub fn ensure_owner(owner: Uuid, requester: Uuid, what: &str) -> ApiResult<()> {
    if owner != requester {
        return Err(ApiError::Forbidden(format!(
            "You do not have access to this {what}"
        )));
    }
    Ok(())
}

/// NotFound-or-Forbidden in one step for the common `Option<row>` case.
pub fn ensure_found_and_owned<T>(
    row: Option<T>,
    requester: Uuid,
    owner_of: impl Fn(&T) -> Uuid,
    what: &str,
) -> ApiResult<T> {
    let row = row.ok_or_else(|| ApiError::not_found(what))?;
    ensure_owner(owner_of(&row), requester, what)?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Row {
        user_id: Uuid,
    }

    #[test]
    fn owner_passes() {
        let id = Uuid::new_v4();
        assert!(ensure_owner(id, id, "listing").is_ok());
    }

    #[test]
    fn mismatch_is_forbidden() {
        let err = ensure_owner(Uuid::new_v4(), Uuid::new_v4(), "listing").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn missing_row_is_not_found_before_ownership() {
        let requester = Uuid::new_v4();
        let err = ensure_found_and_owned(None::<Row>, requester, |r| r.user_id, "tag").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn present_but_foreign_row_is_forbidden() {
        let row = Row {
            user_id: Uuid::new_v4(),
        };
        let err = ensure_found_and_owned(Some(row), Uuid::new_v4(), |r| r.user_id, "tag")
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn present_owned_row_is_returned() {
        let requester = Uuid::new_v4();
        let row = Row { user_id: requester };
        let got =
            ensure_found_and_owned(Some(row), requester, |r| r.user_id, "tag").unwrap();
        assert_eq!(got.user_id, requester);
    }
}
