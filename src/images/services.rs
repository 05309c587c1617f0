use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use tracing::error;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::storage::StorageClient;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn image_key(listing_id: Uuid, ext: &str) -> String {
    format!("listings/{}/{}.{}", listing_id, Uuid::new_v4(), ext)
}

/// Uploads a batch of images for one listing, keys namespaced by listing id.
///
/// Uploads run concurrently and are awaited jointly; the returned key list
/// preserves input order. If any upload fails, every object already stored
/// by this call is deleted before the error is returned.
pub async fn upload_many(
    storage: &Arc<dyn StorageClient>,
    listing_id: Uuid,
    items: Vec<UploadItem>,
) -> ApiResult<Vec<String>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let ext = ext_from_mime(&item.content_type).ok_or_else(|| {
            ApiError::validation(format!("Unsupported image type: {}", item.content_type))
        })?;
        keyed.push((image_key(listing_id, ext), item));
    }

    let mut handles = Vec::with_capacity(keyed.len());
    for (key, item) in keyed {
        let storage = Arc::clone(storage);
        let task_key = key.clone();
        handles.push((
            key,
            tokio::spawn(async move {
                storage
                    .put_object(&task_key, item.body, &item.content_type)
                    .await
            }),
        ));
    }

    let mut uploaded = Vec::with_capacity(handles.len());
    let mut first_err: Option<anyhow::Error> = None;
    for (key, handle) in handles {
        match handle.await {
            Ok(Ok(())) => uploaded.push(key),
            Ok(Err(e)) => first_err = first_err.or(Some(e)),
            Err(e) => first_err = first_err.or(Some(anyhow::Error::new(e))),
        }
    }

    if let Some(e) = first_err {
        delete_keys(storage, &uploaded).await;
        return Err(ApiError::Internal(e.context("image upload failed")));
    }
    Ok(uploaded)
}

/// Deletes the given objects, logging failures. Used for rollback, where the
/// caller is about to report its own error anyway.
pub async fn delete_keys(storage: &Arc<dyn StorageClient>, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.delete_object(key).await {
            error!(error = %e, %key, "rollback delete failed, object is orphaned");
        }
    }
}

/// Keys present in `current` but absent from `retained`, in current order.
pub fn diff_removed(current: &[String], retained: &[String]) -> Vec<String> {
    current
        .iter()
        .filter(|key| !retained.contains(key))
        .cloned()
        .collect()
}

/// A reorder must be a permutation of the current set: same size, same
/// members. It never adds or removes images.
pub fn validate_reorder(current: &[String], submitted: &[String]) -> ApiResult<()> {
    if submitted.len() != current.len() {
        return Err(ApiError::validation(
            "Reorder must include every current image exactly once",
        ));
    }
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let submitted_set: HashSet<&str> = submitted.iter().map(String::as_str).collect();
    if current_set != submitted_set {
        return Err(ApiError::validation(
            "Reorder must include every current image exactly once",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::async_trait;
    use std::sync::Mutex;

    /// Records puts/deletes; any put of a png fails.
    struct FlakyStorage {
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    impl FlakyStorage {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                puts: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl StorageClient for FlakyStorage {
        async fn put_object(&self, key: &str, _b: Bytes, _ct: &str) -> anyhow::Result<()> {
            if key.ends_with(".png") {
                anyhow::bail!("simulated outage");
            }
            self.puts.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.deletes.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn presign_get(&self, key: &str, _s: u64) -> anyhow::Result<String> {
            Ok(format!("https://fake.local/{}", key))
        }
    }

    fn jpeg() -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"jpeg-bytes"),
            content_type: "image/jpeg".into(),
        }
    }

    #[tokio::test]
    async fn upload_many_preserves_input_order() {
        let storage = FlakyStorage::new();
        let client: Arc<dyn StorageClient> = storage.clone();
        let listing_id = Uuid::new_v4();

        let keys = upload_many(&client, listing_id, vec![jpeg(), jpeg(), jpeg()])
            .await
            .unwrap();

        assert_eq!(keys.len(), 3);
        for key in &keys {
            assert!(key.starts_with(&format!("listings/{listing_id}/")));
            assert!(key.ends_with(".jpg"));
        }
        // all three stored, none deleted
        assert_eq!(storage.puts.lock().unwrap().len(), 3);
        assert!(storage.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_rolls_back_completed_uploads() {
        let storage = FlakyStorage::new();
        let client: Arc<dyn StorageClient> = storage.clone();

        let items = vec![
            jpeg(),
            UploadItem {
                body: Bytes::from_static(b"png-bytes"),
                content_type: "image/png".into(),
            },
            jpeg(),
        ];
        let err = upload_many(&client, Uuid::new_v4(), items)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));

        let puts = storage.puts.lock().unwrap().clone();
        let mut deletes = storage.deletes.lock().unwrap().clone();
        let mut succeeded = puts.clone();
        succeeded.sort();
        deletes.sort();
        // exactly the objects that made it in were rolled back
        assert_eq!(puts.len(), 2);
        assert_eq!(deletes, succeeded);
    }

    #[tokio::test]
    async fn unknown_mime_is_rejected_before_any_upload() {
        let storage = FlakyStorage::new();
        let client: Arc<dyn StorageClient> = storage.clone();

        let items = vec![
            jpeg(),
            UploadItem {
                body: Bytes::from_static(b"gif-bytes"),
                content_type: "image/gif".into(),
            },
        ];
        let err = upload_many(&client, Uuid::new_v4(), items)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(storage.puts.lock().unwrap().is_empty());
    }

    #[test]
    fn ext_from_mime_whitelist() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_removed_is_set_difference_in_current_order() {
        let current = keys(&["a", "b", "c", "d"]);
        let retained = keys(&["d", "b"]);
        assert_eq!(diff_removed(&current, &retained), keys(&["a", "c"]));
        assert_eq!(diff_removed(&current, &current), Vec::<String>::new());
    }

    #[test]
    fn reorder_accepts_a_permutation() {
        let current = keys(&["a", "b", "c"]);
        assert!(validate_reorder(&current, &keys(&["c", "a", "b"])).is_ok());
    }

    #[test]
    fn reorder_rejects_missing_or_foreign_keys() {
        let current = keys(&["a", "b", "c"]);
        // omits one
        assert!(matches!(
            validate_reorder(&current, &keys(&["a", "b"])),
            Err(ApiError::Validation(_))
        ));
        // right size, wrong member
        assert!(matches!(
            validate_reorder(&current, &keys(&["a", "b", "z"])),
            Err(ApiError::Validation(_))
        ));
        // duplicate hiding a missing member
        assert!(matches!(
            validate_reorder(&current, &keys(&["a", "b", "b"])),
            Err(ApiError::Validation(_))
        ));
    }
}
