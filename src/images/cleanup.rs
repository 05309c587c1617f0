use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::storage::StorageClient;

/// Background reconciliation queue for remote objects that fell out of a
/// listing's reference list. The database commit has already happened when a
/// key lands here, so deletion is idempotent and may be retried freely; a
/// job that exhausts its attempts is logged and dropped.
#[derive(Clone)]
pub struct CleanupQueue {
    tx: mpsc::UnboundedSender<CleanupJob>,
}

#[derive(Debug)]
struct CleanupJob {
    key: String,
    attempt: u32,
}

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

impl CleanupQueue {
    pub fn spawn(storage: Arc<dyn StorageClient>) -> Self {
        Self::with_policy(storage, DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF_BASE)
    }

    pub fn with_policy(
        storage: Arc<dyn StorageClient>,
        max_attempts: u32,
        backoff_base: Duration,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<CleanupJob>();
        let worker_tx = tx.clone();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match storage.delete_object(&job.key).await {
                    Ok(()) => {
                        if job.attempt > 0 {
                            debug!(key = %job.key, attempt = job.attempt, "cleanup succeeded after retry");
                        }
                    }
                    Err(e) => {
                        let next_attempt = job.attempt + 1;
                        if next_attempt >= max_attempts {
                            warn!(error = %e, key = %job.key, "cleanup exhausted retries, object is orphaned");
                            continue;
                        }
                        let backoff = backoff_base * 2_u32.pow(job.attempt);
                        let retry_tx = worker_tx.clone();
                        let key = job.key;
                        // re-enqueue after the backoff without blocking the queue
                        tokio::spawn(async move {
                            sleep(backoff).await;
                            let _ = retry_tx.send(CleanupJob {
                                key,
                                attempt: next_attempt,
                            });
                        });
                    }
                }
            }
        });

        Self { tx }
    }

    /// Hands the keys to the worker and returns immediately.
    pub fn enqueue(&self, keys: Vec<String>) {
        for key in keys {
            if self.tx.send(CleanupJob { key, attempt: 0 }).is_err() {
                warn!("cleanup worker is gone, dropping key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fails the first `failures_per_key` deletes of each key, then succeeds.
    struct FlakyDeletes {
        failures_per_key: u32,
        attempts: Mutex<HashMap<String, u32>>,
        deleted: Mutex<Vec<String>>,
    }

    impl FlakyDeletes {
        fn new(failures_per_key: u32) -> Arc<Self> {
            Arc::new(Self {
                failures_per_key,
                attempts: Mutex::new(HashMap::new()),
                deleted: Mutex::new(Vec::new()),
            })
        }

        fn attempts_for(&self, key: &str) -> u32 {
            self.attempts.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl StorageClient for FlakyDeletes {
        async fn put_object(&self, _k: &str, _b: Bytes, _ct: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            let mut attempts = self.attempts.lock().unwrap();
            let seen = attempts.entry(key.to_string()).or_insert(0);
            *seen += 1;
            if *seen <= self.failures_per_key {
                anyhow::bail!("simulated delete failure");
            }
            drop(attempts);
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn presign_get(&self, key: &str, _s: u64) -> anyhow::Result<String> {
            Ok(format!("https://fake.local/{}", key))
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn deletes_land_without_failures() {
        let storage = FlakyDeletes::new(0);
        let queue = CleanupQueue::with_policy(storage.clone(), 3, Duration::from_millis(1));

        queue.enqueue(vec!["a.jpg".into(), "b.jpg".into()]);

        assert!(wait_until(|| storage.deleted.lock().unwrap().len() == 2).await);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_to_success() {
        let storage = FlakyDeletes::new(2);
        let queue = CleanupQueue::with_policy(storage.clone(), 5, Duration::from_millis(1));

        queue.enqueue(vec!["flaky.jpg".into()]);

        assert!(wait_until(|| !storage.deleted.lock().unwrap().is_empty()).await);
        assert_eq!(storage.attempts_for("flaky.jpg"), 3);
    }

    #[tokio::test]
    async fn exhausted_jobs_are_dropped() {
        let storage = FlakyDeletes::new(u32::MAX);
        let queue = CleanupQueue::with_policy(storage.clone(), 2, Duration::from_millis(1));

        queue.enqueue(vec!["doomed.jpg".into()]);

        assert!(wait_until(|| storage.attempts_for("doomed.jpg") == 2).await);
        // give it a moment to prove no further attempts happen
        sleep(Duration::from_millis(50)).await;
        assert_eq!(storage.attempts_for("doomed.jpg"), 2);
        assert!(storage.deleted.lock().unwrap().is_empty());
    }
}
