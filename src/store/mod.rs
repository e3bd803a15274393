use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Key-value store the session and user repositories run on.
///
/// Hash entries merge field-wise on write, like Redis HSET, so partial
/// updates (password-only, profile-only) leave the other fields intact.
/// Expiry is absolute and enforced by the store itself: an expired key
/// reads back as absent.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn hash_get_all(&self, key: &str)
        -> Result<Option<HashMap<String, String>>, StoreError>;

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;

    /// Push the key's expiry `ttl` from now. Returns false if the key no
    /// longer exists.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("corrupt record at {0}")]
    Corrupt(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Run a store operation under a bounded timeout. A timed-out call is a
/// store failure, never retried here.
pub async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_result_through() {
        let ok = bounded(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn bounded_maps_elapsed_to_timeout() {
        let slow = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        })
        .await;
        assert!(matches!(slow, Err(StoreError::Timeout(_))));
    }
}
