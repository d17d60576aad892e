use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::{AppError, Result};

/// Key/value cache with per-entry expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    /// Stores `value` for `ttl` seconds.
    async fn set(&self, key: &str, value: Value, ttl: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Process-local cache. Expired entries are dropped on read and swept on every write.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::InternalError("Cache lock poisoned".to_string()))
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: u64) -> Result<()> {
        let now = Instant::now();
        let entry = Entry {
            value,
            expires_at: now + Duration::from_secs(ttl),
        };

        let mut entries = self.entries()?;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("greeting", json!("hello"), 60).await.unwrap();
        assert_eq!(cache.get("greeting").await.unwrap(), Some(json!("hello")));

        cache.delete("greeting").await.unwrap();
        assert_eq!(cache.get("greeting").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let cache = MemoryCache::new();
        cache.set("short", json!(1), 0).await.unwrap();
        assert_eq!(cache.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_sweeps_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            cache.set(&format!("captcha_{}", i), json!("phrase"), 0).await.unwrap();
        }
        cache.set("kept", json!(1), 60).await.unwrap();

        assert_eq!(cache.entries().unwrap().len(), 1);
        assert_eq!(cache.get("kept").await.unwrap(), Some(json!(1)));
    }
}
