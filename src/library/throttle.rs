use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cache::Cache;
use crate::{AppError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct ActRecord {
    count: i64,
    created_time: i64,
}

/// Fixed-window action counter backed by the cache.
#[derive(Clone)]
pub struct Throttle {
    cache: Arc<dyn Cache>,
}

impl Throttle {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    fn cache_key(id: &str, action: &str) -> String {
        format!("throttle_{}_{}", action, id)
    }

    /// Returns how many of `max_count` actions remain in the window of
    /// `period` seconds, counting the current one if any remain.
    pub async fn get_act_limit(&self, id: &str, action: &str, max_count: i64, period: i64, now: i64) -> Result<i64> {
        let key = Self::cache_key(id, action);

        let record = match self.cache.get(&key).await? {
            Some(value) => serde_json::from_value::<ActRecord>(value)
                .ok()
                .filter(|record| record.created_time + period > now),
            None => None,
        };
        let mut record = record.unwrap_or(ActRecord { count: 0, created_time: now });

        let remaining = max_count - record.count;
        if remaining > 0 {
            record.count += 1;
            let ttl = (record.created_time + period - now).max(1) as u64;
            let value = serde_json::to_value(&record)
                .map_err(|e| AppError::InternalError(format!("Failed to encode throttle record: {}", e)))?;
            self.cache.set(&key, value, ttl).await?;
        }

        tracing::debug!("Throttle {} for {}: {} remaining", action, id, remaining);
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::cache::MemoryCache;

    #[tokio::test]
    async fn test_counts_down_within_window() {
        let throttle = Throttle::new(Arc::new(MemoryCache::new()));

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(throttle.get_act_limit("7", "create_question", 3, 3600, 1000).await.unwrap());
        }
        assert_eq!(seen, vec![3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_window_resets_after_period() {
        let throttle = Throttle::new(Arc::new(MemoryCache::new()));
        throttle.get_act_limit("7", "create_answer", 1, 60, 1000).await.unwrap();
        assert_eq!(throttle.get_act_limit("7", "create_answer", 1, 60, 1010).await.unwrap(), 0);
        assert_eq!(throttle.get_act_limit("7", "create_answer", 1, 60, 1060).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_actions_and_ids_are_independent() {
        let throttle = Throttle::new(Arc::new(MemoryCache::new()));
        throttle.get_act_limit("7", "create_answer", 1, 60, 1000).await.unwrap();
        assert_eq!(throttle.get_act_limit("8", "create_answer", 1, 60, 1000).await.unwrap(), 1);
        assert_eq!(throttle.get_act_limit("7", "create_comment", 1, 60, 1000).await.unwrap(), 1);
    }
}
