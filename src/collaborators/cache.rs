/// Description cache collaborator (spec §6).
///
/// Keyed on `(toolName, providerModel)`, this caches a pre-generated,
/// human-readable description string for a tool plus the cost incurred
/// generating it. The system must not require caching to function (§6), so
/// `NoopDescriptionCache` (always a miss) is the default; `cache_provider:
/// "persistent"` in config swaps in `InMemoryDescriptionCache` instead. Both
/// implement the same trait, so the executor/dispatcher never know which is
/// active.
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CachedDescription {
    pub description: String,
    /// Opaque cost unit (e.g. tokens spent generating the description).
    pub generation_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

#[async_trait]
pub trait DescriptionCache: Send + Sync {
    async fn get(&self, tool_name: &str, provider_model: &str) -> Option<CachedDescription>;
    async fn put(&self, tool_name: &str, provider_model: &str, value: CachedDescription);
    async fn increment_usage(&self, tool_name: &str, provider_model: &str);
    async fn statistics(&self) -> CacheStatistics;
    async fn clear(&self, provider_model: &str);
}

/// Always misses, never stores. Satisfies the "must not require caching to
/// function" requirement when `cache_provider: "none"` (the default).
#[derive(Default)]
pub struct NoopDescriptionCache;

#[async_trait]
impl DescriptionCache for NoopDescriptionCache {
    async fn get(&self, _tool_name: &str, _provider_model: &str) -> Option<CachedDescription> {
        None
    }

    async fn put(&self, _tool_name: &str, _provider_model: &str, _value: CachedDescription) {}

    async fn increment_usage(&self, _tool_name: &str, _provider_model: &str) {}

    async fn statistics(&self) -> CacheStatistics {
        CacheStatistics::default()
    }

    async fn clear(&self, _provider_model: &str) {}
}

#[derive(Default)]
pub struct InMemoryDescriptionCache {
    entries: DashMap<(String, String), (CachedDescription, u64)>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl InMemoryDescriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tool_name: &str, provider_model: &str) -> (String, String) {
        (tool_name.to_string(), provider_model.to_string())
    }
}

#[async_trait]
impl DescriptionCache for InMemoryDescriptionCache {
    async fn get(&self, tool_name: &str, provider_model: &str) -> Option<CachedDescription> {
        let key = Self::key(tool_name, provider_model);
        match self.entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Some(entry.value().0.clone())
            }
            None => {
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                None
            }
        }
    }

    async fn put(&self, tool_name: &str, provider_model: &str, value: CachedDescription) {
        self.entries.insert(Self::key(tool_name, provider_model), (value, 0));
    }

    async fn increment_usage(&self, tool_name: &str, provider_model: &str) {
        let key = Self::key(tool_name, provider_model);
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.value_mut().1 += 1;
        }
    }

    async fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            entries: self.entries.len() as u64,
        }
    }

    async fn clear(&self, provider_model: &str) {
        self.entries.retain(|(_, model), _| model != provider_model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_cache_always_misses() {
        let cache = NoopDescriptionCache;
        cache
            .put(
                "echo",
                "claude-x",
                CachedDescription {
                    description: "desc".to_string(),
                    generation_cost: 1.0,
                },
            )
            .await;
        assert!(cache.get("echo", "claude-x").await.is_none());
    }

    #[tokio::test]
    async fn in_memory_cache_hits_after_put() {
        let cache = InMemoryDescriptionCache::new();
        cache
            .put(
                "echo",
                "claude-x",
                CachedDescription {
                    description: "desc".to_string(),
                    generation_cost: 1.0,
                },
            )
            .await;
        let hit = cache.get("echo", "claude-x").await.unwrap();
        assert_eq!(hit.description, "desc");

        let stats = cache.statistics().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn clear_only_removes_entries_for_named_provider() {
        let cache = InMemoryDescriptionCache::new();
        cache
            .put(
                "echo",
                "claude-x",
                CachedDescription {
                    description: "desc".to_string(),
                    generation_cost: 1.0,
                },
            )
            .await;
        cache
            .put(
                "echo",
                "claude-y",
                CachedDescription {
                    description: "desc2".to_string(),
                    generation_cost: 1.0,
                },
            )
            .await;
        cache.clear("claude-x").await;
        assert!(cache.get("echo", "claude-x").await.is_none());
        assert!(cache.get("echo", "claude-y").await.is_some());
    }

    #[tokio::test]
    async fn increment_usage_is_a_noop_for_missing_key() {
        let cache = InMemoryDescriptionCache::new();
        cache.increment_usage("missing", "claude-x").await;
        assert_eq!(cache.statistics().await.entries, 0);
    }
}
