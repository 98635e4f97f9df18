//! Catalog cache
//!
//! Programs and courses are read far more often than written, so lookups by
//! id and slug go through a moka-backed [`MemoryCache`]. Services invalidate
//! the affected keys after every write.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Build the catalog cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    tracing::info!(
        "Catalog cache: capacity {}, ttl {}s",
        config.max_capacity,
        config.ttl_seconds
    );
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}

pub fn program_key(id: i64) -> String {
    format!("program:{}", id)
}

pub fn course_key(id: i64) -> String {
    format!("course:{}", id)
}

pub fn course_slug_key(slug: &str) -> String {
    format!("course:slug:{}", slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_config() {
        let cache = create_cache(&CacheConfig::default());
        assert_eq!(cache.ttl(), Duration::from_secs(600));
        cache.set(&course_key(3), &"x").await.unwrap();
        assert_eq!(cache.get::<String>(&course_key(3)).await.unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_key_builders() {
        assert_eq!(program_key(4), "program:4");
        assert_eq!(course_slug_key("intro-cs"), "course:slug:intro-cs");
    }
}
