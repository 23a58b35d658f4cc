//! Compiled template cache using moka
//!
//! Legacy templates are compiled once per distinct source string and shared
//! across worker threads.

use moka::sync::Cache;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::legacy::CompiledTemplate;

/// Default maximum number of compiled templates
pub const DEFAULT_CAPACITY: u64 = 1000;

/// Default idle time before an unused template is evicted
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

static SHARED: Lazy<TemplateCache> = Lazy::new(TemplateCache::default);

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Cache of compiled legacy templates keyed by source text
///
/// Entries are handed out as `Arc`s, so an eviction never invalidates a
/// template that a caller is still rendering.
#[derive(Debug, Clone)]
pub struct TemplateCache {
    inner: Cache<String, Arc<CompiledTemplate>>,
}

impl TemplateCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create cache with idle-time eviction
    #[inline]
    #[must_use]
    pub fn with_idle_timeout(max_capacity: u64, idle: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_idle(idle)
                .build(),
        }
    }

    /// Process-wide cache used by default
    #[inline]
    #[must_use]
    pub fn shared() -> &'static Self {
        &SHARED
    }

    /// Get compiled template from cache
    #[inline]
    #[must_use]
    pub fn get(&self, source: &str) -> Option<Arc<CompiledTemplate>> {
        self.inner.get(source)
    }

    /// Get or compile template.
    ///
    /// Compilation errors are returned and nothing is cached for them.
    pub fn get_or_compile<F>(&self, source: &str, compile: F) -> Result<Arc<CompiledTemplate>>
    where
        F: FnOnce(&str) -> Result<CompiledTemplate>,
    {
        if let Some(cached) = self.get(source) {
            return Ok(cached);
        }

        let template = Arc::new(compile(source)?);
        self.inner.insert(source.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Run pending eviction and bookkeeping work
    #[inline]
    pub fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks();
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for TemplateCache {
    /// Create cache with default capacity (1,000 entries, 10 minutes idle)
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_CAPACITY, DEFAULT_IDLE_TIMEOUT)
    }
}
