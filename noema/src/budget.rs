//! ABOUTME: Adaptive ef_search / graph-expansion throttle driven by cache pressure (§5 "Memory budget")

use noema_storage::CacheTier;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Hot-cache fill ratio above which the facade starts shedding work.
const PRESSURE_THRESHOLD: f32 = 0.95;

/// Tracks the effective `ef_search` floor and whether graph expansion is
/// currently allowed, adjusting both each time a caller samples cache
/// pressure. Cheap enough to call on every `search`.
pub struct AdaptiveBudget {
    cache: Arc<CacheTier>,
    default_ef_search: u32,
    current_ef_search: AtomicU32,
    graph_expansion_enabled: AtomicBool,
}

impl AdaptiveBudget {
    #[must_use]
    pub fn new(cache: Arc<CacheTier>, default_ef_search: u32) -> Self {
        Self {
            cache,
            default_ef_search,
            current_ef_search: AtomicU32::new(default_ef_search),
            graph_expansion_enabled: AtomicBool::new(true),
        }
    }

    /// Sample current hot-cache pressure and adjust `ef_search`/graph
    /// expansion accordingly; call before honoring a search request.
    pub fn sample(&self) -> (u32, bool) {
        let pressure = self.cache.hot_fill_ratio();
        if pressure >= PRESSURE_THRESHOLD {
            self.current_ef_search
                .store((self.default_ef_search / 2).max(1), Ordering::Relaxed);
            self.graph_expansion_enabled.store(false, Ordering::Relaxed);
        } else {
            self.current_ef_search.store(self.default_ef_search, Ordering::Relaxed);
            self.graph_expansion_enabled.store(true, Ordering::Relaxed);
        }
        (
            self.current_ef_search.load(Ordering::Relaxed),
            self.graph_expansion_enabled.load(Ordering::Relaxed),
        )
    }
}
