//! In-memory caching using moka
//!
//! Holds computed estimate rollups keyed by opportunity document number.
//! Every write to an opportunity's tasks, lines or margins goes through
//! [`AppCache::invalidate_opportunity`], so the TTL only bounds staleness
//! from edits made outside this service.
//!
//! A rollup computed from rows read before an invalidation must not be
//! cached after it. Invalidations bump a generation counter; a rollup is
//! inserted with the generation seen before its rows were read and is
//! dropped again if the counter has moved.

use moka::future::Cache;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::estimate::EstimateRollup;

/// Application cache holding estimate rollups
#[derive(Clone)]
pub struct AppCache {
    /// Estimate rollups (document_number -> EstimateRollup)
    pub rollups: Cache<String, Arc<EstimateRollup>>,
    /// Bumped before every invalidation
    generation: Arc<AtomicU64>,
}

impl AppCache {
    /// Create a new cache with the given capacity and time-to-live
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            rollups: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .time_to_idle(ttl / 2)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current invalidation generation. Take it before reading the rows a
    /// rollup is computed from.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn get_rollup(&self, document_number: &str) -> Option<Arc<EstimateRollup>> {
        self.rollups.get(document_number).await
    }

    /// Cache a rollup computed from rows read at `generation`.
    ///
    /// Returns false, leaving nothing cached, when an invalidation ran in
    /// the meantime.
    pub async fn insert_rollup(
        &self,
        document_number: &str,
        rollup: Arc<EstimateRollup>,
        generation: u64,
    ) -> bool {
        self.rollups
            .insert(document_number.to_string(), rollup)
            .await;

        // Checked after the insert: an invalidation that lands between the
        // check and the insert would otherwise be missed
        if self.generation() != generation {
            self.rollups.invalidate(document_number).await;
            debug!("Discarded stale rollup for opportunity: {}", document_number);
            return false;
        }
        true
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            rollups_size: self.rollups.entry_count(),
        }
    }

    /// Invalidate all caches
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.rollups.invalidate_all();
        info!("All caches invalidated");
    }

    /// Drop the cached rollup for one opportunity
    pub async fn invalidate_opportunity(&self, document_number: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.rollups.invalidate(document_number).await;
        info!("Cache invalidated for opportunity: {}", document_number);
    }
}

impl Default for AppCache {
    fn default() -> Self {
        // 500 opportunities, 2 min TTL
        Self::new(500, Duration::from_secs(120))
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub rollups_size: u64,
}
