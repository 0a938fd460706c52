//! Population-wide normalization bounds and their cached snapshot.
//!
//! The snapshot lives in a single store row. It is recomputed when absent,
//! when a refresh is forced, or when the live commit count no longer matches
//! the cached one. Concurrent refreshes are not serialized; the last upsert
//! wins and every writer computes the same value from the same data.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::attributes::{Bounds, CommitAttribute, RepoAttribute};
use crate::store::{RepoStore, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Indexed by [`RepoAttribute::index`].
    pub repo_bounds: [Bounds; 4],
    /// Indexed by [`CommitAttribute::index`].
    pub commit_bounds: [Bounds; 6],
    pub repo_count: u64,
    pub commit_count: u64,
    pub computed_at_ms: i64,
}

impl GlobalStats {
    pub fn repo(&self, attr: RepoAttribute) -> Bounds {
        self.repo_bounds[attr.index()]
    }

    pub fn commit(&self, attr: CommitAttribute) -> Bounds {
        self.commit_bounds[attr.index()]
    }

    /// Equality on everything except the refresh timestamp.
    pub fn same_bounds(&self, other: &GlobalStats) -> bool {
        self.repo_bounds == other.repo_bounds
            && self.commit_bounds == other.commit_bounds
            && self.repo_count == other.repo_count
            && self.commit_count == other.commit_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsSource {
    Cached,
    Missing,
    Forced,
    Stale {
        cached_commit_count: u64,
        live_commit_count: u64,
    },
}

impl StatsSource {
    pub fn was_refreshed(self) -> bool {
        !matches!(self, Self::Cached)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub stats: GlobalStats,
    pub source: StatsSource,
}

pub struct GlobalStatsCache<'a, S: RepoStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RepoStore + ?Sized> GlobalStatsCache<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn get(&self, force_refresh: bool) -> Result<StatsSnapshot, StoreError> {
        let cached = self.store.load_stats()?;
        let source = match (&cached, force_refresh) {
            (_, true) => StatsSource::Forced,
            (None, false) => StatsSource::Missing,
            (Some(stats), false) => {
                let live_commit_count = self.store.count_commits()?;
                if live_commit_count == stats.commit_count {
                    StatsSource::Cached
                } else {
                    StatsSource::Stale {
                        cached_commit_count: stats.commit_count,
                        live_commit_count,
                    }
                }
            }
        };

        if let (StatsSource::Cached, Some(stats)) = (source, cached) {
            info!(
                component = "stats",
                event = "stats.cache.hit",
                repo_count = stats.repo_count,
                commit_count = stats.commit_count,
                computed_at_ms = stats.computed_at_ms
            );
            return Ok(StatsSnapshot { stats, source });
        }

        let stats = self.refresh()?;
        info!(
            component = "stats",
            event = "stats.cache.refresh",
            source = ?source,
            repo_count = stats.repo_count,
            commit_count = stats.commit_count
        );
        Ok(StatsSnapshot { stats, source })
    }

    fn refresh(&self) -> Result<GlobalStats, StoreError> {
        let mut stats = self.store.aggregate_stats()?;
        stats.computed_at_ms = Utc::now().timestamp_millis();
        self.store.save_stats(&stats)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CommitEvent, RepoTarget};
    use std::cell::{Cell, RefCell};

    struct FakeStore {
        live_commit_count: Cell<u64>,
        offline: Cell<bool>,
        saved: RefCell<Option<GlobalStats>>,
        aggregations: Cell<u32>,
    }

    impl FakeStore {
        fn new(live_commit_count: u64) -> Self {
            Self {
                live_commit_count: Cell::new(live_commit_count),
                offline: Cell::new(false),
                saved: RefCell::new(None),
                aggregations: Cell::new(0),
            }
        }
    }

    impl RepoStore for FakeStore {
        fn count_commits(&self) -> Result<u64, StoreError> {
            if self.offline.get() {
                return Err(StoreError::Backend("connection refused".to_string()));
            }
            Ok(self.live_commit_count.get())
        }

        fn aggregate_stats(&self) -> Result<GlobalStats, StoreError> {
            self.aggregations.set(self.aggregations.get() + 1);
            Ok(GlobalStats {
                repo_bounds: [Bounds::new(0.0, 10.0); 4],
                commit_bounds: [Bounds::new(0.0, 100.0); 6],
                repo_count: 3,
                commit_count: self.live_commit_count.get(),
                computed_at_ms: 0,
            })
        }

        fn load_stats(&self) -> Result<Option<GlobalStats>, StoreError> {
            Ok(self.saved.borrow().clone())
        }

        fn save_stats(&self, stats: &GlobalStats) -> Result<(), StoreError> {
            *self.saved.borrow_mut() = Some(stats.clone());
            Ok(())
        }

        fn fetch_targets(
            &self,
            _column: RepoAttribute,
            _offset: u64,
            _limit: u64,
        ) -> Result<Vec<RepoTarget>, StoreError> {
            Ok(Vec::new())
        }

        fn fetch_target_by_id(
            &self,
            _column: RepoAttribute,
            _repo_id: i64,
        ) -> Result<Option<RepoTarget>, StoreError> {
            Ok(None)
        }

        fn fetch_commits(&self, _repo_ids: &[i64]) -> Result<Vec<CommitEvent>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn missing_row_is_computed_and_persisted() {
        let store = FakeStore::new(5);
        let snapshot = GlobalStatsCache::new(&store).get(false).unwrap();

        assert_eq!(snapshot.source, StatsSource::Missing);
        assert_eq!(snapshot.stats.commit_count, 5);
        assert!(snapshot.stats.computed_at_ms > 0);
        assert_eq!(store.aggregations.get(), 1);
        assert_eq!(store.saved.borrow().as_ref(), Some(&snapshot.stats));
    }

    #[test]
    fn matching_commit_count_reuses_cached_row() {
        let store = FakeStore::new(5);
        let cache = GlobalStatsCache::new(&store);
        cache.get(false).unwrap();
        let second = cache.get(false).unwrap();

        assert_eq!(second.source, StatsSource::Cached);
        assert!(!second.source.was_refreshed());
        assert_eq!(store.aggregations.get(), 1);
    }

    #[test]
    fn changed_commit_count_triggers_refresh() {
        let store = FakeStore::new(5);
        let cache = GlobalStatsCache::new(&store);
        cache.get(false).unwrap();
        store.live_commit_count.set(7);

        let snapshot = cache.get(false).unwrap();
        assert_eq!(
            snapshot.source,
            StatsSource::Stale {
                cached_commit_count: 5,
                live_commit_count: 7
            }
        );
        assert_eq!(snapshot.stats.commit_count, 7);
        assert_eq!(store.aggregations.get(), 2);
    }

    #[test]
    fn forced_refresh_recomputes_even_when_fresh() {
        let store = FakeStore::new(5);
        let cache = GlobalStatsCache::new(&store);
        let first = cache.get(false).unwrap();
        let forced = cache.get(true).unwrap();

        assert_eq!(forced.source, StatsSource::Forced);
        assert!(forced.stats.same_bounds(&first.stats));
        assert_eq!(store.aggregations.get(), 2);
    }

    #[test]
    fn store_failure_during_staleness_check_propagates() {
        let store = FakeStore::new(5);
        let cache = GlobalStatsCache::new(&store);
        cache.get(false).unwrap();
        store.offline.set(true);

        let err = cache.get(false).expect_err("must fail");
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(store.aggregations.get(), 1);
    }
}
