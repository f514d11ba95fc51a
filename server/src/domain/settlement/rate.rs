//! Tiered rate resolution
//!
//! A well-formed rate table has exactly one tier per (type, views, instant).
//! When tiers overlap, resolution prefers the narrowest view range
//! (unbounded counts as infinitely wide), then the latest `applied_at`
//! (absent counts as earliest), then the highest id.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;

use super::error::SettlementError;
use crate::data::error::DataError;
use crate::data::traits::RateRepository;
use crate::data::types::{NewSettlementRate, SettlementRate, SettlementType};

/// Whether `rate` applies to `views` at `as_of`
pub fn rate_matches(
    rate: &SettlementRate,
    settlement_type: SettlementType,
    views: i64,
    as_of: DateTime<Utc>,
) -> bool {
    rate.settlement_type == settlement_type
        && rate.min_views <= views
        && rate.max_views.is_none_or(|max| max >= views)
        && rate.applied_at.is_none_or(|at| at <= as_of)
        && rate.expired_at.is_none_or(|at| at >= as_of)
}

/// Tie-break order; `Less` means `a` wins
fn preference(a: &SettlementRate, b: &SettlementRate) -> Ordering {
    let width = |r: &SettlementRate| r.max_views.map(|max| max.saturating_sub(r.min_views));
    let by_width = match (width(a), width(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_width
        .then_with(|| b.applied_at.cmp(&a.applied_at))
        .then_with(|| b.id.cmp(&a.id))
}

/// Pick the applicable tier among `candidates`
pub fn select_rate<'a>(
    candidates: &'a [SettlementRate],
    settlement_type: SettlementType,
    views: i64,
    as_of: DateTime<Utc>,
) -> Option<&'a SettlementRate> {
    candidates
        .iter()
        .filter(|r| rate_matches(r, settlement_type, views, as_of))
        .min_by(|a, b| preference(a, b))
}

/// Resolves the single applicable rate through a rate repository
#[derive(Clone)]
pub struct RateResolver {
    source: Arc<dyn RateRepository>,
}

impl RateResolver {
    pub fn new(source: Arc<dyn RateRepository>) -> Self {
        Self { source }
    }

    pub async fn resolve(
        &self,
        settlement_type: SettlementType,
        views: i64,
        as_of: DateTime<Utc>,
    ) -> Result<SettlementRate, SettlementError> {
        let candidates = self
            .source
            .find_candidate_rates(settlement_type, views, as_of)
            .await?;

        let selected = select_rate(&candidates, settlement_type, views, as_of).ok_or(
            SettlementError::RateNotFound {
                settlement_type,
                views,
                as_of,
            },
        )?;

        if candidates.len() > 1 {
            tracing::debug!(
                %settlement_type,
                views,
                candidates = candidates.len(),
                selected = selected.id,
                "Overlapping rates matched, applied tie-break"
            );
        }
        Ok(selected.clone())
    }
}

// ============================================================================
// Overlap detection
// ============================================================================

/// Two same-type tiers whose view ranges and validity windows intersect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateOverlap {
    pub settlement_type: SettlementType,
    pub first_id: i64,
    pub second_id: i64,
}

fn overlaps(a: &SettlementRate, b: &SettlementRate) -> bool {
    let views = a.min_views <= b.max_views.unwrap_or(i64::MAX)
        && b.min_views <= a.max_views.unwrap_or(i64::MAX);
    let validity = a.applied_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
        <= b.expired_at.unwrap_or(DateTime::<Utc>::MAX_UTC)
        && b.applied_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
            <= a.expired_at.unwrap_or(DateTime::<Utc>::MAX_UTC);
    a.settlement_type == b.settlement_type && views && validity
}

/// Every overlapping pair, lower id first
pub fn find_rate_overlaps(rates: &[SettlementRate]) -> Vec<RateOverlap> {
    let mut sorted: Vec<&SettlementRate> = rates.iter().collect();
    sorted.sort_by_key(|r| r.id);

    let mut found = Vec::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            if overlaps(a, b) {
                found.push(RateOverlap {
                    settlement_type: a.settlement_type,
                    first_id: a.id,
                    second_id: b.id,
                });
            }
        }
    }
    found
}

/// Load every tier and report overlaps across all settlement types
pub async fn check_rate_overlaps(
    source: &dyn RateRepository,
) -> Result<Vec<RateOverlap>, DataError> {
    let mut found = Vec::new();
    for settlement_type in SettlementType::ALL {
        let rates = source.list_rates(settlement_type).await?;
        found.extend(find_rate_overlaps(&rates));
    }
    Ok(found)
}

// ============================================================================
// Cached source
// ============================================================================

const RATE_CACHE_MAX_CAPACITY: u64 = 16;

/// Rate repository that keeps each type's tiers in memory for a short TTL
///
/// Candidate lookups filter the cached tiers in process, so a daily batch
/// reads the rate table once per type instead of once per content.
pub struct CachedRateSource {
    inner: Arc<dyn RateRepository>,
    cache: Cache<SettlementType, Arc<Vec<SettlementRate>>>,
}

impl CachedRateSource {
    pub fn new(inner: Arc<dyn RateRepository>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(RATE_CACHE_MAX_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    async fn tiers(
        &self,
        settlement_type: SettlementType,
    ) -> Result<Arc<Vec<SettlementRate>>, DataError> {
        if let Some(cached) = self.cache.get(&settlement_type).await {
            return Ok(cached);
        }
        let rates = Arc::new(self.inner.list_rates(settlement_type).await?);
        self.cache.insert(settlement_type, Arc::clone(&rates)).await;
        Ok(rates)
    }
}

#[async_trait]
impl RateRepository for CachedRateSource {
    async fn list_rates(
        &self,
        settlement_type: SettlementType,
    ) -> Result<Vec<SettlementRate>, DataError> {
        Ok(self.tiers(settlement_type).await?.as_ref().clone())
    }

    async fn find_candidate_rates(
        &self,
        settlement_type: SettlementType,
        views: i64,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<SettlementRate>, DataError> {
        let tiers = self.tiers(settlement_type).await?;
        Ok(tiers
            .iter()
            .filter(|r| rate_matches(r, settlement_type, views, as_of))
            .cloned()
            .collect())
    }

    async fn insert_rate(&self, rate: &NewSettlementRate) -> Result<i64, DataError> {
        let id = self.inner.insert_rate(rate).await?;
        self.cache.invalidate(&rate.settlement_type).await;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use chrono::TimeZone;

    use super::*;
    use crate::data::SqliteService;

    fn rate(id: i64, min: i64, max: Option<i64>, rate_value: i64) -> SettlementRate {
        SettlementRate {
            id,
            settlement_type: SettlementType::Content,
            min_views: min,
            max_views: max,
            applied_at: None,
            expired_at: None,
            rate_value,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_rate_matches_bounds_inclusive() {
        let mut r = rate(1, 100, Some(200), 1);
        r.applied_at = Some(at(2024, 1, 1));
        r.expired_at = Some(at(2024, 12, 31));
        let now = at(2024, 6, 1);

        assert!(rate_matches(&r, SettlementType::Content, 100, now));
        assert!(rate_matches(&r, SettlementType::Content, 200, now));
        assert!(!rate_matches(&r, SettlementType::Content, 99, now));
        assert!(!rate_matches(&r, SettlementType::Content, 201, now));
        assert!(!rate_matches(&r, SettlementType::Advertisement, 150, now));
        assert!(rate_matches(&r, SettlementType::Content, 150, at(2024, 1, 1)));
        assert!(rate_matches(&r, SettlementType::Content, 150, at(2024, 12, 31)));
        assert!(!rate_matches(&r, SettlementType::Content, 150, at(2025, 1, 1)));
    }

    #[test]
    fn test_narrowest_range_wins_regardless_of_order() {
        let narrow = rate(1, 0, Some(999), 10);
        let open = rate(2, 0, None, 5);
        let now = at(2024, 6, 1);

        let forward = [narrow.clone(), open.clone()];
        let reverse = [open, narrow];
        assert_eq!(select_rate(&forward, SettlementType::Content, 500, now).unwrap().id, 1);
        assert_eq!(select_rate(&reverse, SettlementType::Content, 500, now).unwrap().id, 1);
    }

    #[test]
    fn test_latest_applied_then_highest_id() {
        let now = at(2024, 6, 1);
        let mut old = rate(1, 0, Some(10), 1);
        old.applied_at = Some(at(2024, 1, 1));
        let mut new = rate(2, 0, Some(10), 2);
        new.applied_at = Some(at(2024, 3, 1));
        let always = rate(3, 0, Some(10), 3);

        let rates = [always.clone(), new, old];
        let picked = select_rate(&rates, SettlementType::Content, 5, now);
        assert_eq!(picked.unwrap().id, 2);

        let twins = [rate(4, 0, Some(10), 4), always];
        let picked = select_rate(&twins, SettlementType::Content, 5, now);
        assert_eq!(picked.unwrap().id, 4);
    }

    #[test]
    fn test_no_match() {
        let rates = [rate(1, 1000, None, 1)];
        assert!(select_rate(&rates, SettlementType::Content, 10, at(2024, 1, 1)).is_none());
    }

    #[test]
    fn test_find_overlaps() {
        let mut a = rate(1, 0, Some(999), 10);
        let b = rate(2, 1000, None, 8);
        let c = rate(3, 500, Some(1500), 9);
        let mut later = rate(4, 0, Some(999), 11);
        a.expired_at = Some(at(2024, 1, 1));
        later.applied_at = Some(at(2024, 1, 2));
        let mut ad = rate(5, 0, None, 1);
        ad.settlement_type = SettlementType::Advertisement;

        let found = find_rate_overlaps(&[c.clone(), a, b, later, ad]);
        let pairs: Vec<(i64, i64)> = found.iter().map(|o| (o.first_id, o.second_id)).collect();
        assert_eq!(pairs, vec![(1, 3), (2, 3), (3, 4)]);
    }

    #[tokio::test]
    async fn test_resolver_not_found() {
        let db = SqliteService::in_memory().await;
        let resolver = RateResolver::new(Arc::new(db));
        let err = resolver
            .resolve(SettlementType::Content, 10, at(2024, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::RateNotFound { views: 10, .. }));
    }

    #[tokio::test]
    async fn test_resolver_applies_tie_break_over_store() {
        let db = SqliteService::in_memory().await;
        let open = NewSettlementRate {
            settlement_type: SettlementType::Content,
            min_views: 0,
            max_views: None,
            applied_at: None,
            expired_at: None,
            rate_value: 5,
        };
        db.insert_rate(&open).await.unwrap();
        db.insert_rate(&NewSettlementRate {
            max_views: Some(999),
            rate_value: 10,
            ..open.clone()
        })
        .await
        .unwrap();

        let resolver = RateResolver::new(Arc::new(db.clone()));
        let picked = resolver
            .resolve(SettlementType::Content, 500, Utc::now())
            .await
            .unwrap();
        assert_eq!(picked.rate_value, 10);

        let overlaps = check_rate_overlaps(&db).await.unwrap();
        assert_eq!(overlaps.len(), 1);
    }

    struct CountingSource {
        inner: Arc<SqliteService>,
        list_calls: AtomicUsize,
    }

    #[async_trait]
    impl RateRepository for CountingSource {
        async fn list_rates(
            &self,
            settlement_type: SettlementType,
        ) -> Result<Vec<SettlementRate>, DataError> {
            self.list_calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.list_rates(settlement_type).await
        }

        async fn find_candidate_rates(
            &self,
            settlement_type: SettlementType,
            views: i64,
            as_of: DateTime<Utc>,
        ) -> Result<Vec<SettlementRate>, DataError> {
            self.inner
                .find_candidate_rates(settlement_type, views, as_of)
                .await
        }

        async fn insert_rate(&self, rate: &NewSettlementRate) -> Result<i64, DataError> {
            self.inner.insert_rate(rate).await
        }
    }

    #[tokio::test]
    async fn test_cached_source_reads_once_and_invalidates_on_insert() {
        let counting = Arc::new(CountingSource {
            inner: SqliteService::in_memory().await,
            list_calls: AtomicUsize::new(0),
        });
        let cached = CachedRateSource::new(counting.clone(), Duration::from_secs(60));
        let tier = NewSettlementRate {
            settlement_type: SettlementType::Content,
            min_views: 0,
            max_views: None,
            applied_at: None,
            expired_at: None,
            rate_value: 7,
        };
        cached.insert_rate(&tier).await.unwrap();

        for views in [1, 10, 100] {
            let found = cached
                .find_candidate_rates(SettlementType::Content, views, Utc::now())
                .await
                .unwrap();
            assert_eq!(found.len(), 1);
        }
        assert_eq!(counting.list_calls.load(AtomicOrdering::SeqCst), 1);

        cached
            .insert_rate(&NewSettlementRate {
                max_views: Some(50),
                ..tier
            })
            .await
            .unwrap();
        let found = cached
            .find_candidate_rates(SettlementType::Content, 10, Utc::now())
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(counting.list_calls.load(AtomicOrdering::SeqCst), 2);
    }
}
