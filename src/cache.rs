//! Short-TTL memoization of aggregate query results.
//!
//! The cache is not durable and never invalidated on write; entries simply
//! age out. Rebuilding any entry is side-effect-free, so serving a stale view
//! for up to one TTL is an accepted trade.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::Clock;

/// Canonicalized query signature. Two requests for the same view produce the
/// same key regardless of how the caller spelled the parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Range {
        start_date: NaiveDate,
        days: u64,
        include_categories: bool,
    },
    Monthly {
        months: u32,
    },
}

impl QueryKey {
    pub fn range(start_date: NaiveDate, days: u64, include_categories: bool) -> Self {
        Self::Range {
            start_date,
            days,
            include_categories,
        }
    }

    pub fn monthly(months: u32) -> Self {
        Self::Monthly { months }
    }
}

struct Entry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// TTL cache for computed aggregate results, keyed by [`QueryKey`].
pub struct QueryCache<T> {
    entries: Mutex<HashMap<QueryKey, Entry<T>>>,
    clock: Arc<dyn Clock>,
    range_ttl: Duration,
    monthly_ttl: Duration,
}

impl<T: Clone> QueryCache<T> {
    /// Five minutes for range views, ten for the monthly overview.
    pub const DEFAULT_RANGE_TTL: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_MONTHLY_TTL: Duration = Duration::from_secs(10 * 60);

    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttls(clock, Self::DEFAULT_RANGE_TTL, Self::DEFAULT_MONTHLY_TTL)
    }

    pub fn with_ttls(clock: Arc<dyn Clock>, range_ttl: Duration, monthly_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            range_ttl,
            monthly_ttl,
        }
    }

    /// A live entry for `key`, or `None` when absent or expired. Expired
    /// entries are dropped on the way out.
    pub fn get(&self, key: &QueryKey) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache lock");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a computed result under `key` with the TTL for its query kind.
    pub fn insert(&self, key: QueryKey, value: T) {
        let ttl = match key {
            QueryKey::Range { .. } => self.range_ttl,
            QueryKey::Monthly { .. } => self.monthly_ttl,
        };
        let expires_at = self.clock.now()
            + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let mut entries = self.entries.lock().expect("cache lock");
        entries.insert(key, Entry { value, expires_at });
    }

    /// Drop every entry. Safe at any time; the next read recomputes.
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn entries_expire_after_their_ttl() {
        let clock = Arc::new(FixedClock::on_date(d("2024-03-15")));
        let cache: QueryCache<String> = QueryCache::new(clock.clone());
        let key = QueryKey::range(d("2024-01-10"), 30, false);

        cache.insert(key.clone(), "result".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some("result"));

        clock.advance(chrono::Duration::minutes(4));
        assert_eq!(cache.get(&key).as_deref(), Some("result"));

        clock.advance(chrono::Duration::minutes(2));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn monthly_entries_outlive_range_entries() {
        let clock = Arc::new(FixedClock::on_date(d("2024-03-15")));
        let cache: QueryCache<u32> = QueryCache::new(clock.clone());
        let range = QueryKey::range(d("2024-01-10"), 30, true);
        let monthly = QueryKey::monthly(12);

        cache.insert(range.clone(), 1);
        cache.insert(monthly.clone(), 2);

        clock.advance(chrono::Duration::minutes(7));
        assert_eq!(cache.get(&range), None);
        assert_eq!(cache.get(&monthly), Some(2));

        clock.advance(chrono::Duration::minutes(4));
        assert_eq!(cache.get(&monthly), None);
    }

    #[test]
    fn keys_distinguish_every_query_parameter() {
        let clock = Arc::new(FixedClock::on_date(d("2024-03-15")));
        let cache: QueryCache<u32> = QueryCache::new(clock);

        cache.insert(QueryKey::range(d("2024-01-10"), 30, false), 1);
        assert_eq!(cache.get(&QueryKey::range(d("2024-01-10"), 30, true)), None);
        assert_eq!(cache.get(&QueryKey::range(d("2024-01-10"), 31, false)), None);
        assert_eq!(cache.get(&QueryKey::range(d("2024-01-11"), 30, false)), None);
        assert_eq!(cache.get(&QueryKey::range(d("2024-01-10"), 30, false)), Some(1));
    }

    #[test]
    fn clear_empties_the_cache() {
        let clock = Arc::new(FixedClock::on_date(d("2024-03-15")));
        let cache: QueryCache<u32> = QueryCache::new(clock);
        cache.insert(QueryKey::monthly(6), 9);
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}
