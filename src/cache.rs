use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Entry cap used by `TtlCache::new`.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Small time- and size-bounded cache for quotes and chains.
/// Readers get clones; expired entries are dropped on access. When full,
/// an insert evicts the oldest entry.
pub struct TtlCache<K, V> {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_max_entries(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        // A poisoned lock only means another request panicked mid-insert; treat as a miss.
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some((stored, value)) if now.saturating_duration_since(*stored) < self.ttl => {
                return Some(value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    fn insert_at(&self, key: K, value: V, now: Instant) {
        if let Ok(mut entries) = self.entries.lock() {
            let ttl = self.ttl;
            entries.retain(|_, (stored, _)| now.saturating_duration_since(*stored) < ttl);
            while entries.len() >= self.max_entries && !entries.contains_key(&key) {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, (stored, _))| *stored)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        entries.remove(&k);
                    }
                    None => break,
                }
            }
            entries.insert(key, (now, value));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// Exact cache key for a chain: the bit patterns of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainKey {
    pub spot: u64,
    pub volatility: u64,
    pub days_to_expiry: u32,
    pub risk_free_rate: u64,
    pub num_strikes: u32,
    pub legacy: bool,
}

impl ChainKey {
    pub fn new(request: &crate::chain::ChainRequest, legacy: bool) -> Self {
        Self {
            spot: request.spot.to_bits(),
            volatility: request.volatility.to_bits(),
            days_to_expiry: request.days_to_expiry,
            risk_free_rate: request.risk_free_rate.to_bits(),
            num_strikes: request.num_strikes,
            legacy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainRequest;

    #[test]
    fn test_hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert_at("BTC", 50_000.0, t0);
        assert_eq!(cache.get_at(&"BTC", t0 + Duration::from_secs(9)), Some(50_000.0));
    }

    #[test]
    fn test_miss_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert_at("BTC", 50_000.0, t0);
        assert_eq!(cache.get_at(&"BTC", t0 + Duration::from_secs(10)), None);
        assert_eq!(cache.len(), 0, "expired entry should be evicted");
    }

    #[test]
    fn test_insert_evicts_stale() {
        let cache = TtlCache::new(Duration::from_secs(5));
        let t0 = Instant::now();
        cache.insert_at("ETH", 1.0, t0);
        cache.insert_at("BTC", 2.0, t0 + Duration::from_secs(6));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_size_cap_evicts_oldest() {
        let cache = TtlCache::with_max_entries(Duration::from_secs(60), 3);
        let t0 = Instant::now();
        for (i, days) in [7u32, 14, 30, 60, 90].into_iter().enumerate() {
            cache.insert_at(days, i, t0 + Duration::from_millis(i as u64));
            assert!(cache.len() <= 3, "cache grew to {} entries", cache.len());
        }
        let later = t0 + Duration::from_secs(1);
        assert_eq!(cache.get_at(&7, later), None, "oldest entry should be gone");
        assert_eq!(cache.get_at(&14, later), None);
        assert_eq!(cache.get_at(&30, later), Some(2));
        assert_eq!(cache.get_at(&90, later), Some(4));
    }

    #[test]
    fn test_size_cap_overwrite_keeps_others() {
        let cache = TtlCache::with_max_entries(Duration::from_secs(60), 2);
        let t0 = Instant::now();
        cache.insert_at("BTC", 1.0, t0);
        cache.insert_at("ETH", 2.0, t0 + Duration::from_millis(1));
        cache.insert_at("BTC", 3.0, t0 + Duration::from_millis(2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at(&"ETH", t0 + Duration::from_millis(3)), Some(2.0));
        assert_eq!(cache.get_at(&"BTC", t0 + Duration::from_millis(3)), Some(3.0));
    }

    #[test]
    fn test_chain_key_exact() {
        let a = ChainRequest {
            spot: 50_000.0,
            volatility: 0.65,
            days_to_expiry: 30,
            risk_free_rate: 0.05,
            num_strikes: 5,
        };
        let mut b = a;
        assert_eq!(ChainKey::new(&a, false), ChainKey::new(&b, false));
        assert_ne!(ChainKey::new(&a, false), ChainKey::new(&a, true));
        b.spot = 50_000.01;
        assert_ne!(ChainKey::new(&a, false), ChainKey::new(&b, false));
    }
}
