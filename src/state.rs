use crate::cache::{ChainKey, TtlCache};
use crate::chain::OptionChain;
use crate::config::AppConfig;
use crate::feeds::exchange::{self, SpotQuote};
use crate::models::black_scholes::BlackScholes;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Distinct chain requests kept at once.
const CHAIN_CACHE_MAX_ENTRIES: usize = 256;

/// Price history changes once a day; an hour is plenty.
const HISTORY_CACHE_TTL: Duration = Duration::from_secs(3600);

// ── Request Counters (lock-free) ──

pub struct PerfCounters {
    pub chains_built: AtomicU64,
    pub chain_cache_hits: AtomicU64,
    pub quotes_served: AtomicU64,
    pub vol_fallbacks: AtomicU64,
    pub upstream_errors: AtomicU64,
    pub rejected_inputs: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            chains_built: AtomicU64::new(0),
            chain_cache_hits: AtomicU64::new(0),
            quotes_served: AtomicU64::new(0),
            vol_fallbacks: AtomicU64::new(0),
            upstream_errors: AtomicU64::new(0),
            rejected_inputs: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Application shared state ──

pub struct AppState {
    pub config: AppConfig,
    pub http: reqwest::Client,

    // Pricing model (stateless, shared by all requests)
    pub model: BlackScholes,

    pub quote_cache: TtlCache<&'static str, SpotQuote>,
    pub history_cache: TtlCache<(&'static str, usize), Vec<f64>>,
    pub chain_cache: TtlCache<ChainKey, OptionChain>,

    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let quote_ttl = Duration::from_secs(config.quote_cache_ttl_secs);
        let chain_ttl = Duration::from_secs(config.chain_cache_ttl_secs);

        Arc::new(Self {
            config,
            http: exchange::build_client(),
            model: BlackScholes::new(),
            quote_cache: TtlCache::new(quote_ttl),
            history_cache: TtlCache::new(HISTORY_CACHE_TTL),
            chain_cache: TtlCache::with_max_entries(chain_ttl, CHAIN_CACHE_MAX_ENTRIES),
            counters: PerfCounters::new(),
        })
    }
}
