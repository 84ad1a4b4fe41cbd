use crate::chain::{MAX_DAYS_TO_EXPIRY, MAX_STRIKES_PER_SIDE};
use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub exchange_base_url: String,
    pub risk_free_rate: f64,
    pub default_days_to_expiry: u32,
    pub default_num_strikes: u32,
    pub hist_vol_window: usize,
    pub quote_cache_ttl_secs: u64,
    pub chain_cache_ttl_secs: u64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let risk_free_rate = env_var_or("RISK_FREE_RATE", "0.05")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("RISK_FREE_RATE: {e}")))?;
        if !risk_free_rate.is_finite() {
            return Err(EngineError::Config("RISK_FREE_RATE: must be finite".into()));
        }

        let default_days_to_expiry = env_var_or("DEFAULT_DAYS_TO_EXPIRY", "30")
            .parse::<u32>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_DAYS_TO_EXPIRY: {e}")))?;
        if default_days_to_expiry == 0 || default_days_to_expiry > MAX_DAYS_TO_EXPIRY {
            return Err(EngineError::Config(format!(
                "DEFAULT_DAYS_TO_EXPIRY: must be in 1..={MAX_DAYS_TO_EXPIRY}"
            )));
        }

        let default_num_strikes = env_var_or("DEFAULT_NUM_STRIKES", "5")
            .parse::<u32>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_NUM_STRIKES: {e}")))?;
        if default_num_strikes == 0 || default_num_strikes > MAX_STRIKES_PER_SIDE {
            return Err(EngineError::Config(format!(
                "DEFAULT_NUM_STRIKES: must be in 1..={MAX_STRIKES_PER_SIDE}"
            )));
        }

        let hist_vol_window = env_var_or("HIST_VOL_WINDOW", "30")
            .parse::<usize>()
            .map_err(|e| EngineError::Config(format!("HIST_VOL_WINDOW: {e}")))?;
        if hist_vol_window < 2 {
            return Err(EngineError::Config("HIST_VOL_WINDOW: must be >= 2".into()));
        }

        let quote_cache_ttl_secs = env_var_or("QUOTE_CACHE_TTL_SECS", "10")
            .parse::<u64>()
            .map_err(|e| EngineError::Config(format!("QUOTE_CACHE_TTL_SECS: {e}")))?;

        let chain_cache_ttl_secs = env_var_or("CHAIN_CACHE_TTL_SECS", "10")
            .parse::<u64>()
            .map_err(|e| EngineError::Config(format!("CHAIN_CACHE_TTL_SECS: {e}")))?;

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        Ok(Self {
            exchange_base_url: env_var_or("EXCHANGE_BASE_URL", "https://api.binance.com"),
            risk_free_rate,
            default_days_to_expiry,
            default_num_strikes,
            hist_vol_window,
            quote_cache_ttl_secs,
            chain_cache_ttl_secs,
            server_port,
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
