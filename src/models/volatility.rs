use crate::errors::{EngineError, EngineResult};

/// Daily candles: crypto trades every calendar day.
pub const DAILY_PERIODS_PER_YEAR: f64 = 365.0;

/// Minimum closes needed for a sample std dev of log returns (2 returns).
const MIN_CLOSES: usize = 3;

/// Annualized volatility estimates outside this band are treated as unusable.
const MIN_SANE_VOL: f64 = 0.01;
const MAX_SANE_VOL: f64 = 5.0;

/// Where the chain's volatility comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolatilitySource {
    /// The asset's configured default.
    AssetDefault,
    /// Caller-supplied annualized decimal (0.65 = 65%).
    Manual(f64),
    /// Estimate from the last `window` daily closes.
    Historical { window: usize },
}

/// Volatility actually used, and whether the fallback kicked in.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ResolvedVolatility {
    pub value: f64,
    pub source: &'static str,
    pub fallback: bool,
}

/// Annualized historical volatility from a series of close prices.
///
/// sigma = stdev(ln(P_i / P_{i-1})) * sqrt(periods_per_year), sample (n-1) variance.
pub fn historical_volatility(closes: &[f64], periods_per_year: f64) -> EngineResult<f64> {
    if closes.len() < MIN_CLOSES {
        return Err(EngineError::InvalidInput(format!(
            "need at least {MIN_CLOSES} closes, got {}",
            closes.len()
        )));
    }
    if let Some(bad) = closes.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
        return Err(EngineError::InvalidInput(format!("invalid close price: {bad}")));
    }

    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / (n - 1.0);

    let vol = var.sqrt() * periods_per_year.sqrt();
    if !vol.is_finite() {
        return Err(EngineError::NumericDegenerate(format!("historical vol = {vol}")));
    }
    Ok(vol)
}

/// Pick the volatility for a chain.
///
/// Manual values are validated and used as-is. Historical estimates fall
/// back to `default_vol` when `closes` is missing or the estimate is degenerate.
pub fn resolve_volatility(
    source: VolatilitySource,
    closes: Option<&[f64]>,
    default_vol: f64,
) -> EngineResult<ResolvedVolatility> {
    match source {
        VolatilitySource::AssetDefault => Ok(ResolvedVolatility {
            value: default_vol,
            source: "default",
            fallback: false,
        }),
        VolatilitySource::Manual(v) => {
            if !(v.is_finite() && v > 0.0) {
                return Err(EngineError::InvalidInput(format!(
                    "volatility must be positive, got {v}"
                )));
            }
            Ok(ResolvedVolatility {
                value: v,
                source: "manual",
                fallback: false,
            })
        }
        VolatilitySource::Historical { window } => {
            let estimate = closes
                .ok_or_else(|| EngineError::UpstreamUnavailable("no price history".into()))
                .and_then(|c| {
                    let start = c.len().saturating_sub(window + 1);
                    historical_volatility(&c[start..], DAILY_PERIODS_PER_YEAR)
                });

            match estimate {
                Ok(v) if (MIN_SANE_VOL..=MAX_SANE_VOL).contains(&v) => Ok(ResolvedVolatility {
                    value: v,
                    source: "historical",
                    fallback: false,
                }),
                Ok(v) => {
                    tracing::warn!(vol = v, window, "historical vol out of range, using default");
                    Ok(fallback(default_vol))
                }
                Err(e) => {
                    tracing::warn!(error = %e, window, "historical vol unavailable, using default");
                    Ok(fallback(default_vol))
                }
            }
        }
    }
}

fn fallback(default_vol: f64) -> ResolvedVolatility {
    ResolvedVolatility {
        value: default_vol,
        source: "default",
        fallback: true,
    }
}
