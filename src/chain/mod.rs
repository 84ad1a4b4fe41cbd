pub mod access;

use crate::errors::{EngineError, EngineResult};
use crate::models::{touch_probability, years_from_days, PricingInputs, PricingModel};

/// Upper bound on strikes per side (41 rows).
pub const MAX_STRIKES_PER_SIDE: u32 = 20;

/// The earlier variant always shows 11 strikes.
pub const LEGACY_STRIKES_PER_SIDE: u32 = 5;

/// Ten years. Longer horizons are rejected before they reach the model.
pub const MAX_DAYS_TO_EXPIRY: u32 = 3650;

/// Spots below this are quoted with 4 decimals instead of 2.
pub const FINE_PRICE_THRESHOLD: f64 = 10.0;

/// Caller input for one chain (spot, vol, days, rate, strikes per side).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainRequest {
    pub spot: f64,
    pub volatility: f64,
    pub days_to_expiry: u32,
    pub risk_free_rate: f64,
    pub num_strikes: u32,
}

impl ChainRequest {
    fn validate(&self) -> EngineResult<()> {
        if !(self.spot.is_finite() && self.spot > 0.0) {
            return Err(EngineError::InvalidInput(format!("spot must be positive, got {}", self.spot)));
        }
        if !(self.volatility.is_finite() && self.volatility > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "volatility must be positive, got {}",
                self.volatility
            )));
        }
        if self.days_to_expiry == 0 || self.days_to_expiry > MAX_DAYS_TO_EXPIRY {
            return Err(EngineError::InvalidInput(format!(
                "days to expiry must be in 1..={MAX_DAYS_TO_EXPIRY}, got {}",
                self.days_to_expiry
            )));
        }
        if self.num_strikes == 0 || self.num_strikes > MAX_STRIKES_PER_SIDE {
            return Err(EngineError::InvalidInput(format!(
                "strikes per side must be in 1..={MAX_STRIKES_PER_SIDE}, got {}",
                self.num_strikes
            )));
        }
        Ok(())
    }
}

/// How strikes are laid out around spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrikeSpacing {
    /// strike_i = spot + i * (spot * step_pct)
    Additive { step_pct: f64 },
    /// strike_i = spot * (1 + i * step_pct)
    Multiplicative { step_pct: f64 },
}

/// Which number goes into the probability-ITM columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItmMeasure {
    /// |delta| * 100
    Delta,
    /// Phi(d2) * 100 for calls, Phi(-d2) * 100 for puts
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainConfig {
    pub spacing: StrikeSpacing,
    pub itm_measure: ItmMeasure,
    /// Fill `touch_probability` on every row.
    pub touch_estimate: bool,
}

impl ChainConfig {
    /// 2.5% additive spacing, delta-based ITM probabilities.
    pub fn standard() -> Self {
        Self {
            spacing: StrikeSpacing::Additive { step_pct: 0.025 },
            itm_measure: ItmMeasure::Delta,
            touch_estimate: true,
        }
    }

    /// 2% multiplicative spacing, Phi(d2) probabilities. Pair with
    /// `LEGACY_STRIKES_PER_SIDE`.
    pub fn legacy() -> Self {
        Self {
            spacing: StrikeSpacing::Multiplicative { step_pct: 0.02 },
            itm_measure: ItmMeasure::Terminal,
            touch_estimate: true,
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ChainRow {
    pub strike: f64,
    pub call_price: f64,
    pub put_price: f64,
    pub call_delta: f64,
    pub put_delta: f64,
    pub call_prob_itm: f64,
    pub put_prob_itm: f64,
    pub gamma: f64,
    pub is_call_itm: bool,
    pub is_put_itm: bool,
    /// Heuristic, see `models::touch_probability`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touch_probability: Option<f64>,
}

impl ChainRow {
    /// Neither side strictly in the money.
    #[inline]
    pub fn is_atm(&self) -> bool {
        !self.is_call_itm && !self.is_put_itm
    }
}

/// Rows are strictly ascending by strike.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OptionChain {
    pub model: &'static str,
    pub spot: f64,
    pub volatility: f64,
    pub days_to_expiry: u32,
    pub risk_free_rate: f64,
    pub rows: Vec<ChainRow>,
}

impl OptionChain {
    /// Index of the row whose strike is nearest spot.
    pub fn atm_index(&self) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a.strike - self.spot)
                    .abs()
                    .total_cmp(&(b.strike - self.spot).abs())
            })
            .map(|(i, _)| i)
    }
}

/// Decimal places for strikes (and prices) quoted against this spot.
#[inline]
pub fn strike_decimals(spot: f64) -> i32 {
    if spot < FINE_PRICE_THRESHOLD {
        4
    } else {
        2
    }
}

#[inline]
pub fn round_strike(strike: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (strike * scale).round() / scale
}

/// Symmetric strike grid: `2 * num_strikes + 1` rounded strikes, ascending.
///
/// Fails if rounding collapses adjacent strikes or pushes one to zero,
/// which only happens for spots far below the 4-decimal resolution.
pub fn strike_grid(spot: f64, num_strikes: u32, spacing: StrikeSpacing) -> EngineResult<Vec<f64>> {
    let decimals = strike_decimals(spot);
    let n = num_strikes as i64;

    let strikes: Vec<f64> = (-n..=n)
        .map(|i| {
            let i = i as f64;
            let raw = match spacing {
                StrikeSpacing::Additive { step_pct } => spot + i * (spot * step_pct),
                StrikeSpacing::Multiplicative { step_pct } => spot * (1.0 + i * step_pct),
            };
            round_strike(raw, decimals)
        })
        .collect();

    if let Some(&first) = strikes.first() {
        if first <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "grid around spot {spot} reaches non-positive strike {first}"
            )));
        }
    }
    if strikes.windows(2).any(|w| w[1] <= w[0]) {
        return Err(EngineError::InvalidInput(format!(
            "spot {spot} too small to space strikes at {decimals} decimals"
        )));
    }

    Ok(strikes)
}

/// Build the full chain. All-or-nothing: any invalid strike or degenerate
/// model output aborts the whole chain.
pub fn build_chain(
    model: &dyn PricingModel,
    request: &ChainRequest,
    config: &ChainConfig,
) -> EngineResult<OptionChain> {
    request.validate()?;

    let t = years_from_days(request.days_to_expiry);
    let strikes = strike_grid(request.spot, request.num_strikes, config.spacing)?;

    let rows = strikes
        .into_iter()
        .map(|strike| -> EngineResult<ChainRow> {
            let inputs = PricingInputs::new(
                request.spot,
                strike,
                t,
                request.risk_free_rate,
                request.volatility,
            )?;
            let q = model.quote(&inputs)?;

            let (call_prob_itm, put_prob_itm) = match config.itm_measure {
                ItmMeasure::Delta => (q.call_delta.abs() * 100.0, q.put_delta.abs() * 100.0),
                ItmMeasure::Terminal => (q.call_prob_terminal * 100.0, q.put_prob_terminal * 100.0),
            };

            Ok(ChainRow {
                strike,
                call_price: q.call_price.max(0.0),
                put_price: q.put_price.max(0.0),
                call_delta: q.call_delta,
                put_delta: q.put_delta,
                call_prob_itm,
                put_prob_itm,
                gamma: q.gamma,
                is_call_itm: request.spot > strike,
                is_put_itm: request.spot < strike,
                touch_probability: config.touch_estimate.then(|| touch_probability(call_prob_itm)),
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    tracing::debug!(
        model = model.name(),
        spot = request.spot,
        rows = rows.len(),
        "chain built"
    );

    Ok(OptionChain {
        model: model.name(),
        spot: request.spot,
        volatility: request.volatility,
        days_to_expiry: request.days_to_expiry,
        risk_free_rate: request.risk_free_rate,
        rows,
    })
}
