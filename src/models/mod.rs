pub mod black_scholes;
pub mod volatility;

use crate::errors::{EngineError, EngineResult};

/// Calendar days per year used to turn days-to-expiry into a year fraction.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// All pricing models implement this trait.
/// quote() must be a pure function: same inputs, bit-identical outputs.
pub trait PricingModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Price both sides of a European option at one strike.
    fn quote(&self, inputs: &PricingInputs) -> EngineResult<OptionQuote>;
}

/// Validated model inputs. Only constructible through `new`, so every
/// model evaluation runs on positive spot/strike/vol/time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingInputs {
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    risk_free_rate: f64,
    volatility: f64,
}

impl PricingInputs {
    pub fn new(
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        risk_free_rate: f64,
        volatility: f64,
    ) -> EngineResult<Self> {
        ensure_positive("spot", spot)?;
        ensure_positive("strike", strike)?;
        ensure_positive("time to expiry", time_to_expiry)?;
        ensure_positive("volatility", volatility)?;
        if !risk_free_rate.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "risk-free rate must be finite, got {risk_free_rate}"
            )));
        }
        Ok(Self {
            spot,
            strike,
            time_to_expiry,
            risk_free_rate,
            volatility,
        })
    }

    #[inline]
    pub fn spot(&self) -> f64 {
        self.spot
    }

    #[inline]
    pub fn strike(&self) -> f64 {
        self.strike
    }

    #[inline]
    pub fn time_to_expiry(&self) -> f64 {
        self.time_to_expiry
    }

    #[inline]
    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    #[inline]
    pub fn volatility(&self) -> f64 {
        self.volatility
    }
}

/// Call/put values at a single strike. Gamma is shared by both sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionQuote {
    pub call_price: f64,
    pub put_price: f64,
    pub call_delta: f64,
    pub put_delta: f64,
    pub gamma: f64,
    /// Risk-neutral P(S_T > K) = Phi(d2)
    pub call_prob_terminal: f64,
    /// Risk-neutral P(S_T < K) = Phi(-d2)
    pub put_prob_terminal: f64,
}

/// Rough one-touch estimate: twice the ITM probability, capped at 99.
///
/// This is a heuristic, not the reflection-principle touch probability.
/// Input and output are percentages.
#[inline]
pub fn touch_probability(call_prob_itm: f64) -> f64 {
    (call_prob_itm * 2.0).min(99.0)
}

#[inline]
pub fn years_from_days(days: u32) -> f64 {
    days as f64 / DAYS_PER_YEAR
}

fn ensure_positive(field: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidInput(format!(
            "{field} must be positive and finite, got {value}"
        )))
    }
}
