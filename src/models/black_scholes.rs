use crate::errors::{EngineError, EngineResult};
use crate::models::{OptionQuote, PricingInputs, PricingModel};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Black-Scholes European option pricing.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
///
/// Only price, delta and gamma are computed. Inputs are validated by
/// `PricingInputs::new`, so every method here is infallible except `quote`,
/// which additionally rejects non-finite outputs.
pub struct BlackScholes {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }

    #[inline]
    fn sigma_sqrt_t(inputs: &PricingInputs) -> f64 {
        inputs.volatility() * inputs.time_to_expiry().sqrt()
    }

    #[inline]
    fn discount(inputs: &PricingInputs) -> f64 {
        (-inputs.risk_free_rate() * inputs.time_to_expiry()).exp()
    }

    #[inline]
    pub fn d1(&self, inputs: &PricingInputs) -> f64 {
        let sigma = inputs.volatility();
        let t = inputs.time_to_expiry();
        ((inputs.spot() / inputs.strike()).ln() + (inputs.risk_free_rate() + 0.5 * sigma * sigma) * t)
            / Self::sigma_sqrt_t(inputs)
    }

    #[inline]
    pub fn d2(&self, inputs: &PricingInputs) -> f64 {
        self.d1(inputs) - Self::sigma_sqrt_t(inputs)
    }

    pub fn call_price(&self, inputs: &PricingInputs) -> f64 {
        let d1 = self.d1(inputs);
        let d2 = d1 - Self::sigma_sqrt_t(inputs);
        inputs.spot() * self.normal.cdf(d1)
            - inputs.strike() * Self::discount(inputs) * self.normal.cdf(d2)
    }

    pub fn put_price(&self, inputs: &PricingInputs) -> f64 {
        let d1 = self.d1(inputs);
        let d2 = d1 - Self::sigma_sqrt_t(inputs);
        inputs.strike() * Self::discount(inputs) * self.normal.cdf(-d2)
            - inputs.spot() * self.normal.cdf(-d1)
    }

    #[inline]
    pub fn call_delta(&self, inputs: &PricingInputs) -> f64 {
        self.normal.cdf(self.d1(inputs))
    }

    #[inline]
    pub fn put_delta(&self, inputs: &PricingInputs) -> f64 {
        self.normal.cdf(self.d1(inputs)) - 1.0
    }

    /// Same for calls and puts.
    #[inline]
    pub fn gamma(&self, inputs: &PricingInputs) -> f64 {
        self.normal.pdf(self.d1(inputs)) / (inputs.spot() * Self::sigma_sqrt_t(inputs))
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingModel for BlackScholes {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    fn quote(&self, inputs: &PricingInputs) -> EngineResult<OptionQuote> {
        let d2 = self.d2(inputs);

        let quote = OptionQuote {
            call_price: self.call_price(inputs),
            put_price: self.put_price(inputs),
            call_delta: self.call_delta(inputs),
            put_delta: self.put_delta(inputs),
            gamma: self.gamma(inputs),
            call_prob_terminal: self.normal.cdf(d2),
            put_prob_terminal: self.normal.cdf(-d2),
        };

        let values = [
            quote.call_price,
            quote.put_price,
            quote.call_delta,
            quote.put_delta,
            quote.gamma,
            quote.call_prob_terminal,
            quote.put_prob_terminal,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::NumericDegenerate(format!(
                "non-finite output at strike {} (d2={d2})",
                inputs.strike()
            )));
        }

        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(spot: f64, strike: f64, days: f64, rate: f64, vol: f64) -> PricingInputs {
        PricingInputs::new(spot, strike, days / 365.0, rate, vol).unwrap()
    }

    fn grid() -> Vec<PricingInputs> {
        let mut out = Vec::new();
        for &spot in &[1.5, 100.0, 50_000.0] {
            for &moneyness in &[0.7, 0.95, 1.0, 1.05, 1.4] {
                for &days in &[1.0, 30.0, 365.0] {
                    for &rate in &[0.0, 0.05] {
                        for &vol in &[0.2, 0.65, 1.2] {
                            out.push(inputs(spot, spot * moneyness, days, rate, vol));
                        }
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_known_value() {
        // S=100, K=100, T=1, r=5%, sigma=20%: call 10.4506, put 5.5735
        let bs = BlackScholes::new();
        let p = PricingInputs::new(100.0, 100.0, 1.0, 0.05, 0.2).unwrap();
        assert!((bs.call_price(&p) - 10.4506).abs() < 1e-3, "call={}", bs.call_price(&p));
        assert!((bs.put_price(&p) - 5.5735).abs() < 1e-3, "put={}", bs.put_price(&p));
        assert!((bs.call_delta(&p) - 0.6368).abs() < 1e-3);
    }

    #[test]
    fn test_put_call_parity() {
        let bs = BlackScholes::new();
        for p in grid() {
            let lhs = bs.call_price(&p) - bs.put_price(&p);
            let rhs = p.spot() - p.strike() * (-p.risk_free_rate() * p.time_to_expiry()).exp();
            let tol = 1e-9 * p.spot().max(p.strike());
            assert!((lhs - rhs).abs() <= tol, "parity broken for {p:?}: {lhs} vs {rhs}");
        }
    }

    #[test]
    fn test_delta_bounds() {
        let bs = BlackScholes::new();
        for p in grid() {
            let cd = bs.call_delta(&p);
            let pd = bs.put_delta(&p);
            assert!((0.0..=1.0).contains(&cd), "call delta {cd} out of range");
            assert!((-1.0..=0.0).contains(&pd), "put delta {pd} out of range");
            assert!((cd - pd - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_gamma_non_negative_and_shared() {
        let bs = BlackScholes::new();
        for p in grid() {
            let g = bs.gamma(&p);
            assert!(g >= 0.0, "gamma {g} negative");
            let q = bs.quote(&p).unwrap();
            assert_eq!(q.gamma.to_bits(), g.to_bits());
        }
    }

    #[test]
    fn test_quote_rejects_non_finite_output() {
        // ~11.7M years at a negative rate: the discount factor overflows
        let bs = BlackScholes::new();
        let p = PricingInputs::new(100.0, 97.5, u32::MAX as f64 / crate::models::DAYS_PER_YEAR, -0.05, 0.5).unwrap();
        assert!(!bs.put_price(&p).is_finite(), "put should overflow for {p:?}");
        let err = bs.quote(&p);
        assert!(
            matches!(err, Err(EngineError::NumericDegenerate(_))),
            "expected NumericDegenerate, got {err:?}"
        );
    }

    #[test]
    fn test_quote_matches_individual_ops() {
        let bs = BlackScholes::new();
        let p = inputs(50_000.0, 51_250.0, 30.0, 0.05, 0.65);
        let q = bs.quote(&p).unwrap();
        assert_eq!(q.call_price, bs.call_price(&p));
        assert_eq!(q.put_price, bs.put_price(&p));
        assert_eq!(q.call_delta, bs.call_delta(&p));
        assert_eq!(q.put_delta, bs.put_delta(&p));
        assert_eq!(q.call_prob_terminal, bs.normal.cdf(bs.d2(&p)));
    }

    #[test]
    fn test_prices_non_negative() {
        let bs = BlackScholes::new();
        for p in grid() {
            let q = bs.quote(&p).unwrap();
            assert!(q.call_price >= -1e-9 * p.spot(), "call {}", q.call_price);
            assert!(q.put_price >= -1e-9 * p.spot(), "put {}", q.put_price);
        }
    }

    #[test]
    fn test_deterministic() {
        let bs = BlackScholes::new();
        let p = inputs(1.5, 1.4625, 7.0, 0.0, 0.9);
        let a = bs.quote(&p).unwrap();
        let b = bs.quote(&p).unwrap();
        assert_eq!(a, b);
    }
}
