use crate::assets::{self, Asset, ASSETS};
use crate::cache::ChainKey;
use crate::chain::access::{AccessTier, ChainView};
use crate::chain::{self, ChainConfig, ChainRequest, LEGACY_STRIKES_PER_SIDE};
use crate::errors::{EngineError, EngineResult};
use crate::feeds::exchange::{self, SpotQuote};
use crate::models::volatility::{self, ResolvedVolatility, VolatilitySource};
use crate::server::format::DisplayRow;
use crate::state::{AppState, PerfCounters};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::NaiveDate;
use std::sync::Arc;

pub const TIER_HEADER: &str = "x-access-tier";

/// Handler error: maps the engine taxonomy onto HTTP status codes.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            EngineError::NumericDegenerate(_) | EngineError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(serde::Deserialize)]
pub struct QuoteQuery {
    pub asset: String,
}

#[derive(serde::Deserialize)]
pub struct ChainQuery {
    pub asset: String,
    /// YYYY-MM-DD, wins over `days`
    pub expiry: Option<String>,
    pub days: Option<u32>,
    /// Percent, e.g. 65 for 65%
    pub vol: Option<f64>,
    /// manual | default | hist30 | hist90 | hist
    pub vol_source: Option<String>,
    pub strikes: Option<u32>,
    /// standard | legacy
    pub variant: Option<String>,
}

#[derive(serde::Serialize)]
pub struct ChainResponse {
    pub asset: &'static Asset,
    pub quote: SpotQuote,
    pub vol_resolution: ResolvedVolatility,
    pub decimals: i32,
    pub atm_index: Option<usize>,
    #[serde(flatten)]
    pub view: ChainView,
    pub display: Vec<DisplayRow>,
}

/// GET /api/assets -- catalogue visible to the caller's tier
pub async fn get_assets(headers: HeaderMap) -> Json<serde_json::Value> {
    let tier = tier_of(&headers);
    let visible: Vec<&Asset> = ASSETS.iter().filter(|a| tier.can_access(a)).collect();
    let locked: Vec<&str> = ASSETS
        .iter()
        .filter(|a| !tier.can_access(a))
        .map(|a| a.code)
        .collect();
    Json(serde_json::json!({ "tier": tier, "assets": visible, "locked": locked }))
}

/// GET /api/quote -- cached spot quote
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<QuoteQuery>,
) -> ApiResult<serde_json::Value> {
    let asset = authorize(&state, &params.asset, tier_of(&headers))?;
    let quote = exchange::cached_spot_quote(&state, asset)
        .await
        .inspect_err(|e| note_upstream_error(&state, asset, e))?;
    PerfCounters::bump(&state.counters.quotes_served);
    Ok(Json(serde_json::json!({ "asset": asset, "quote": quote })))
}

/// GET /api/chain -- option chain for an asset, gated by tier
pub async fn get_chain(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ChainQuery>,
) -> ApiResult<ChainResponse> {
    let tier = tier_of(&headers);
    let asset = authorize(&state, &params.asset, tier)?;

    let today = chrono::Utc::now().date_naive();
    let days_to_expiry = match params.expiry.as_deref() {
        Some(raw) => days_until(raw, today),
        None => Ok(params.days.unwrap_or(state.config.default_days_to_expiry)),
    }
    .inspect_err(|_| PerfCounters::bump(&state.counters.rejected_inputs))?;

    let legacy = match params.variant.as_deref() {
        None | Some("standard") => false,
        Some("legacy") => true,
        Some(other) => {
            PerfCounters::bump(&state.counters.rejected_inputs);
            return Err(EngineError::InvalidInput(format!("unknown variant: {other}")).into());
        }
    };

    let vol_source = parse_vol_source(params.vol_source.as_deref(), params.vol, state.config.hist_vol_window)
        .inspect_err(|_| PerfCounters::bump(&state.counters.rejected_inputs))?;

    // Upstream failures stop here: the engine never runs without a spot price.
    let quote = exchange::cached_spot_quote(&state, asset)
        .await
        .inspect_err(|e| note_upstream_error(&state, asset, e))?;

    let closes = match vol_source {
        VolatilitySource::Historical { window } => load_history(&state, asset, window).await,
        _ => None,
    };
    let resolved = volatility::resolve_volatility(vol_source, closes.as_deref(), asset.default_vol)
        .inspect_err(|_| PerfCounters::bump(&state.counters.rejected_inputs))?;
    if resolved.fallback {
        PerfCounters::bump(&state.counters.vol_fallbacks);
    }

    let num_strikes = strikes_per_side(legacy, params.strikes, state.config.default_num_strikes)
        .inspect_err(|_| PerfCounters::bump(&state.counters.rejected_inputs))?;

    let request = ChainRequest {
        spot: quote.price,
        volatility: resolved.value,
        days_to_expiry,
        risk_free_rate: state.config.risk_free_rate,
        num_strikes,
    };

    let full_chain = chain_for(&state, &request, legacy).inspect_err(|e| {
        if matches!(e, EngineError::InvalidInput(_)) {
            PerfCounters::bump(&state.counters.rejected_inputs);
        }
    })?;

    let view = ChainView::for_tier(full_chain, tier);
    let display = view
        .chain
        .rows
        .iter()
        .map(|r| DisplayRow::new(r, view.chain.spot))
        .collect();

    tracing::info!(
        asset = asset.code,
        spot = quote.price,
        vol = resolved.value,
        days = days_to_expiry,
        rows = view.chain.rows.len(),
        tier = %tier,
        "chain served"
    );

    Ok(Json(ChainResponse {
        asset,
        quote,
        vol_resolution: resolved,
        decimals: chain::strike_decimals(view.chain.spot),
        atm_index: view.chain.atm_index(),
        view,
        display,
    }))
}

/// GET /api/counters -- request counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "chains_built": state.counters.chains_built.load(Relaxed),
        "chain_cache_hits": state.counters.chain_cache_hits.load(Relaxed),
        "quotes_served": state.counters.quotes_served.load(Relaxed),
        "vol_fallbacks": state.counters.vol_fallbacks.load(Relaxed),
        "upstream_errors": state.counters.upstream_errors.load(Relaxed),
        "rejected_inputs": state.counters.rejected_inputs.load(Relaxed),
        "cached_chains": state.chain_cache.len(),
    }))
}

fn tier_of(headers: &HeaderMap) -> AccessTier {
    AccessTier::from_header(headers.get(TIER_HEADER).and_then(|v| v.to_str().ok()))
}

fn authorize(state: &AppState, code: &str, tier: AccessTier) -> EngineResult<&'static Asset> {
    let asset = assets::find(code).ok_or_else(|| {
        PerfCounters::bump(&state.counters.rejected_inputs);
        EngineError::InvalidInput(format!("unknown asset: {code}"))
    })?;
    if !tier.can_access(asset) {
        return Err(EngineError::Forbidden(format!(
            "{} requires the pro tier",
            asset.code
        )));
    }
    Ok(asset)
}

fn note_upstream_error(state: &AppState, asset: &Asset, e: &EngineError) {
    PerfCounters::bump(&state.counters.upstream_errors);
    tracing::warn!(asset = asset.code, error = %e, "spot quote unavailable");
}

/// Build or reuse a chain for identical inputs.
fn chain_for(state: &AppState, request: &ChainRequest, legacy: bool) -> EngineResult<chain::OptionChain> {
    let key = ChainKey::new(request, legacy);
    if let Some(hit) = state.chain_cache.get(&key) {
        PerfCounters::bump(&state.counters.chain_cache_hits);
        return Ok(hit);
    }

    let config = if legacy {
        ChainConfig::legacy()
    } else {
        ChainConfig::standard()
    };
    let built = chain::build_chain(&state.model, request, &config)?;
    PerfCounters::bump(&state.counters.chains_built);
    state.chain_cache.insert(key, built.clone());
    Ok(built)
}

/// Daily closes for the window, or None (caller falls back to the default vol).
async fn load_history(state: &AppState, asset: &'static Asset, window: usize) -> Option<Vec<f64>> {
    let key = (asset.code, window);
    if let Some(hit) = state.history_cache.get(&key) {
        return Some(hit);
    }
    match exchange::fetch_daily_closes(&state.http, &state.config.exchange_base_url, asset.symbol, window + 1)
        .await
    {
        Ok(closes) => {
            state.history_cache.insert(key, closes.clone());
            Some(closes)
        }
        Err(e) => {
            PerfCounters::bump(&state.counters.upstream_errors);
            tracing::warn!(asset = asset.code, window, error = %e, "price history unavailable");
            None
        }
    }
}

/// Whole days from `today` to an ISO expiry date. Must be in the future.
fn days_until(expiry: &str, today: NaiveDate) -> EngineResult<u32> {
    let date = NaiveDate::parse_from_str(expiry.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::InvalidInput(format!("expiry {expiry:?}: {e}")))?;
    let days = (date - today).num_days();
    if days <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "expiry {date} is not after {today}"
        )));
    }
    u32::try_from(days).map_err(|_| EngineError::InvalidInput(format!("expiry {date} too far out")))
}

/// The legacy variant has a fixed strike count; any other explicit count is an error.
fn strikes_per_side(legacy: bool, requested: Option<u32>, default: u32) -> EngineResult<u32> {
    match (legacy, requested) {
        (true, None) => Ok(LEGACY_STRIKES_PER_SIDE),
        (true, Some(n)) if n == LEGACY_STRIKES_PER_SIDE => Ok(n),
        (true, Some(n)) => Err(EngineError::InvalidInput(format!(
            "variant=legacy always uses {LEGACY_STRIKES_PER_SIDE} strikes per side, got strikes={n}"
        ))),
        (false, requested) => Ok(requested.unwrap_or(default)),
    }
}

fn parse_vol_source(
    source: Option<&str>,
    vol_pct: Option<f64>,
    default_window: usize,
) -> EngineResult<VolatilitySource> {
    let manual = |v: Option<f64>| {
        v.map(|pct| VolatilitySource::Manual(pct / 100.0))
            .ok_or_else(|| EngineError::InvalidInput("vol_source=manual needs vol".into()))
    };
    match source {
        None => Ok(vol_pct
            .map(|pct| VolatilitySource::Manual(pct / 100.0))
            .unwrap_or(VolatilitySource::AssetDefault)),
        Some("manual") => manual(vol_pct),
        Some("default") => Ok(VolatilitySource::AssetDefault),
        Some("hist") => Ok(VolatilitySource::Historical { window: default_window }),
        Some("hist30") => Ok(VolatilitySource::Historical { window: 30 }),
        Some("hist90") => Ok(VolatilitySource::Historical { window: 90 }),
        Some(other) => Err(EngineError::InvalidInput(format!("unknown vol_source: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_days_until() {
        assert_eq!(days_until("2026-11-18", date("2026-10-19")).unwrap(), 30);
        assert_eq!(days_until(" 2026-10-20 ", date("2026-10-19")).unwrap(), 1);
    }

    #[test]
    fn test_days_until_rejects_past_and_today() {
        assert!(days_until("2026-10-19", date("2026-10-19")).is_err());
        assert!(days_until("2025-01-01", date("2026-10-19")).is_err());
        assert!(days_until("19/10/2026", date("2026-10-19")).is_err());
    }

    #[test]
    fn test_strikes_per_side() {
        assert_eq!(strikes_per_side(false, None, 7).unwrap(), 7);
        assert_eq!(strikes_per_side(false, Some(12), 7).unwrap(), 12);
        assert_eq!(strikes_per_side(true, None, 7).unwrap(), LEGACY_STRIKES_PER_SIDE);
        assert_eq!(
            strikes_per_side(true, Some(LEGACY_STRIKES_PER_SIDE), 7).unwrap(),
            LEGACY_STRIKES_PER_SIDE
        );
        let err = strikes_per_side(true, Some(10), 7);
        assert!(
            matches!(err, Err(EngineError::InvalidInput(_))),
            "legacy must not silently drop strikes=10, got {err:?}"
        );
    }

    #[test]
    fn test_vol_source_parsing() {
        assert_eq!(parse_vol_source(None, None, 30).unwrap(), VolatilitySource::AssetDefault);
        assert_eq!(parse_vol_source(None, Some(65.0), 30).unwrap(), VolatilitySource::Manual(0.65));
        assert_eq!(
            parse_vol_source(Some("hist90"), Some(65.0), 30).unwrap(),
            VolatilitySource::Historical { window: 90 }
        );
        assert_eq!(
            parse_vol_source(Some("hist"), None, 45).unwrap(),
            VolatilitySource::Historical { window: 45 }
        );
        assert!(parse_vol_source(Some("manual"), None, 30).is_err());
        assert!(parse_vol_source(Some("implied"), None, 30).is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (EngineError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (EngineError::UpstreamUnavailable("x".into()), StatusCode::BAD_GATEWAY),
            (EngineError::NumericDegenerate("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
