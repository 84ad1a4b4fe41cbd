mod assets;
mod cache;
mod chain;
mod config;
mod errors;
mod feeds;
mod models;
mod server;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("quantprob starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        exchange = %cfg.exchange_base_url,
        rate = cfg.risk_free_rate,
        strikes = cfg.default_num_strikes,
        "config loaded"
    );

    let app_state = AppState::new(cfg.clone());

    // ── Spawn tasks ──

    // 1. Quote warmer (keeps spot quotes fresh in the cache)
    let warmer_state = app_state.clone();
    tokio::spawn(async move {
        feeds::exchange::run_quote_warmer(warmer_state).await;
    });

    // 2. Axum HTTP server
    let port = cfg.server_port;

    let app = axum::Router::new()
        .route("/api/assets", axum::routing::get(server::routes::get_assets))
        .route("/api/quote", axum::routing::get(server::routes::get_quote))
        .route("/api/chain", axum::routing::get(server::routes::get_chain))
        .route("/api/counters", axum::routing::get(server::routes::get_counters))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(app_state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}
