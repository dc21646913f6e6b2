//! xck-daemon entry point.
//!
//! Thin: set up tracing, load config, build the shared state, serve HTTP until
//! ctrl-c or a halt. A halt exits non-zero.

use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context};
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};
use xck_config::{load_layered_yaml, report_unused_keys, MonitorConfig, UnusedKeyPolicy};
use xck_daemon::{routes, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let (config, config_hash) = load_config()?;
    info!(
        required = ?config.reconcile.required_channels,
        optional = ?config.reconcile.optional_channels,
        window_ms = config.reconcile.settlement_window_ms,
        mode = ?config.reconcile.mode,
        anchor = ?config.reconcile.anchor,
        after_report = ?config.reconcile.after_report,
        on_anomaly = ?config.reporter.on_anomaly,
        "monitor configured"
    );

    let addr = match bind_addr_from_env() {
        Some(a) => a,
        None => config.daemon.socket_addr()?,
    };
    let heartbeat = Duration::from_millis(config.daemon.heartbeat_ms);

    let shared = Arc::new(state::AppState::new(config, config_hash)?);
    state::spawn_heartbeat(shared.bus.clone(), heartbeat);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!("xck-daemon listening on http://{}", addr);

    let halt_watch = Arc::clone(&shared);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = halt_watch.wait_for_halt() => {}
                _ = tokio::signal::ctrl_c() => info!("ctrl-c received, shutting down"),
            }
        })
        .await
        .context("server crashed")?;

    if shared.is_halted() {
        let reason = shared.status.read().await.halt_reason.clone();
        bail!(
            "monitor halted: {}",
            reason.unwrap_or_else(|| "anomaly".to_string())
        );
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `XCK_CONFIG` is a comma-separated list of YAML layers in merge order.
/// Without it the built-in defaults apply.
fn load_config() -> anyhow::Result<(MonitorConfig, Option<String>)> {
    let Ok(raw) = std::env::var("XCK_CONFIG") else {
        warn!("XCK_CONFIG not set; using built-in defaults");
        let cfg = MonitorConfig::default();
        cfg.validate()?;
        return Ok((cfg, None));
    };

    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let loaded = load_layered_yaml(&paths)?;
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &report.unused_leaf_pointers {
        warn!(pointer = %p, "unused config key");
    }
    let cfg = loaded.monitor()?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");
    Ok((cfg, Some(loaded.config_hash)))
}

fn bind_addr_from_env() -> Option<std::net::SocketAddr> {
    std::env::var("XCK_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
