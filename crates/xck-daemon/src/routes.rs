//! Axum router and all HTTP handlers for xck-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{
        HaltedResponse, HealthResponse, SightingsRequest, SightingsResponse, TickRequest,
        TickResponse,
    },
    monitor::MonitorHalted,
    state::{now_millis, uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/sightings", post(post_sightings))
        .route("/v1/tick", post(post_tick))
        .with_state(state)
}

fn halted_response(h: MonitorHalted) -> Response {
    (
        StatusCode::CONFLICT,
        Json(HaltedResponse {
            error: "MONITOR_HALTED: restart the daemon to resume".to_string(),
            halt_reason: h.reason,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();

    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/sightings
// ---------------------------------------------------------------------------

/// Merge a batch of sightings.
///
/// `200` when every sighting was accepted, `422` when at least one was
/// rejected (the valid ones are still merged), `409` once halted.
pub(crate) async fn post_sightings(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SightingsRequest>,
) -> Response {
    let received_at = now_millis();
    let batch = req
        .sightings
        .into_iter()
        .map(|s| s.into_sighting(received_at))
        .collect();

    let summary = match st.ingest(batch).await {
        Ok(s) => s,
        Err(h) => return halted_response(h),
    };
    let open_records = st.status.read().await.open_records;

    let code = if summary.is_clean() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (
        code,
        Json(SightingsResponse {
            accepted: summary.accepted,
            rejected: summary.rejected,
            open_records,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/tick
// ---------------------------------------------------------------------------

/// Drive one sweep. Called by the block-subscription adapter on every new block.
pub(crate) async fn post_tick(
    State(st): State<Arc<AppState>>,
    Json(req): Json<TickRequest>,
) -> Response {
    let now_ms = req.now_ms.unwrap_or_else(now_millis);
    let summary = match st.tick(req.block_number, now_ms).await {
        Ok(s) => s,
        Err(h) => return halted_response(h),
    };
    info!(
        block = summary.block_number,
        verdicts = summary.outcome.verdicts.len(),
        "tick"
    );

    (
        StatusCode::OK,
        Json(TickResponse {
            block_number: summary.block_number,
            now_ms,
            consistent: summary.outcome.consistent.len(),
            pending: summary.outcome.pending,
            verdicts: summary.outcome.verdicts,
            halted: summary.halted,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::Verdict(_) => "verdict",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
