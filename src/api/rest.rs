// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Read endpoints under `/api/` are public: they serve cached candle data and
// live prices to charting clients. The training and refresh endpoints cost
// real upstream calls and require a valid Bearer token checked via the
// `AuthBearer` extractor.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::freshness;
use crate::history::default_refresh_points;
use crate::types::Timeframe;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/health", get(health))
        .route("/api/history/:symbol/:timeframe", get(history))
        .route("/api/full/:symbol", get(full_history))
        .route("/api/live/:symbol", get(live))
        .route("/api/status", get(status))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/training/:symbol/:timeframe", get(training))
        .route("/api/refresh", post(refresh))
        // ── WebSocket (handled in ws module but mounted here) ───────
        .route("/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Request validation helpers
// =============================================================================

fn bad_request(message: String) -> Response {
    let body = serde_json::json!({ "error": message });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Normalise and validate a path symbol. Symbols are bare base-asset codes
/// (`BTC`, not `BTCUSDT`).
fn parse_symbol(raw: &str) -> Result<String, Response> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(bad_request(format!("invalid symbol '{raw}'")));
    }
    Ok(symbol)
}

fn parse_timeframe(raw: &str) -> Result<Timeframe, Response> {
    Timeframe::parse(raw)
        .ok_or_else(|| bad_request(format!("unknown timeframe '{raw}', expected one of 1m 1h 4h 1d 1w 1M")))
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Candle history (public)
// =============================================================================

/// Trailing candles for one (symbol, timeframe) series.
///
/// `?limit=` defaults to 100 and is clamped to [1, 5000]. The response is
/// ascending and never longer than the limit; an unknown series yields an
/// empty array, not an error.
async fn history(
    State(state): State<Arc<AppState>>,
    Path((symbol, timeframe)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let symbol = match parse_symbol(&symbol) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let timeframe = match parse_timeframe(&timeframe) {
        Ok(tf) => tf,
        Err(resp) => return resp,
    };
    let limit = query.limit.unwrap_or(100).clamp(1, 5000);

    let series = state.engine.get_data(&symbol, timeframe, limit).await;
    Json(series).into_response()
}

/// Five-year daily view for one symbol.
async fn full_history(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    let symbol = match parse_symbol(&symbol) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let series = state.engine.get_full_history(&symbol).await;
    Json(series).into_response()
}

// =============================================================================
// Live prices (public)
// =============================================================================

async fn live(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let symbol = match parse_symbol(&symbol) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let limit = query.limit.unwrap_or(100).max(1);

    Json(state.live.recent(&symbol, limit)).into_response()
}

// =============================================================================
// Status (public)
// =============================================================================

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_status())
}

// =============================================================================
// Training series (authenticated)
// =============================================================================

/// Full training series for one (symbol, timeframe), deep-fetched up to the
/// timeframe's required target when the stored copy is undersized. Gated
/// behind auth because a cold call can cost many upstream pages.
async fn training(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path((symbol, timeframe)): Path<(String, String)>,
) -> Response {
    let symbol = match parse_symbol(&symbol) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let timeframe = match parse_timeframe(&timeframe) {
        Ok(tf) => tf,
        Err(resp) => return resp,
    };

    let series = state.engine.get_training_data(&symbol, timeframe).await;
    let required = freshness::required_points(timeframe);
    let body = serde_json::json!({
        "symbol": symbol,
        "timeframe": timeframe,
        "points": series.len(),
        "required": required,
        "sufficient": series.len() >= required,
        "candles": series,
    });
    Json(body).into_response()
}

// =============================================================================
// Forced refresh (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct RefreshRequest {
    symbol: String,
    timeframe: String,
    #[serde(default)]
    points: Option<usize>,
}

async fn refresh(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Response {
    let symbol = match parse_symbol(&req.symbol) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let timeframe = match parse_timeframe(&req.timeframe) {
        Ok(tf) => tf,
        Err(resp) => return resp,
    };
    let points = req.points.unwrap_or_else(|| default_refresh_points(timeframe));

    info!(symbol = %symbol, timeframe = %timeframe, points, "manual refresh requested");
    let total = state.engine.refresh(&symbol, timeframe, points).await;

    Json(serde_json::json!({
        "symbol": symbol,
        "timeframe": timeframe,
        "points": total,
    }))
    .into_response()
}
