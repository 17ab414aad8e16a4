//! `GET /metrics`: request counters as JSON.

use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::metrics::MetricsSnapshot;

pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
