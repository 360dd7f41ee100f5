// ABOUTME: Health check endpoint
// ABOUTME: Reports service liveness and database reachability

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "ok",
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database");
            "unavailable"
        }
    };

    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database == "ok" { "healthy" } else { "degraded" },
            "database": database,
            "version": env!("CARGO_PKG_VERSION"),
            "service": "agentbay"
        })),
    )
}
