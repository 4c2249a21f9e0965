//! Health Check Handler

use axum::Json;
use serde_json::{json, Value};

/// Basic health check
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
