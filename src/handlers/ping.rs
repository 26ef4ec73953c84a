//! Ping handler for health checks

use axum::Json;
use serde_json::{json, Value};

pub async fn ping() -> Json<Value> {
    Json(json!({
        "message": "pong",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
