use axum::Json;
use chrono::Utc;

use crate::models::PingResponse;

/// Sample rate-limited endpoint.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "pong".to_string(),
        timestamp: Utc::now(),
    })
}
