use axum::Json;
use chrono::Utc;
use serde_json::{Value, json};

#[utoipa::path(
    get,
    path = "/api/test",
    responses((status = 200, description = "Service is up"))
)]
pub async fn api_test() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Transfer backend is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
