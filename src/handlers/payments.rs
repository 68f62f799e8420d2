use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::QueueError;
use crate::models::PaymentRequest;
use crate::services::PaymentService;

pub async fn create_payment(
    State(service): State<Arc<PaymentService>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let request: PaymentRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            debug!(error = %e, "invalid payment request");
            return bad_request("invalid payment request body");
        }
    };

    if !request.is_valid() {
        debug!(correlation_id = %request.correlation_id, "rejected payment request");
        return bad_request("correlationId must be non-empty and amount must be positive");
    }

    match service.submit_payment(request).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "message": "Payment registered successfully" })),
        ),
        Err(QueueError::Full) => {
            warn!("intake queue is full");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "queue is full" })))
        }
        Err(e @ QueueError::Closed) => {
            error!(error = %e, "failed to submit payment");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() })))
        }
    }
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}
