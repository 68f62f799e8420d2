use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::services::{PaymentService, SummaryFilters};

pub async fn get_summary(
    State(service): State<Arc<PaymentService>>,
    Query(filters): Query<SummaryFilters>,
) -> Response {
    match service.get_summary(filters).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) if e.is_client_error() => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to build payments summary");
            let body = Json(json!({ "error": e.to_string() }));
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}
