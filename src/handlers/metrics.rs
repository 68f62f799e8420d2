use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::services::payment_service::ServiceStatus;
use crate::services::PaymentService;

pub async fn get_metrics(State(service): State<Arc<PaymentService>>) -> Json<ServiceStatus> {
    Json(service.status())
}
