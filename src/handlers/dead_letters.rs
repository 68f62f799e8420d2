use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::queue::DeadLetter;
use crate::services::PaymentService;

pub async fn list_dead_letters(
    State(service): State<Arc<PaymentService>>,
) -> Json<Vec<DeadLetter>> {
    Json(service.dead_letters())
}
