use axum::http::StatusCode;

pub mod dead_letters;
pub mod metrics;
pub mod payments;
pub mod payments_summary;

pub async fn health() -> StatusCode {
    StatusCode::OK
}
