use axum::response::Response;

use crate::utils::response::message;

pub mod comments;
pub mod email;
pub mod events;
pub mod ratings;
pub mod registrations;
pub mod stats;
pub mod users;

pub async fn health_check() -> Response {
    message("OK")
}
