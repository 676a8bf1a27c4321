use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Plain `{ "message": ... }` acknowledgement used by write endpoints.
pub fn message(text: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(MessageBody {
            message: text.into(),
        }),
    )
        .into_response()
}

pub fn created(text: impl Into<String>) -> Response {
    (
        StatusCode::CREATED,
        Json(MessageBody {
            message: text.into(),
        }),
    )
        .into_response()
}

pub fn error(code: &str, message: impl Into<String>, status: StatusCode) -> Response {
    let body = ApiErrorResponse {
        error: ApiErrorBody {
            code: code.to_string(),
            message: message.into(),
        },
    };

    (status, Json(body)).into_response()
}
