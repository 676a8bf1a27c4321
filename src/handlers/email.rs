//! Contact form and the manual reminder trigger.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Admin;
use crate::services::reminders;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::message;

#[derive(Debug, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// `POST /email/contact`. Forwards the visitor's message to the site inbox.
pub async fn contact(
    State(state): State<AppState>,
    Json(input): Json<ContactInput>,
) -> Result<axum::response::Response, AppError> {
    if input.name.trim().is_empty() || input.message.trim().is_empty() {
        return Err(AppError::Validation("Vsa polja so obvezna".to_string()));
    }
    if !input.email.contains('@') {
        return Err(AppError::Validation(
            "Neveljaven e-poštni naslov".to_string(),
        ));
    }

    let Some(email) = state.email.as_ref() else {
        return Err(AppError::ExternalService(
            "Email sending is not configured".to_string(),
        ));
    };

    let subject = format!("Kontaktni obrazec: {}", input.name.trim());
    let body = format!(
        "Sporočilo s kontaktnega obrazca.\n\nIme: {}\nE-pošta: {}\n\n{}",
        input.name.trim(),
        input.email.trim(),
        input.message.trim(),
    );
    email
        .send(&state.config.contact_email, &subject, body)
        .await?;

    Ok(message("Sporočilo poslano"))
}

/// `POST /email/send-reminders`, administrators only. Runs the reminder pass
/// on demand, mostly useful for verifying the SMTP setup.
pub async fn trigger_reminders(
    State(state): State<AppState>,
    Admin(_): Admin,
) -> Result<Json<serde_json::Value>, AppError> {
    let sent = reminders::send_event_reminders(&state).await?;
    Ok(Json(json!({ "sent": sent })))
}
