//! Registration endpoints: signing up for an event and withdrawing again.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::registration::RegistrationInput;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, message};

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationWithEvent {
    pub id: Uuid,
    pub event_id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// `POST /registrations`.
pub async fn create_registration(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<RegistrationInput>,
) -> Result<Response, AppError> {
    if user.is_banned {
        return Err(AppError::Forbidden("Vaš račun je blokiran".to_string()));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
        .bind(input.event_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Dogodek ne obstaja".to_string()));
    }

    let inserted = sqlx::query(
        "INSERT INTO registrations (event_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(input.event_id)
    .bind(user.id)
    .execute(&state.pool)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::Validation(
            "Na dogodek ste že prijavljeni".to_string(),
        ));
    }

    Ok(created("Prijava uspešna"))
}

/// `GET /registrations/user`, the current user's registrations with event
/// basics.
pub async fn my_registrations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<RegistrationWithEvent>>, AppError> {
    let registrations = sqlx::query_as::<_, RegistrationWithEvent>(
        "SELECT r.id, r.event_id, e.title, e.start_time, r.created_at \
         FROM registrations r \
         JOIN events e ON e.id = r.event_id \
         WHERE r.user_id = $1 \
         ORDER BY e.start_time",
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(registrations))
}

/// `DELETE /registrations/:eventId`, keyed by event rather than registration
/// id so the frontend does not need to track the row id.
pub async fn delete_registration(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let deleted = sqlx::query("DELETE FROM registrations WHERE event_id = $1 AND user_id = $2")
        .bind(event_id)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound("Prijava ne obstaja".to_string()));
    }

    Ok(message("Odjava uspešna"))
}
