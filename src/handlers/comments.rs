//! Comment endpoints. Writing requires a session and an unbanned account;
//! editing and removal are open to the author, the event's organizer and
//! administrators.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::comment::{Comment, CommentInput, CommentUpdateInput, CommentWithAuthor};
use crate::models::user::User;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::message;

fn ensure_not_banned(user: &User) -> Result<(), AppError> {
    if user.is_banned {
        return Err(AppError::Forbidden("Vaš račun je blokiran".to_string()));
    }
    Ok(())
}

/// Author, event organizer or administrator.
async fn can_moderate(state: &AppState, comment: &Comment, user: &User) -> Result<bool, AppError> {
    if comment.user_id == user.id || user.is_admin() {
        return Ok(true);
    }

    let organizes: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM events WHERE id = $1 AND organizer_id = $2)",
    )
    .bind(comment.event_id)
    .bind(user.id)
    .fetch_one(&state.pool)
    .await?;
    Ok(organizes)
}

#[derive(Debug, Deserialize)]
pub struct CommentListParams {
    pub event_id: Uuid,
}

/// `GET /comments?event_id=...`, newest first.
pub async fn list_event_comments(
    State(state): State<AppState>,
    Query(params): Query<CommentListParams>,
) -> Result<Json<Vec<CommentWithAuthor>>, AppError> {
    let event_id = params.event_id;
    let comments = sqlx::query_as::<_, CommentWithAuthor>(
        "SELECT c.id, c.event_id, c.user_id, c.body, c.created_at, \
                u.first_name AS author_first_name, u.last_name AS author_last_name, \
                u.image AS author_image \
         FROM comments c \
         JOIN users u ON u.id = c.user_id \
         WHERE c.event_id = $1 \
         ORDER BY c.created_at DESC",
    )
    .bind(event_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(comments))
}

/// `POST /comments`.
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CommentInput>,
) -> Result<Response, AppError> {
    ensure_not_banned(&user)?;
    if input.body.trim().is_empty() {
        return Err(AppError::Validation(
            "Komentar ne sme biti prazen".to_string(),
        ));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
        .bind(input.event_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Dogodek ne obstaja".to_string()));
    }

    let comment = sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (event_id, user_id, body) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(input.event_id)
    .bind(user.id)
    .bind(input.body.trim())
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

/// `PUT /comments/:id`.
pub async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<Uuid>,
    Json(input): Json<CommentUpdateInput>,
) -> Result<Json<Comment>, AppError> {
    if input.body.trim().is_empty() {
        return Err(AppError::Validation(
            "Komentar ne sme biti prazen".to_string(),
        ));
    }

    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Komentar ne obstaja".to_string()))?;

    if !can_moderate(&state, &comment, &user).await? {
        return Err(AppError::Forbidden(
            "Nimate pravic za urejanje tega komentarja".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Comment>(
        "UPDATE comments SET body = $1 WHERE id = $2 RETURNING *",
    )
    .bind(input.body.trim())
    .bind(comment_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(updated))
}

/// `DELETE /comments/:id`.
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Komentar ne obstaja".to_string()))?;

    if !can_moderate(&state, &comment, &user).await? {
        return Err(AppError::Forbidden(
            "Nimate pravic za brisanje tega komentarja".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&state.pool)
        .await?;

    Ok(message("Komentar izbrisan"))
}
