//! Rating endpoints. One rating per user per event, score 1 to 5.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::rating::{score_in_range, Rating, RatingInput, RatingUpdateInput};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::message;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventRatings {
    average: Option<f64>,
    count: i64,
    ratings: Vec<Rating>,
}

#[derive(Debug, Deserialize)]
pub struct RatingListParams {
    pub event_id: Uuid,
}

/// `GET /ratings?event_id=...`.
pub async fn list_event_ratings(
    State(state): State<AppState>,
    Query(params): Query<RatingListParams>,
) -> Result<Json<impl Serialize>, AppError> {
    let ratings = sqlx::query_as::<_, Rating>(
        "SELECT id, event_id, user_id, score FROM ratings WHERE event_id = $1",
    )
    .bind(params.event_id)
    .fetch_all(&state.pool)
    .await?;

    let count = ratings.len() as i64;
    let average = if count > 0 {
        Some(ratings.iter().map(|r| r.score as f64).sum::<f64>() / count as f64)
    } else {
        None
    };

    Ok(Json(EventRatings {
        average,
        count,
        ratings,
    }))
}

/// `POST /ratings`.
pub async fn create_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<RatingInput>,
) -> Result<Response, AppError> {
    if user.is_banned {
        return Err(AppError::Forbidden("Vaš račun je blokiran".to_string()));
    }
    if !score_in_range(input.score) {
        return Err(AppError::Validation(
            "Ocena mora biti med 1 in 5".to_string(),
        ));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
        .bind(input.event_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Dogodek ne obstaja".to_string()));
    }

    let already_rated: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM ratings WHERE event_id = $1 AND user_id = $2)",
    )
    .bind(input.event_id)
    .bind(user.id)
    .fetch_one(&state.pool)
    .await?;
    if already_rated {
        return Err(AppError::Validation("Dogodek ste že ocenili".to_string()));
    }

    let rating = sqlx::query_as::<_, Rating>(
        "INSERT INTO ratings (event_id, user_id, score) VALUES ($1, $2, $3) \
         RETURNING id, event_id, user_id, score",
    )
    .bind(input.event_id)
    .bind(user.id)
    .bind(input.score)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(rating)).into_response())
}

/// `PUT /ratings/:id`, author only.
pub async fn update_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(rating_id): Path<Uuid>,
    Json(input): Json<RatingUpdateInput>,
) -> Result<Json<Rating>, AppError> {
    if !score_in_range(input.score) {
        return Err(AppError::Validation(
            "Ocena mora biti med 1 in 5".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Rating>(
        "UPDATE ratings SET score = $1 WHERE id = $2 AND user_id = $3 \
         RETURNING id, event_id, user_id, score",
    )
    .bind(input.score)
    .bind(rating_id)
    .bind(user.id)
    .fetch_optional(&state.pool)
    .await?;

    updated
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Ocena ne obstaja".to_string()))
}

/// `DELETE /ratings/:id`, author only.
pub async fn delete_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(rating_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let deleted = sqlx::query("DELETE FROM ratings WHERE id = $1 AND user_id = $2")
        .bind(rating_id)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound("Ocena ne obstaja".to_string()));
    }

    Ok(message("Ocena izbrisana"))
}
