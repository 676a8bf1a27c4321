//! Public site statistics for the landing page.

use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteStatistics {
    total_users: i64,
    organizers_count: i64,
    events_last_year: i64,
    cities: i64,
}

/// `GET /statistics`.
pub async fn site_statistics(
    State(state): State<AppState>,
) -> Result<Json<impl Serialize>, AppError> {
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;

    let organizers_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'Organizer'")
            .fetch_one(&state.pool)
            .await?;

    let year_ago = Utc::now() - Duration::days(365);
    let events_last_year: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE start_time >= $1")
            .bind(year_ago)
            .fetch_one(&state.pool)
            .await?;

    let cities: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT a.municipality) FROM events e JOIN addresses a ON a.id = e.address_id",
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(SiteStatistics {
        total_users,
        organizers_count,
        events_last_year,
        cities,
    }))
}
