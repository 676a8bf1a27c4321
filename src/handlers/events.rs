//! Event endpoints: discovery, detail, lifecycle and favorites.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::auth::{AuthContext, CurrentUser, Organizer};
use crate::models::address::{Address, AddressInput};
use crate::models::event::{EventDetailJson, EventInput, EventJson};
use crate::models::event_type::EventType;
use crate::query::events::{self as event_query, EventFilters};
use crate::services::{geocode, pricing, weather};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, message};

#[derive(Serialize)]
struct PagedEvents {
    items: Vec<EventJson>,
    total: i64,
}

/// `GET /events`. Without a `page` parameter the response is a bare array;
/// with one it carries the page plus the total match count.
pub async fn list_events(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filters): Query<EventFilters>,
) -> Result<Response, AppError> {
    let page = event_query::search(&state.pool, &filters, auth.user_id(), Utc::now()).await?;
    let items: Vec<EventJson> = page.items.into_iter().map(EventJson::from).collect();

    Ok(match page.total {
        Some(total) => Json(PagedEvents { items, total }).into_response(),
        None => Json(items).into_response(),
    })
}

/// `GET /events/:id`. A missing event responds with a JSON `null` body, not
/// a 404; the frontend treats both the same way.
pub async fn get_event(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(row) = event_query::fetch_by_id(&state.pool, event_id, Utc::now()).await? else {
        return Ok(Json(serde_json::Value::Null).into_response());
    };

    let (is_favorite, organizer_is_favorite) = match auth.user_id() {
        Some(viewer) => {
            let is_favorite: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM favorite_events WHERE event_id = $1 AND user_id = $2)",
            )
            .bind(event_id)
            .bind(viewer)
            .fetch_one(&state.pool)
            .await?;

            let organizer_is_favorite: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM favorite_organizers WHERE organizer_id = $1 AND user_id = $2)",
            )
            .bind(row.organizer_id)
            .bind(viewer)
            .fetch_one(&state.pool)
            .await?;

            (is_favorite, organizer_is_favorite)
        }
        None => (false, false),
    };

    Ok(Json(EventDetailJson {
        event: EventJson::from(row),
        is_favorite,
        organizer_is_favorite,
    })
    .into_response())
}

/// `GET /events/mine`, the organizer's own events.
pub async fn my_events(
    State(state): State<AppState>,
    Organizer(user): Organizer,
) -> Result<Json<Vec<EventJson>>, AppError> {
    organizer_events(&state, user.id).await
}

/// `GET /users/:id/events`, self or administrator.
pub async fn user_events(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(organizer_id): Path<Uuid>,
) -> Result<Json<Vec<EventJson>>, AppError> {
    if actor.id != organizer_id && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "Nimate pravic za vpogled v te dogodke".to_string(),
        ));
    }
    organizer_events(&state, organizer_id).await
}

async fn organizer_events(
    state: &AppState,
    organizer_id: Uuid,
) -> Result<Json<Vec<EventJson>>, AppError> {
    let filters = EventFilters {
        organizer: Some(organizer_id),
        ..Default::default()
    };
    let page = event_query::search(&state.pool, &filters, None, Utc::now()).await?;
    Ok(Json(page.items.into_iter().map(EventJson::from).collect()))
}

/// A row saved while the geocoder was down (or the key unset) has no
/// coordinates and would never match a radius search.
fn needs_coordinates(lat: Option<f64>, lon: Option<f64>) -> bool {
    lat.is_none() || lon.is_none()
}

/// Best-effort coordinate lookup; failures are logged and treated as
/// "no coordinates".
async fn lookup_coordinates(
    state: &AppState,
    input: &AddressInput,
) -> Option<geocode::Coordinates> {
    let key = state.config.geocoding_api_key.as_deref()?;
    match geocode::geocode_address(&state.http, key, &input.to_query_string()).await {
        Ok(coordinates) => coordinates,
        Err(e) => {
            warn!(error = %e, "Geocoding failed, leaving address without coordinates");
            None
        }
    }
}

/// Resolve the address row for an event payload, creating it on first use.
/// An existing row that is still missing coordinates gets another geocoding
/// attempt, so an earlier failed lookup is not permanent.
async fn resolve_address(state: &AppState, input: &AddressInput) -> Result<Uuid, AppError> {
    let existing = sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses \
         WHERE street = $1 AND house_number = $2 AND postal_code = $3 AND municipality = $4",
    )
    .bind(&input.street)
    .bind(&input.house_number)
    .bind(&input.postal_code)
    .bind(&input.municipality)
    .fetch_optional(&state.pool)
    .await?;

    if let Some(address) = existing {
        if needs_coordinates(address.lat, address.lon) {
            if let Some(coordinates) = lookup_coordinates(state, input).await {
                sqlx::query("UPDATE addresses SET lat = $1, lon = $2 WHERE id = $3")
                    .bind(coordinates.lat)
                    .bind(coordinates.lon)
                    .bind(address.id)
                    .execute(&state.pool)
                    .await?;
            }
        }
        return Ok(address.id);
    }

    let coordinates = lookup_coordinates(state, input).await;

    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO addresses (street, house_number, postal_code, municipality, lat, lon) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(&input.street)
    .bind(&input.house_number)
    .bind(&input.postal_code)
    .bind(&input.municipality)
    .bind(coordinates.map(|c| c.lat))
    .bind(coordinates.map(|c| c.lon))
    .fetch_one(&state.pool)
    .await?;

    Ok(id)
}

async fn ensure_event_type(state: &AppState, event_type_id: Uuid) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM event_types WHERE id = $1)")
        .bind(event_type_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(AppError::Validation("Neveljavna vrsta dogodka".to_string()));
    }
    Ok(())
}

/// `POST /events`, organizers only.
pub async fn create_event(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(input): Json<EventInput>,
) -> Result<Response, AppError> {
    input.validate().map_err(AppError::Validation)?;
    ensure_event_type(&state, input.event_type_id).await?;
    let address_id = resolve_address(&state, &input.address).await?;

    let event_id: Uuid = sqlx::query_scalar(
        "INSERT INTO events \
         (organizer_id, address_id, event_type_id, title, description, start_time, promoted, image, ticket_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(user.id)
    .bind(address_id)
    .bind(input.event_type_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.start_time)
    .bind(input.promoted)
    .bind(&input.image)
    .bind(&input.ticket_url)
    .fetch_one(&state.pool)
    .await?;

    pricing::change_price(&state.pool, event_id, input.price, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": event_id, "message": "Dogodek uspešno ustvarjen" })),
    )
        .into_response())
}

async fn ensure_event_owner(
    state: &AppState,
    event_id: Uuid,
    user: &crate::models::user::User,
) -> Result<(), AppError> {
    let organizer_id: Option<Uuid> =
        sqlx::query_scalar("SELECT organizer_id FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&state.pool)
            .await?;

    let Some(organizer_id) = organizer_id else {
        return Err(AppError::NotFound("Dogodek ne obstaja".to_string()));
    };
    if organizer_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Nimate pravic za urejanje tega dogodka".to_string(),
        ));
    }
    Ok(())
}

/// `PUT /events/:id`, owner or administrator.
pub async fn update_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(input): Json<EventInput>,
) -> Result<Response, AppError> {
    input.validate().map_err(AppError::Validation)?;
    ensure_event_owner(&state, event_id, &user).await?;
    ensure_event_type(&state, input.event_type_id).await?;
    let address_id = resolve_address(&state, &input.address).await?;

    sqlx::query(
        "UPDATE events SET address_id = $1, event_type_id = $2, title = $3, description = $4, \
         start_time = $5, promoted = $6, image = $7, ticket_url = $8, updated_at = now() \
         WHERE id = $9",
    )
    .bind(address_id)
    .bind(input.event_type_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.start_time)
    .bind(input.promoted)
    .bind(&input.image)
    .bind(&input.ticket_url)
    .bind(event_id)
    .execute(&state.pool)
    .await?;

    pricing::change_price(&state.pool, event_id, input.price, Utc::now()).await?;

    Ok(message("Dogodek uspešno posodobljen"))
}

/// `DELETE /events/:id`, owner or administrator. Price history, comments,
/// ratings, registrations and favorites go with it.
pub async fn delete_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    ensure_event_owner(&state, event_id, &user).await?;

    sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(event_id)
        .execute(&state.pool)
        .await?;

    Ok(message("Dogodek izbrisan"))
}

/// `POST /events/:id/favorite`.
pub async fn favorite_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
        .bind(event_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Dogodek ne obstaja".to_string()));
    }

    let inserted = sqlx::query(
        "INSERT INTO favorite_events (event_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(event_id)
    .bind(user.id)
    .execute(&state.pool)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::Validation(
            "Dogodek je že med priljubljenimi".to_string(),
        ));
    }

    Ok(created("Dogodek dodan med priljubljene"))
}

/// `DELETE /events/:id/favorite`.
pub async fn unfavorite_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let deleted = sqlx::query("DELETE FROM favorite_events WHERE event_id = $1 AND user_id = $2")
        .bind(event_id)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Dogodek ni med priljubljenimi".to_string(),
        ));
    }

    Ok(message("Dogodek odstranjen iz priljubljenih"))
}

/// `GET /events/:id/weather`. Best-effort: missing coordinates, a missing
/// API key or an event outside the forecast horizon all yield `null`.
pub async fn event_weather(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(row) = event_query::fetch_by_id(&state.pool, event_id, Utc::now()).await? else {
        return Err(AppError::NotFound("Dogodek ne obstaja".to_string()));
    };

    let message = match (state.config.weather_api_key.as_deref(), row.lat, row.lon) {
        (Some(key), Some(lat), Some(lon)) => {
            match weather::event_advisory(&state.http, key, lat, lon, row.start_time, Utc::now())
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Weather lookup failed");
                    None
                }
            }
        }
        _ => None,
    };

    Ok(Json(json!({ "message": message })))
}

/// `GET /events/geocode/:location`, free-text lookup for the address picker.
pub async fn geocode_location(
    State(state): State<AppState>,
    Path(location): Path<String>,
) -> Result<Json<Option<geocode::Coordinates>>, AppError> {
    let Some(key) = state.config.geocoding_api_key.as_deref() else {
        return Err(AppError::ExternalService(
            "Geocoding API key not configured".to_string(),
        ));
    };

    let coordinates = geocode::geocode_address(&state.http, key, &location).await?;
    Ok(Json(coordinates))
}

/// `GET /events/favorites/user`, the current user's favorites.
pub async fn user_favorite_events(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<EventJson>>, AppError> {
    favorite_events_of(&state, user.id).await
}

/// `GET /events/public/favorites/:userId`, anyone's favorites as shown on a
/// public profile.
pub async fn public_favorite_events(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<EventJson>>, AppError> {
    favorite_events_of(&state, user_id).await
}

async fn favorite_events_of(
    state: &AppState,
    user_id: Uuid,
) -> Result<Json<Vec<EventJson>>, AppError> {
    let filters = EventFilters {
        priljubljeni_dogodki: Some(true),
        ..Default::default()
    };
    let page = event_query::search(&state.pool, &filters, Some(user_id), Utc::now()).await?;
    Ok(Json(page.items.into_iter().map(EventJson::from).collect()))
}

/// `GET /event_types`.
pub async fn list_event_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventType>>, AppError> {
    let types = sqlx::query_as::<_, EventType>("SELECT id, name FROM event_types ORDER BY name")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(types))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A stored address keeps getting geocoding attempts until both
    /// coordinates are filled in; a complete pair is left alone.
    #[test]
    fn coordinate_backfill_triggers_only_while_missing() {
        assert!(needs_coordinates(None, None));
        assert!(needs_coordinates(Some(46.05), None));
        assert!(needs_coordinates(None, Some(14.51)));
        assert!(!needs_coordinates(Some(46.05), Some(14.51)));
    }
}
