//! User endpoints: registration, login, profiles, administration,
//! favorite organizers and personal statistics.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::{self, Admin, CurrentUser};
use crate::models::user::{roles, LoginInput, PublicUser, RegisterInput, User, UserUpdateInput};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, message};

fn map_unique_email(err: sqlx::Error) -> AppError {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        AppError::Validation("E-pošta že obstaja".to_string())
    } else {
        AppError::Database(err)
    }
}

/// `POST /users/register`. New accounts default to the Visitor
/// role; the Administrator role can only be granted by an administrator.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Response, AppError> {
    if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
        return Err(AppError::Validation("Manjka ime ali priimek".to_string()));
    }
    if !input.email.contains('@') {
        return Err(AppError::Validation(
            "Neveljaven e-poštni naslov".to_string(),
        ));
    }
    if input.password.len() < 8 {
        return Err(AppError::Validation(
            "Geslo mora imeti vsaj 8 znakov".to_string(),
        ));
    }

    let role = match input.role.as_deref() {
        None => roles::VISITOR,
        Some(roles::ADMINISTRATOR) => {
            return Err(AppError::Forbidden(
                "Administratorske vloge ni mogoče izbrati".to_string(),
            ));
        }
        Some(role) if roles::is_valid(role) => role,
        Some(_) => return Err(AppError::Validation("Neveljavna vloga".to_string())),
    };

    let password_hash = auth::hash_password(&input.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (first_name, last_name, email, password_hash, role, birth_date, image) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(input.first_name.trim())
    .bind(input.last_name.trim())
    .bind(input.email.trim().to_lowercase())
    .bind(&password_hash)
    .bind(role)
    .bind(input.birth_date)
    .bind(&input.image)
    .fetch_one(&state.pool)
    .await
    .map_err(map_unique_email)?;

    let token = auth::issue_token(user.id, &user.role, &state.config.jwt_secret)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "token": token, "user": user })),
    )
        .into_response())
}

/// `POST /users/login`. The same message covers an unknown email and
/// a wrong password.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(input.email.trim().to_lowercase())
        .fetch_optional(&state.pool)
        .await?;

    let Some(user) = user else {
        return Err(AppError::Auth("Napačna e-pošta ali geslo".to_string()));
    };
    if !auth::verify_password(&input.password, &user.password_hash) {
        return Err(AppError::Auth("Napačna e-pošta ali geslo".to_string()));
    }

    let token = auth::issue_token(user.id, &user.role, &state.config.jwt_secret)?;
    Ok(Json(json!({ "token": token, "user": user })))
}

/// `GET /users/profile`.
pub async fn profile(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// `GET /users/:id/public`.
pub async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    sqlx::query_as::<_, PublicUser>(
        "SELECT id, first_name, last_name, email, role, image FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?
    .map(Json)
    .ok_or_else(|| AppError::NotFound("Uporabnik ne obstaja".to_string()))
}

/// `PUT /users/:id`, self or administrator. Role changes are
/// administrator-only.
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UserUpdateInput>,
) -> Result<Json<User>, AppError> {
    if actor.id != user_id && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "Nimate pravic za urejanje tega profila".to_string(),
        ));
    }

    if let Some(role) = input.role.as_deref() {
        if !roles::is_valid(role) {
            return Err(AppError::Validation("Neveljavna vloga".to_string()));
        }
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Vlogo lahko spremeni le administrator".to_string(),
            ));
        }
    }

    let password_hash = match input.password.as_deref() {
        Some(password) if password.len() < 8 => {
            return Err(AppError::Validation(
                "Geslo mora imeti vsaj 8 znakov".to_string(),
            ));
        }
        Some(password) => Some(auth::hash_password(password)?),
        None => None,
    };

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET \
           first_name = COALESCE($1, first_name), \
           last_name = COALESCE($2, last_name), \
           email = COALESCE($3, email), \
           password_hash = COALESCE($4, password_hash), \
           birth_date = COALESCE($5, birth_date), \
           role = COALESCE($6, role), \
           image = COALESCE($7, image), \
           updated_at = now() \
         WHERE id = $8 RETURNING *",
    )
    .bind(input.first_name.as_deref())
    .bind(input.last_name.as_deref())
    .bind(input.email.as_deref().map(|e| e.trim().to_lowercase()))
    .bind(password_hash.as_deref())
    .bind(input.birth_date)
    .bind(input.role.as_deref())
    .bind(input.image.as_deref())
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(map_unique_email)?;

    user.map(Json)
        .ok_or_else(|| AppError::NotFound("Uporabnik ne obstaja".to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl UserListParams {
    fn page_size(&self) -> i64 {
        match self.limit {
            Some(0) | None => 20,
            Some(n) => n as i64,
        }
    }

    fn offset(&self) -> i64 {
        let page = match self.page {
            Some(0) | None => 1,
            Some(n) => n,
        };
        (page as i64 - 1) * self.page_size()
    }
}

fn push_user_filters(qb: &mut QueryBuilder<'static, Postgres>, params: &UserListParams) {
    qb.push(" FROM users WHERE TRUE");

    if let Some(search) = params.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (first_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR last_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR email ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }

    if let Some(role) = params.role.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND role = ");
        qb.push_bind(role.to_string());
    }
}

#[derive(Serialize)]
struct PagedUsers {
    users: Vec<User>,
    total: i64,
}

/// `GET /users`, administrators only.
pub async fn list_users(
    State(state): State<AppState>,
    Admin(_): Admin,
    Query(params): Query<UserListParams>,
) -> Result<Json<impl Serialize>, AppError> {
    let mut qb = QueryBuilder::new("SELECT *");
    push_user_filters(&mut qb, &params);
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(params.page_size());
    qb.push(" OFFSET ");
    qb.push_bind(params.offset());

    let users = qb.build_query_as::<User>().fetch_all(&state.pool).await?;

    let mut count = QueryBuilder::new("SELECT COUNT(*)");
    push_user_filters(&mut count, &params);
    let total: i64 = count.build_query_scalar().fetch_one(&state.pool).await?;

    Ok(Json(PagedUsers { users, total }))
}

/// `PUT /users/ban/:id`, administrators only. Toggles the flag;
/// administrators themselves cannot be banned.
pub async fn ban_user(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(user_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Uporabnik ne obstaja".to_string()))?;

    if target.is_admin() {
        return Err(AppError::Forbidden(
            "Administratorja ni mogoče blokirati".to_string(),
        ));
    }

    let banned: bool =
        sqlx::query_scalar("UPDATE users SET is_banned = NOT is_banned WHERE id = $1 RETURNING is_banned")
            .bind(user_id)
            .fetch_one(&state.pool)
            .await?;

    Ok(message(if banned {
        "Uporabnik blokiran"
    } else {
        "Blokada odstranjena"
    }))
}

/// `DELETE /users/:id`, administrators only. Organizers with events and
/// other administrators cannot be deleted.
pub async fn delete_user(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(user_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Uporabnik ne obstaja".to_string()))?;

    if target.is_admin() {
        return Err(AppError::Forbidden(
            "Administratorja ni mogoče izbrisati".to_string(),
        ));
    }

    let event_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE organizer_id = $1")
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;
    if event_count > 0 {
        return Err(AppError::Forbidden(
            "Organizatorja z dogodki ni mogoče izbrisati".to_string(),
        ));
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&state.pool)
        .await?;

    Ok(message("Uporabnik izbrisan"))
}

/// `POST /users/favorite_organizer/:id`. Only users with organizer rights
/// can be followed.
pub async fn favorite_organizer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(organizer_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(organizer_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Uporabnik ne obstaja".to_string()))?;

    if !target.is_organizer() {
        return Err(AppError::Validation(
            "Uporabnik ni organizator".to_string(),
        ));
    }

    let inserted = sqlx::query(
        "INSERT INTO favorite_organizers (organizer_id, user_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(organizer_id)
    .bind(user.id)
    .execute(&state.pool)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::Validation(
            "Organizator je že med priljubljenimi".to_string(),
        ));
    }

    Ok(created("Organizator dodan med priljubljene"))
}

/// `DELETE /users/favorite_organizer/:id`.
pub async fn unfavorite_organizer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(organizer_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let deleted =
        sqlx::query("DELETE FROM favorite_organizers WHERE organizer_id = $1 AND user_id = $2")
            .bind(organizer_id)
            .bind(user.id)
            .execute(&state.pool)
            .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Organizator ni med priljubljenimi".to_string(),
        ));
    }

    Ok(message("Organizator odstranjen iz priljubljenih"))
}

/// `GET /users/favorites/organizers`.
pub async fn favorite_organizers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    favorite_organizers_of(&state, user.id).await
}

/// `GET /users/:id/public/favorites/organizers`, shown on public profiles.
pub async fn public_favorite_organizers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    favorite_organizers_of(&state, user_id).await
}

async fn favorite_organizers_of(
    state: &AppState,
    user_id: Uuid,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let organizers = sqlx::query_as::<_, PublicUser>(
        "SELECT u.id, u.first_name, u.last_name, u.email, u.role, u.image \
         FROM favorite_organizers fo \
         JOIN users u ON u.id = fo.organizer_id \
         WHERE fo.user_id = $1 \
         ORDER BY u.last_name, u.first_name",
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(organizers))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub name: String,
    pub count: i64,
    pub percentage: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEvent {
    pub id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub days_ago: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserStatistics {
    attended_events: i64,
    comments_written: i64,
    ratings_given: i64,
    categories: Vec<CategoryShare>,
    recent_events: Vec<RecentEvent>,
}

/// Percentage split of attended events across categories, whole percents.
fn category_shares(counts: Vec<(String, i64)>, total: i64) -> Vec<CategoryShare> {
    if total == 0 {
        return Vec::new();
    }
    counts
        .into_iter()
        .map(|(name, count)| CategoryShare {
            name,
            count,
            percentage: (count * 100 + total / 2) / total,
        })
        .collect()
}

/// `GET /users/statistics/:id`, the user's activity overview. Self or
/// administrator.
pub async fn user_statistics(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<impl Serialize>, AppError> {
    if actor.id != user_id && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "Nimate pravic za vpogled v to statistiko".to_string(),
        ));
    }

    let now = Utc::now();

    let attended_events: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM registrations r \
         JOIN events e ON e.id = r.event_id \
         WHERE r.user_id = $1 AND e.start_time < $2",
    )
    .bind(user_id)
    .bind(now)
    .fetch_one(&state.pool)
    .await?;

    let comments_written: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&state.pool)
            .await?;

    let ratings_given: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ratings WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;

    let counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT t.name, COUNT(*) FROM registrations r \
         JOIN events e ON e.id = r.event_id \
         JOIN event_types t ON t.id = e.event_type_id \
         WHERE r.user_id = $1 AND e.start_time < $2 \
         GROUP BY t.name ORDER BY COUNT(*) DESC",
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(&state.pool)
    .await?;

    let recent: Vec<(Uuid, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT e.id, e.title, e.start_time FROM registrations r \
         JOIN events e ON e.id = r.event_id \
         WHERE r.user_id = $1 AND e.start_time < $2 \
         ORDER BY e.start_time DESC LIMIT 5",
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(&state.pool)
    .await?;

    let recent_events = recent
        .into_iter()
        .map(|(id, title, start_time)| RecentEvent {
            id,
            title,
            start_time,
            days_ago: (now - start_time).num_days(),
        })
        .collect();

    Ok(Json(UserStatistics {
        attended_events,
        comments_written,
        ratings_given,
        categories: category_shares(counts, attended_events),
        recent_events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_sum_to_roughly_one_hundred() {
        let shares = category_shares(
            vec![("Koncert".into(), 2), ("Šport".into(), 1)],
            3,
        );
        assert_eq!(shares[0].percentage, 67);
        assert_eq!(shares[1].percentage, 33);
    }

    #[test]
    fn no_attendance_means_no_categories() {
        assert!(category_shares(vec![], 0).is_empty());
        assert!(category_shares(vec![("Koncert".into(), 0)], 0).is_empty());
    }

    #[test]
    fn user_list_pagination_defaults() {
        let params = UserListParams::default();
        assert_eq!(params.page_size(), 20);
        assert_eq!(params.offset(), 0);

        let params = UserListParams {
            page: Some(4),
            limit: Some(25),
            ..Default::default()
        };
        assert_eq!(params.offset(), 75);
    }

    #[test]
    fn user_filters_search_all_name_columns() {
        let params = UserListParams {
            search: Some("novak".into()),
            role: Some("Organizer".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*)");
        push_user_filters(&mut qb, &params);
        let sql = qb.sql().to_string();
        assert!(sql.contains("first_name ILIKE"));
        assert!(sql.contains("last_name ILIKE"));
        assert!(sql.contains("email ILIKE"));
        assert!(sql.contains("role = "));
    }
}
