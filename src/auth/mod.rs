//! Token-based authentication and role guards.
//!
//! Every request resolves an [`AuthContext`] exactly once: either
//! `Anonymous` or `Authenticated` with the freshly loaded user row. A
//! missing, expired or otherwise invalid token degrades to `Anonymous`
//! rather than failing the request; endpoints that require a session use
//! the [`CurrentUser`], [`Organizer`] or [`Admin`] extractors instead.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::models::user::User;
use crate::state::AppState;
use crate::utils::error::AppError;

const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: u64,
}

pub fn issue_token(user_id: Uuid, role: &str, secret: &str) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as u64;
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to issue token: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Auth("Neveljaven žeton".to_string()))
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn lookup_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = bearer_token(headers)?;
    let claims = verify_token(token, &state.config.jwt_secret).ok()?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.pool)
        .await
        .ok()
        .flatten()
}

/// Resolved once per request; `Anonymous` is a valid outcome for public
/// endpoints such as the event listing.
pub enum AuthContext {
    Anonymous,
    Authenticated(User),
}

impl AuthContext {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthContext::Anonymous => None,
            AuthContext::Authenticated(user) => Some(user),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user().map(|u| u.id)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        match lookup_user(&state, &parts.headers).await {
            Some(user) => Ok(AuthContext::Authenticated(user)),
            None => Ok(AuthContext::Anonymous),
        }
    }
}

/// Requires a valid session; rejects with 401 otherwise.
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        lookup_user(&state, &parts.headers)
            .await
            .map(CurrentUser)
            .ok_or_else(|| AppError::Auth("Dostop zavrnjen".to_string()))
    }
}

/// Requires the Organizer or Administrator role.
pub struct Organizer(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Organizer
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_organizer() {
            return Err(AppError::Forbidden(
                "Zahtevane so organizatorske pravice".to_string(),
            ));
        }
        Ok(Organizer(user))
    }
}

/// Requires the Administrator role.
pub struct Admin(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Admin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden(
                "Zahtevane so administratorske pravice".to_string(),
            ));
        }
        Ok(Admin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_round_trip() {
        let id = Uuid::new_v4();
        let token = issue_token(id, "Organizer", "test-secret").unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, "Organizer");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), "Visitor", "secret-a").unwrap();
        assert!(verify_token(&token, "secret-b").is_err());
    }

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.remove(AUTHORIZATION);
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("ultra tajno geslo").unwrap();
        assert!(verify_password("ultra tajno geslo", &hash));
        assert!(!verify_password("napačno geslo", &hash));
        assert!(!verify_password("karkoli", "not-a-phc-string"));
    }
}
