use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role strings stored in `users.role`.
pub mod roles {
    pub const VISITOR: &str = "Visitor";
    pub const ORGANIZER: &str = "Organizer";
    pub const ADMINISTRATOR: &str = "Administrator";

    pub fn is_valid(role: &str) -> bool {
        role == VISITOR || role == ORGANIZER || role == ADMINISTRATOR
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_banned: bool,
    pub birth_date: Option<NaiveDate>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == roles::ADMINISTRATOR
    }

    /// Administrators hold organizer rights as well.
    pub fn is_organizer(&self) -> bool {
        self.role == roles::ORGANIZER || self.role == roles::ADMINISTRATOR
    }
}

/// Profile shape safe for unauthenticated callers.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub birth_date: Option<NaiveDate>,
    pub role: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub role: Option<String>,
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Ana".into(),
            last_name: "Novak".into(),
            email: "ana@example.com".into(),
            password_hash: "$argon2id$stub".into(),
            role: role.into(),
            is_banned: false,
            birth_date: None,
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn admin_counts_as_organizer() {
        assert!(sample_user(roles::ADMINISTRATOR).is_organizer());
        assert!(sample_user(roles::ORGANIZER).is_organizer());
        assert!(!sample_user(roles::VISITOR).is_organizer());
    }

    #[test]
    fn password_hash_never_serialized() {
        let json = serde_json::to_string(&sample_user(roles::VISITOR)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("passwordHash"));
        assert!(json.contains("\"firstName\":\"Ana\""));
    }
}
