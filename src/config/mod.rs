use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub geocoding_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub contact_email: String,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/skupajtukaj".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            geocoding_api_key: env::var("GEOCODING_API_KEY").ok(),
            weather_api_key: env::var("WEATHER_API_KEY").ok(),
            smtp: SmtpConfig::from_env(),
            contact_email: env::var("CONTACT_EMAIL")
                .unwrap_or_else(|_| "skupaj.tukaj@gmail.com".to_string()),
        }
    }
}

impl SmtpConfig {
    /// All SMTP settings must be present; otherwise email sending is disabled.
    fn from_env() -> Option<Self> {
        let host = env::var("SMTP_HOST").ok()?;
        let username = env::var("SMTP_USERNAME").ok()?;
        let password = env::var("SMTP_PASSWORD").ok()?;
        let port = env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        let from_email =
            env::var("SMTP_FROM").unwrap_or_else(|_| "skupaj.tukaj@gmail.com".to_string());

        Some(Self {
            host,
            port,
            username,
            password,
            from_email,
        })
    }
}
