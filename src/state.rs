use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::email::EmailService;

/// Shared per-request state. Everything here is cheap to clone; there is no
/// in-process mutable state, requests only share the pool and collaborators.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub email: Option<Arc<EmailService>>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let email = config
            .smtp
            .as_ref()
            .and_then(|smtp| match EmailService::new(smtp) {
                Ok(service) => Some(Arc::new(service)),
                Err(e) => {
                    tracing::warn!(error = %e, "SMTP misconfigured, email sending disabled");
                    None
                }
            });

        Self {
            pool,
            config: Arc::new(config),
            http: reqwest::Client::new(),
            email,
        }
    }
}
