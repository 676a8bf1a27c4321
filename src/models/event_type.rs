use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Fixed lookup used for filtering and badge display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventType {
    pub id: Uuid,
    pub name: String,
}
