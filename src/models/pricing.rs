use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A time-bounded price record. At most one row per event has
/// `valid_to = NULL`; that row is the event's current price.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PricingWindow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub price: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}
