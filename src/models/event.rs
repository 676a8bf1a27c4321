use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::address::AddressInput;

/// One row of the listing query: the event joined with its address, type,
/// organizer and currently valid price. Column aliases match the SELECT list
/// in `query::events`.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub promoted: bool,
    pub image: Option<String>,
    pub ticket_url: Option<String>,
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub municipality: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub event_type_id: Uuid,
    pub event_type_name: String,
    pub organizer_id: Uuid,
    pub organizer_first_name: String,
    pub organizer_last_name: String,
    pub current_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressJson {
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub municipality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventTypeJson {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerJson {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

/// Wire shape of a listed event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventJson {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub promoted: bool,
    pub image: Option<String>,
    pub ticket_url: Option<String>,
    pub address: AddressJson,
    pub event_type: EventTypeJson,
    pub organizer: OrganizerJson,
    pub current_price: Option<Decimal>,
}

impl From<EventRow> for EventJson {
    fn from(row: EventRow) -> Self {
        EventJson {
            id: row.id,
            title: row.title,
            description: row.description,
            start_time: row.start_time,
            promoted: row.promoted,
            image: row.image,
            ticket_url: row.ticket_url,
            address: AddressJson {
                street: row.street,
                house_number: row.house_number,
                postal_code: row.postal_code,
                municipality: row.municipality,
                lat: row.lat,
                lon: row.lon,
            },
            event_type: EventTypeJson {
                id: row.event_type_id,
                name: row.event_type_name,
            },
            organizer: OrganizerJson {
                id: row.organizer_id,
                first_name: row.organizer_first_name,
                last_name: row.organizer_last_name,
            },
            current_price: row.current_price,
        }
    }
}

/// Event detail with favorite flags for the requesting user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetailJson {
    #[serde(flatten)]
    pub event: EventJson,
    pub is_favorite: bool,
    pub organizer_is_favorite: bool,
}

/// Payload for creating or updating an event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub address: AddressInput,
    pub event_type_id: Uuid,
    pub price: Decimal,
    #[serde(default)]
    pub promoted: bool,
    pub image: Option<String>,
    pub ticket_url: Option<String>,
}

impl EventInput {
    /// Title, description and a complete address are required.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Manjka naziv dogodka".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("Manjka opis dogodka".to_string());
        }
        if !self.address.is_complete() {
            return Err("Nepopoln naslov".to_string());
        }
        if self.price < Decimal::ZERO {
            return Err("Cena ne sme biti negativna".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> EventRow {
        EventRow {
            id: Uuid::new_v4(),
            title: "Koncert na prostem".into(),
            description: "Večer glasbe".into(),
            start_time: Utc::now(),
            promoted: false,
            image: None,
            ticket_url: None,
            street: "Trg Leona Štuklja".into(),
            house_number: "1".into(),
            postal_code: "2000".into(),
            municipality: "Maribor".into(),
            lat: Some(46.5547),
            lon: Some(15.6459),
            event_type_id: Uuid::new_v4(),
            event_type_name: "Koncert".into(),
            organizer_id: Uuid::new_v4(),
            organizer_first_name: "Ana".into(),
            organizer_last_name: "Novak".into(),
            current_price: None,
        }
    }

    #[test]
    fn event_json_uses_camel_case_and_null_price() {
        let json = serde_json::to_value(EventJson::from(sample_row())).unwrap();
        assert_eq!(json["currentPrice"], serde_json::Value::Null);
        assert_eq!(json["address"]["houseNumber"], "1");
        assert_eq!(json["eventType"]["name"], "Koncert");
        assert_eq!(json["organizer"]["firstName"], "Ana");
    }

    #[test]
    fn missing_coordinates_are_omitted() {
        let mut row = sample_row();
        row.lat = None;
        row.lon = None;
        let json = serde_json::to_value(EventJson::from(row)).unwrap();
        assert!(json["address"].get("lat").is_none());
    }

    #[test]
    fn negative_price_rejected() {
        let input = EventInput {
            title: "Dogodek".into(),
            description: "Opis".into(),
            start_time: Utc::now(),
            address: AddressInput {
                street: "Ulica".into(),
                house_number: "2".into(),
                postal_code: "1000".into(),
                municipality: "Ljubljana".into(),
            },
            event_type_id: Uuid::new_v4(),
            price: Decimal::from(-1),
            promoted: false,
            image: None,
            ticket_url: None,
        };
        assert!(input.validate().is_err());
    }
}
