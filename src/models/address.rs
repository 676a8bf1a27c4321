use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub municipality: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Address components supplied when creating or updating an event.
/// Addresses are deduplicated by exact match on these four fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub municipality: String,
}

impl AddressInput {
    /// Free-text form handed to the geocoder.
    pub fn to_query_string(&self) -> String {
        format!(
            "{} {}, {} {}, Slovenia",
            self.street, self.house_number, self.postal_code, self.municipality
        )
    }

    pub fn is_complete(&self) -> bool {
        !self.street.trim().is_empty()
            && !self.house_number.trim().is_empty()
            && !self.postal_code.trim().is_empty()
            && !self.municipality.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_includes_country() {
        let input = AddressInput {
            street: "Slovenska cesta".into(),
            house_number: "1".into(),
            postal_code: "1000".into(),
            municipality: "Ljubljana".into(),
        };
        assert_eq!(
            input.to_query_string(),
            "Slovenska cesta 1, 1000 Ljubljana, Slovenia"
        );
    }

    #[test]
    fn blank_component_fails_completeness() {
        let input = AddressInput {
            street: "  ".into(),
            house_number: "1".into(),
            postal_code: "1000".into(),
            municipality: "Ljubljana".into(),
        };
        assert!(!input.is_complete());
    }
}
