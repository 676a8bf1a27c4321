//! Address geocoding through the Google Geocoding API.
//!
//! Coordinates are a nice-to-have: events remain fully functional without
//! them, they just drop out of radius-filtered searches. Callers on the
//! write path therefore treat any failure here as "no coordinates".

use serde::Serialize;
use serde_json::Value;

use crate::utils::error::AppError;

const GEOCODING_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Look up coordinates for a free-form address string. `Ok(None)` means the
/// provider had no match; transport and decode failures are errors.
pub async fn geocode_address(
    http: &reqwest::Client,
    api_key: &str,
    address: &str,
) -> Result<Option<Coordinates>, AppError> {
    let response = http
        .get(GEOCODING_URL)
        .query(&[("address", address), ("key", api_key)])
        .send()
        .await
        .map_err(|e| AppError::ExternalService(format!("Geocoding request failed: {e}")))?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| AppError::ExternalService(format!("Geocoding response invalid: {e}")))?;

    Ok(extract_coordinates(&body))
}

/// Pull the first result's location out of a geocoding response body.
pub fn extract_coordinates(body: &Value) -> Option<Coordinates> {
    let location = body
        .get("results")?
        .as_array()?
        .first()?
        .get("geometry")?
        .get("location")?;

    Some(Coordinates {
        lat: location.get("lat")?.as_f64()?,
        lon: location.get("lng")?.as_f64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_first_result() {
        let body = json!({
            "status": "OK",
            "results": [
                { "geometry": { "location": { "lat": 46.0569, "lng": 14.5058 } } },
                { "geometry": { "location": { "lat": 0.0, "lng": 0.0 } } }
            ]
        });
        assert_eq!(
            extract_coordinates(&body),
            Some(Coordinates {
                lat: 46.0569,
                lon: 14.5058
            })
        );
    }

    #[test]
    fn empty_and_malformed_responses_yield_none() {
        assert_eq!(
            extract_coordinates(&json!({ "status": "ZERO_RESULTS", "results": [] })),
            None
        );
        assert_eq!(extract_coordinates(&json!({ "error": "quota" })), None);
        assert_eq!(
            extract_coordinates(&json!({ "results": [{ "geometry": {} }] })),
            None
        );
    }
}
