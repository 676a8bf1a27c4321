//! Weather advisory for upcoming events.
//!
//! Uses the OpenWeatherMap 5-day/3-hour forecast, so an advisory exists only
//! for events starting within the forecast horizon. The forecast slot
//! closest to the event start is turned into a short Slovenian hint.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::utils::error::AppError;

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// Maximum distance between the event start and the nearest forecast slot.
const SLOT_TOLERANCE_HOURS: i64 = 3;
const HORIZON_DAYS: i64 = 7;

const COLD_THRESHOLD_C: f64 = 10.0;
const HOT_THRESHOLD_C: f64 = 25.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSlot {
    pub at: DateTime<Utc>,
    pub temp_c: f64,
    pub condition: String,
    pub description: String,
}

/// Fetch an advisory for an event at the given coordinates. Returns `None`
/// when the event is in the past, beyond the forecast horizon, or no
/// forecast slot lands close enough to the start time.
pub async fn event_advisory(
    http: &reqwest::Client,
    api_key: &str,
    lat: f64,
    lon: f64,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Option<String>, AppError> {
    if !within_horizon(start_time, now) {
        return Ok(None);
    }

    let response = http
        .get(FORECAST_URL)
        .query(&[
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
            ("lang", "sl".to_string()),
        ])
        .send()
        .await
        .map_err(|e| AppError::ExternalService(format!("Weather request failed: {e}")))?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| AppError::ExternalService(format!("Weather response invalid: {e}")))?;

    let slots = parse_forecast(&body);
    Ok(pick_slot(&slots, start_time).map(advisory_message))
}

pub fn within_horizon(start_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start_time > now && start_time <= now + Duration::days(HORIZON_DAYS)
}

fn parse_forecast(body: &Value) -> Vec<ForecastSlot> {
    let Some(list) = body.get("list").and_then(Value::as_array) else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| {
            let at = DateTime::from_timestamp(entry.get("dt")?.as_i64()?, 0)?;
            let temp_c = entry.get("main")?.get("temp")?.as_f64()?;
            let weather = entry.get("weather")?.as_array()?.first()?;
            Some(ForecastSlot {
                at,
                temp_c,
                condition: weather.get("main")?.as_str()?.to_string(),
                description: weather.get("description")?.as_str()?.to_string(),
            })
        })
        .collect()
}

/// The slot nearest the target time, if within tolerance.
pub fn pick_slot(slots: &[ForecastSlot], target: DateTime<Utc>) -> Option<&ForecastSlot> {
    slots
        .iter()
        .min_by_key(|slot| (slot.at - target).num_seconds().abs())
        .filter(|slot| {
            (slot.at - target).num_seconds().abs() <= SLOT_TOLERANCE_HOURS * 3600
        })
}

pub fn advisory_message(slot: &ForecastSlot) -> String {
    let rainy = matches!(slot.condition.as_str(), "Rain" | "Drizzle" | "Thunderstorm");
    if rainy {
        "Napovedan je dež, s seboj vzemite dežnik.".to_string()
    } else if slot.temp_c < COLD_THRESHOLD_C {
        "Pričakujte hladno vreme, oblecite topla oblačila.".to_string()
    } else if slot.temp_c > HOT_THRESHOLD_C {
        "Pričakujte vroče vreme, poskrbite za zaščito pred soncem.".to_string()
    } else {
        format!(
            "Napovedano vreme: {}, {:.0} °C.",
            slot.description, slot.temp_c
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(offset_hours: i64, temp_c: f64, condition: &str) -> ForecastSlot {
        ForecastSlot {
            at: DateTime::from_timestamp(1_750_000_000 + offset_hours * 3600, 0).unwrap(),
            temp_c,
            condition: condition.to_string(),
            description: condition.to_lowercase(),
        }
    }

    #[test]
    fn horizon_excludes_past_and_distant_events() {
        let now = Utc::now();
        assert!(!within_horizon(now - Duration::hours(1), now));
        assert!(within_horizon(now + Duration::days(2), now));
        assert!(!within_horizon(now + Duration::days(8), now));
    }

    #[test]
    fn nearest_slot_wins_within_tolerance() {
        let slots = vec![slot(0, 18.0, "Clouds"), slot(3, 20.0, "Clear")];
        let target = DateTime::from_timestamp(1_750_000_000 + 2 * 3600, 0).unwrap();
        assert_eq!(pick_slot(&slots, target), Some(&slots[1]));
    }

    #[test]
    fn no_slot_close_enough() {
        let slots = vec![slot(0, 18.0, "Clouds")];
        let target = DateTime::from_timestamp(1_750_000_000 + 4 * 3600, 0).unwrap();
        assert_eq!(pick_slot(&slots, target), None);
        assert_eq!(pick_slot(&[], target), None);
    }

    #[test]
    fn rain_beats_temperature() {
        let msg = advisory_message(&slot(0, 5.0, "Rain"));
        assert!(msg.contains("dežnik"));
    }

    #[test]
    fn temperature_advisories() {
        assert!(advisory_message(&slot(0, 4.0, "Clear")).contains("topla oblačila"));
        assert!(advisory_message(&slot(0, 31.0, "Clear")).contains("zaščito pred soncem"));

        let mild = advisory_message(&slot(0, 18.0, "Clouds"));
        assert!(mild.contains("Napovedano vreme"));
        assert!(mild.contains("18 °C"));
    }

    #[test]
    fn forecast_parsing_skips_malformed_entries() {
        let body = serde_json::json!({
            "list": [
                {
                    "dt": 1_750_000_000i64,
                    "main": { "temp": 17.5 },
                    "weather": [{ "main": "Clouds", "description": "oblačno" }]
                },
                { "dt": "bad" }
            ]
        });
        let slots = parse_forecast(&body);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].condition, "Clouds");
        assert_eq!(slots[0].description, "oblačno");
    }
}
