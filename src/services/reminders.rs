//! Daily reminder emails for registered attendees.
//!
//! Once a day, every user registered for an event starting tomorrow gets a
//! short reminder. A failed send is logged and skipped; one bad address must
//! not silence the remaining recipients.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::FromRow;
use tracing::{error, info, warn};

use crate::state::AppState;
use crate::utils::error::AppError;

/// Reminders go out at 08:00 UTC.
const RUN_AT: NaiveTime = match NaiveTime::from_hms_opt(8, 0, 0) {
    Some(t) => t,
    None => panic!("invalid run time"),
};

#[derive(Debug, FromRow)]
struct ReminderRow {
    email: String,
    first_name: String,
    title: String,
    start_time: DateTime<Utc>,
}

/// Calendar-day window for "tomorrow" in UTC.
pub fn tomorrow_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = (now + Duration::days(1))
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    (start, start + Duration::days(1))
}

/// Time until the next run, strictly in the future.
pub fn next_run_delay(now: DateTime<Utc>) -> std::time::Duration {
    let today_run = now.date_naive().and_time(RUN_AT).and_utc();
    let next = if today_run > now {
        today_run
    } else {
        today_run + Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

/// Send reminders for all events starting tomorrow. Returns the number of
/// emails successfully sent.
pub async fn send_event_reminders(state: &AppState) -> Result<u32, AppError> {
    let Some(email) = state.email.as_ref() else {
        info!("Email sending disabled, skipping reminders");
        return Ok(0);
    };

    let (from, to) = tomorrow_window(Utc::now());
    let recipients = sqlx::query_as::<_, ReminderRow>(
        "SELECT u.email, u.first_name, e.title, e.start_time \
         FROM registrations r \
         JOIN events e ON e.id = r.event_id \
         JOIN users u ON u.id = r.user_id \
         WHERE e.start_time >= $1 AND e.start_time < $2 \
         ORDER BY e.start_time",
    )
    .bind(from)
    .bind(to)
    .fetch_all(&state.pool)
    .await?;

    let mut sent = 0u32;
    for row in &recipients {
        let subject = format!("Opomnik: {}", row.title);
        let body = format!(
            "Pozdravljeni, {}!\n\nDogodek \"{}\" se začne {}.\n\nVidimo se tam,\nekipa SkupajTukaj",
            row.first_name,
            row.title,
            row.start_time.format("%d. %m. %Y ob %H:%M"),
        );

        match email.send(&row.email, &subject, body).await {
            Ok(()) => sent += 1,
            Err(e) => warn!(recipient = %row.email, error = %e, "Reminder email failed"),
        }
    }

    info!(sent, total = recipients.len(), "Event reminders processed");
    Ok(sent)
}

/// Background loop driving the daily run.
pub fn spawn_daily_reminders(state: AppState) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(next_run_delay(Utc::now())).await;
            if let Err(e) = send_event_reminders(&state).await {
                error!(error = %e, "Reminder run failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn tomorrow_window_covers_the_whole_day() {
        let (from, to) = tomorrow_window(at("2025-06-15T14:30:00Z"));
        assert_eq!(from, at("2025-06-16T00:00:00Z"));
        assert_eq!(to, at("2025-06-17T00:00:00Z"));
    }

    #[test]
    fn window_rolls_over_at_midnight() {
        let (from, _) = tomorrow_window(at("2025-06-15T23:59:59Z"));
        assert_eq!(from, at("2025-06-16T00:00:00Z"));
        let (from, _) = tomorrow_window(at("2025-06-16T00:00:00Z"));
        assert_eq!(from, at("2025-06-17T00:00:00Z"));
    }

    #[test]
    fn next_run_is_later_today_or_tomorrow() {
        let before = next_run_delay(at("2025-06-15T06:00:00Z"));
        assert_eq!(before, std::time::Duration::from_secs(2 * 3600));

        let after = next_run_delay(at("2025-06-15T09:00:00Z"));
        assert_eq!(after, std::time::Duration::from_secs(23 * 3600));

        // Exactly at the run time, schedule the next day.
        let exact = next_run_delay(at("2025-06-15T08:00:00Z"));
        assert_eq!(exact, std::time::Duration::from_secs(24 * 3600));
    }
}
