//! Price window maintenance.
//!
//! An event's price history is a sequence of windows; exactly one window per
//! event is open (`valid_to IS NULL`) and holds the current price. Changing
//! the price closes the open window and opens a new one in a single
//! transaction, with the open window locked so concurrent changes serialize.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::pricing::PricingWindow;
use crate::utils::error::AppError;

const SELECT_OPEN_WINDOW: &str =
    "SELECT * FROM pricing_windows WHERE event_id = $1 AND valid_to IS NULL FOR UPDATE";
const CLOSE_WINDOW: &str = "UPDATE pricing_windows SET valid_to = $1 WHERE id = $2";
const OPEN_WINDOW: &str =
    "INSERT INTO pricing_windows (event_id, price, valid_from) VALUES ($1, $2, $3)";

/// What a price change must do given the currently open window.
#[derive(Debug, PartialEq, Eq)]
enum PriceTransition {
    /// The open window already carries this price; touch nothing.
    Unchanged,
    /// Close the named window, then open a new one.
    CloseAndOpen { window_id: Uuid },
    /// No open window yet; just open one.
    Open,
}

fn plan_transition(open: Option<&PricingWindow>, new_price: Decimal) -> PriceTransition {
    match open {
        Some(window) if window.price == new_price => PriceTransition::Unchanged,
        Some(window) => PriceTransition::CloseAndOpen {
            window_id: window.id,
        },
        None => PriceTransition::Open,
    }
}

/// Set the event's current price, recording history. A no-op when the open
/// window already carries the same price, so repeated saves of an unchanged
/// event do not pollute the history.
pub async fn change_price(
    pool: &PgPool,
    event_id: Uuid,
    new_price: Decimal,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let open = sqlx::query_as::<_, PricingWindow>(SELECT_OPEN_WINDOW)
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?;

    match plan_transition(open.as_ref(), new_price) {
        PriceTransition::Unchanged => {
            tx.commit().await?;
            return Ok(());
        }
        PriceTransition::CloseAndOpen { window_id } => {
            sqlx::query(CLOSE_WINDOW)
                .bind(now)
                .bind(window_id)
                .execute(&mut *tx)
                .await?;
        }
        PriceTransition::Open => {}
    }

    sqlx::query(OPEN_WINDOW)
        .bind(event_id)
        .bind(new_price)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_window(price: Decimal) -> PricingWindow {
        PricingWindow {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            price,
            valid_from: Utc::now(),
            valid_to: None,
        }
    }

    #[test]
    fn equal_price_leaves_history_untouched() {
        let window = open_window(Decimal::from(15));
        assert_eq!(
            plan_transition(Some(&window), Decimal::from(15)),
            PriceTransition::Unchanged
        );
    }

    #[test]
    fn changed_price_closes_the_open_window_before_opening() {
        let window = open_window(Decimal::from(15));
        assert_eq!(
            plan_transition(Some(&window), Decimal::from(20)),
            PriceTransition::CloseAndOpen {
                window_id: window.id
            }
        );
    }

    #[test]
    fn first_price_opens_without_closing() {
        assert_eq!(
            plan_transition(None, Decimal::ZERO),
            PriceTransition::Open
        );
    }

    /// The single-open-window invariant rests on three statements: the open
    /// window is selected with a row lock, the close stamps `valid_to`, and
    /// the insert leaves `valid_to` NULL as the new open window.
    #[test]
    fn statements_uphold_the_single_open_window_invariant() {
        assert!(SELECT_OPEN_WINDOW.contains("valid_to IS NULL"));
        assert!(SELECT_OPEN_WINDOW.ends_with("FOR UPDATE"));
        assert!(CLOSE_WINDOW.contains("SET valid_to = $1"));
        assert!(OPEN_WINDOW.contains("(event_id, price, valid_from)"));
        assert!(!OPEN_WINDOW.contains("valid_to"));
    }
}
