use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingInput {
    pub event_id: Uuid,
    pub score: i32,
}

#[derive(Debug, Deserialize)]
pub struct RatingUpdateInput {
    pub score: i32,
}

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

pub fn score_in_range(score: i32) -> bool {
    (MIN_SCORE..=MAX_SCORE).contains(&score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bounds_are_inclusive() {
        assert!(score_in_range(1));
        assert!(score_in_range(5));
        assert!(!score_in_range(0));
        assert!(!score_in_range(6));
    }
}
