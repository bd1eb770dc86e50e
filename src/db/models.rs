use crate::aggregator::{MAX_CONFIDENCE, MIN_CONFIDENCE};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};

const DRIFT_TOLERANCE: f64 = 1e-9;

/// Running mean and count of the latest vote from every distinct voter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateState {
    pub mean: f64,
    pub count: i64,
}

impl AggregateState {
    /// Folds `value` from one voter into the aggregate.
    ///
    /// `previous` is that voter's last recorded vote, if any. A first vote
    /// grows the count; a revote replaces the earlier value without
    /// counting the voter twice.
    pub fn fold(self, previous: Option<f64>, value: f64) -> Result<Self, AppError> {
        let total = self.mean * self.count as f64;

        let next = match previous {
            None => {
                let count = self.count + 1;
                Self {
                    mean: (total + value) / count as f64,
                    count,
                }
            }
            Some(_) if self.count == 0 => {
                return Err(AppError::StoreUnavailable(
                    "aggregate is inconsistent: voter recorded but count is zero".to_string(),
                ));
            }
            Some(old) => Self {
                mean: (total - old + value) / self.count as f64,
                count: self.count,
            },
        };

        Ok(next.settled())
    }

    /// Keeps rounding drift from the incremental update inside the vote range.
    fn settled(self) -> Self {
        if self.count == 0 {
            return Self::default();
        }

        let mut mean = self.mean.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
        if mean - MIN_CONFIDENCE < DRIFT_TOLERANCE {
            mean = MIN_CONFIDENCE;
        } else if MAX_CONFIDENCE - mean < DRIFT_TOLERANCE {
            mean = MAX_CONFIDENCE;
        }

        Self { mean, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuestionEntry {
    pub text: String,
    pub asked_at: DateTime<Utc>,
}
