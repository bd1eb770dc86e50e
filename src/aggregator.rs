use crate::db::{AggregateState, Store};
use crate::error::AppError;
use crate::sse::Broadcaster;
use std::sync::Arc;
use tracing::info;

pub const MIN_CONFIDENCE: f64 = 0.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Owns the running confidence average. Nothing else writes to it.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// Records `value` as `identity`'s current vote and publishes the new bar.
    ///
    /// A returning voter replaces their earlier value. The store publishes
    /// inside the vote's critical section, so viewers never get an older
    /// bar after a newer one.
    pub async fn submit_vote(&self, identity: &str, value: f64) -> Result<AggregateState, AppError> {
        validate_confidence(value)?;

        let state = self
            .store
            .apply_vote(identity, value, &self.broadcaster)
            .await?;
        info!(
            identity,
            value,
            mean = state.mean,
            count = state.count,
            "vote applied"
        );

        Ok(state)
    }

    pub async fn aggregate(&self) -> Result<AggregateState, AppError> {
        self.store.aggregate().await
    }
}

pub fn parse_confidence(raw: &str) -> Result<f64, AppError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| AppError::InvalidInput(format!("Error parsing confidence: {e}")))?;

    validate_confidence(value)?;
    Ok(value)
}

fn validate_confidence(value: f64) -> Result<(), AppError> {
    // NaN fails the range check too.
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&value) {
        return Err(AppError::InvalidInput(format!(
            "Confidence expected to be between 0-100, found: {value}"
        )));
    }
    Ok(())
}
