pub mod connection;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;

pub use connection::*;
pub use memory::MemoryStore;
pub use models::*;
pub use postgres::PgStore;

use crate::error::AppError;
use crate::sse::Broadcaster;
use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};

/// Shared state behind the aggregator and the question board.
///
/// `apply_vote` must run as one indivisible unit: concurrent calls
/// serialize, and no caller ever observes a half-applied vote.
#[async_trait]
pub trait Store: Send + Sync {
    async fn reset(&self) -> Result<(), AppError>;

    async fn ping(&self) -> Result<(), AppError>;

    /// Publishes the new bar on `broadcaster` before the vote's critical
    /// section ends, so viewers see vote updates in the order they applied.
    async fn apply_vote(
        &self,
        identity: &str,
        value: f64,
        broadcaster: &Broadcaster,
    ) -> Result<AggregateState, AppError>;

    async fn aggregate(&self) -> Result<AggregateState, AppError>;

    async fn add_question(
        &self,
        text: &str,
        asked_at: DateTime<Utc>,
    ) -> Result<QuestionEntry, AppError>;

    /// Most recent first.
    async fn recent_questions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<QuestionEntry>, AppError>;

    /// Removes every entry with exactly this text and returns how many went.
    async fn remove_question(&self, text: &str) -> Result<u64, AppError>;
}
