use crate::db::Store;
use crate::db::connection::{DbPool, pool_stats};
use crate::db::models::{AggregateState, QuestionEntry};
use crate::db::repositories;
use crate::error::AppError;
use crate::sse::{BroadcastMessage, Broadcaster};
use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use tracing::debug;

/// Store shared by every instance pointed at the same database.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn reset(&self) -> Result<(), AppError> {
        repositories::reset_votes(&self.pool).await?;
        repositories::clear_questions(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        let conn = self.pool.acquire().await?;
        drop(conn);
        debug!("{}", pool_stats(&self.pool));
        Ok(())
    }

    async fn apply_vote(
        &self,
        identity: &str,
        value: f64,
        broadcaster: &Broadcaster,
    ) -> Result<AggregateState, AppError> {
        if broadcaster.is_relayed() {
            // NOTIFY rides in the vote transaction and goes out at commit.
            return repositories::apply_vote(&self.pool, identity, value, true).await;
        }

        let state = repositories::apply_vote(&self.pool, identity, value, false).await?;
        broadcaster.deliver(BroadcastMessage::vote(&state));
        Ok(state)
    }

    async fn aggregate(&self) -> Result<AggregateState, AppError> {
        Ok(repositories::get_aggregate(&self.pool).await?)
    }

    async fn add_question(
        &self,
        text: &str,
        asked_at: DateTime<Utc>,
    ) -> Result<QuestionEntry, AppError> {
        Ok(repositories::add_question(&self.pool, text, asked_at).await?)
    }

    async fn recent_questions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<QuestionEntry>, AppError> {
        Ok(repositories::get_recent_questions(&self.pool, offset, limit).await?)
    }

    async fn remove_question(&self, text: &str) -> Result<u64, AppError> {
        Ok(repositories::remove_question(&self.pool, text).await?)
    }
}
