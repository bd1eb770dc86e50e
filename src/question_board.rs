use crate::db::{QuestionEntry, Store};
use crate::error::AppError;
use crate::render;
use crate::sse::{Broadcaster, EventCategory};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub const QUESTION_PAGE_SIZE: i64 = 20;
/// Keeps relayed payloads well inside the NOTIFY size limit.
pub const MAX_QUESTION_LEN: usize = 500;

#[derive(Clone)]
pub struct QuestionBoard {
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
}

impl QuestionBoard {
    pub fn new(store: Arc<dyn Store>, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    pub async fn ask(&self, text: &str) -> Result<QuestionEntry, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Question input not received".to_string(),
            ));
        }
        if text.chars().count() > MAX_QUESTION_LEN {
            return Err(AppError::InvalidInput(format!(
                "Question longer than {MAX_QUESTION_LEN} characters"
            )));
        }

        let entry = self.store.add_question(text, Utc::now()).await?;
        info!(question = %entry.text, "question asked");

        self.broadcaster
            .publish(EventCategory::Question, render::question(&entry))
            .await;

        Ok(entry)
    }

    /// Page `page` (1-based) of the most recent questions.
    pub async fn list(&self, page: i64) -> Result<Vec<QuestionEntry>, AppError> {
        if page < 1 {
            return Err(AppError::InvalidInput(format!(
                "Page expected to be a positive integer, found: {page}"
            )));
        }

        let offset = (page - 1).saturating_mul(QUESTION_PAGE_SIZE);
        self.store.recent_questions(offset, QUESTION_PAGE_SIZE).await
    }

    /// Removes every question with exactly this text. Viewers only hear about
    /// it when something was actually removed.
    pub async fn delete(&self, text: &str) -> Result<u64, AppError> {
        let removed = self.store.remove_question(text).await?;

        if removed > 0 {
            info!(question = %text, removed, "question deleted");
            self.broadcaster
                .publish(EventCategory::DeleteQuestion, render::deleted_question(text))
                .await;
        }

        Ok(removed)
    }
}
