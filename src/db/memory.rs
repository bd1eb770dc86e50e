use crate::db::Store;
use crate::db::models::{AggregateState, QuestionEntry};
use crate::error::AppError;
use crate::sse::{BroadcastMessage, Broadcaster};
use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Default)]
struct VoteLedger {
    aggregate: AggregateState,
    voters: HashMap<String, f64>,
}

#[derive(Default)]
struct QuestionLog {
    // Sequence breaks ties between questions asked in the same instant.
    entries: BTreeMap<(DateTime<Utc>, u64), String>,
    next_seq: u64,
}

/// Single-instance store. The ledger mutex is the critical section for votes.
#[derive(Default)]
pub struct MemoryStore {
    votes: Mutex<VoteLedger>,
    questions: Mutex<QuestionLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn reset(&self) -> Result<(), AppError> {
        *self.votes.lock().await = VoteLedger::default();
        *self.questions.lock().await = QuestionLog::default();
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn apply_vote(
        &self,
        identity: &str,
        value: f64,
        broadcaster: &Broadcaster,
    ) -> Result<AggregateState, AppError> {
        let mut ledger = self.votes.lock().await;

        let previous = ledger.voters.get(identity).copied();
        let next = ledger.aggregate.fold(previous, value)?;

        ledger.aggregate = next;
        ledger.voters.insert(identity.to_string(), value);

        // Still holding the ledger, so publications follow apply order.
        broadcaster
            .publish_message(BroadcastMessage::vote(&next))
            .await;

        Ok(next)
    }

    async fn aggregate(&self) -> Result<AggregateState, AppError> {
        Ok(self.votes.lock().await.aggregate)
    }

    async fn add_question(
        &self,
        text: &str,
        asked_at: DateTime<Utc>,
    ) -> Result<QuestionEntry, AppError> {
        let mut log = self.questions.lock().await;

        let seq = log.next_seq;
        log.next_seq += 1;
        log.entries.insert((asked_at, seq), text.to_string());

        Ok(QuestionEntry {
            text: text.to_string(),
            asked_at,
        })
    }

    async fn recent_questions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<QuestionEntry>, AppError> {
        let log = self.questions.lock().await;

        Ok(log
            .entries
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|((asked_at, _), text)| QuestionEntry {
                text: text.clone(),
                asked_at: *asked_at,
            })
            .collect())
    }

    async fn remove_question(&self, text: &str) -> Result<u64, AppError> {
        let mut log = self.questions.lock().await;

        let before = log.entries.len();
        log.entries.retain(|_, entry| entry.as_str() != text);

        Ok((before - log.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_revote_does_not_double_count() {
        let store = MemoryStore::new();
        let broadcaster = Broadcaster::new(8);

        store.apply_vote("10.0.0.1", 80.0, &broadcaster).await.unwrap();
        store.apply_vote("10.0.0.2", 40.0, &broadcaster).await.unwrap();
        let state = store.apply_vote("10.0.0.1", 20.0, &broadcaster).await.unwrap();

        assert_eq!(state.count, 2);
        assert!((state.mean - 30.0).abs() < 1e-9);
        assert_eq!(store.aggregate().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_apply_vote_publishes_new_bar() {
        let store = MemoryStore::new();
        let broadcaster = Broadcaster::new(8);
        let mut viewer = broadcaster.subscribe();

        let state = store.apply_vote("10.0.0.1", 70.0, &broadcaster).await.unwrap();

        assert_eq!(viewer.recv().await.unwrap(), BroadcastMessage::vote(&state));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let store = MemoryStore::new();
        let broadcaster = Broadcaster::new(8);
        store.apply_vote("a", 50.0, &broadcaster).await.unwrap();
        store.add_question("why?", Utc::now()).await.unwrap();

        store.reset().await.unwrap();

        assert_eq!(store.aggregate().await.unwrap(), AggregateState::default());
        assert!(store.recent_questions(0, 10).await.unwrap().is_empty());

        // A voter from before the reset counts as new again.
        let state = store.apply_vote("a", 10.0, &broadcaster).await.unwrap();
        assert_eq!(state.count, 1);
    }

    #[tokio::test]
    async fn test_questions_are_newest_first_and_paged() {
        let store = MemoryStore::new();
        let start = Utc::now();

        for i in 0..5 {
            store
                .add_question(&format!("q{i}"), start + Duration::seconds(i))
                .await
                .unwrap();
        }

        let first: Vec<_> = store
            .recent_questions(0, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.text)
            .collect();
        assert_eq!(first, vec!["q4", "q3"]);

        let last = store.recent_questions(4, 2).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].text, "q0");
    }

    #[tokio::test]
    async fn test_same_instant_keeps_insertion_order() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.add_question("first", now).await.unwrap();
        store.add_question("second", now).await.unwrap();

        let page = store.recent_questions(0, 10).await.unwrap();
        assert_eq!(page[0].text, "second");
        assert_eq!(page[1].text, "first");
    }

    #[tokio::test]
    async fn test_remove_question_removes_all_matches() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.add_question("dup", now).await.unwrap();
        store.add_question("keep", now).await.unwrap();
        store.add_question("dup", now).await.unwrap();

        assert_eq!(store.remove_question("dup").await.unwrap(), 2);
        assert_eq!(store.remove_question("dup").await.unwrap(), 0);

        let page = store.recent_questions(0, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].text, "keep");
    }
}
