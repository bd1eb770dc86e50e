use crate::db::AggregateState;
use crate::render;
use axum::response::sse::Event;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventCategory {
    Vote,
    Question,
    DeleteQuestion,
}

impl EventCategory {
    /// SSE event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Vote => "vote",
            EventCategory::Question => "question",
            EventCategory::DeleteQuestion => "deleteQuestion",
        }
    }
}

/// An already-rendered state change on its way to live viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub category: EventCategory,
    pub payload: String,
}

impl BroadcastMessage {
    pub fn new(category: EventCategory, payload: impl Into<String>) -> Self {
        Self {
            category,
            payload: payload.into(),
        }
    }

    /// The bar as it stands after a vote.
    pub fn vote(state: &AggregateState) -> Self {
        Self::new(EventCategory::Vote, render::bar(state))
    }

    pub fn to_event(&self) -> Event {
        Event::default()
            .event(self.category.as_str())
            .data(&self.payload)
    }
}
