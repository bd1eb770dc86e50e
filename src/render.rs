//! HTML fragments for the htmx front-end. Every fragment is a single line so
//! it fits one SSE `data:` field.

use crate::db::{AggregateState, QuestionEntry};
use chrono::Local;

pub fn bar(state: &AggregateState) -> String {
    format!(
        concat!(
            r#"<div id="progress-bar">"#,
            r#"<div id="progress" style="background-color: hsl({mean}, 70%, 50%); width: {mean}%;">"#,
            "{display}%",
            "</div></div>",
            "<p>Total votes: {count}</p>"
        ),
        mean = state.mean,
        display = state.mean.round() as i64,
        count = state.count,
    )
}

pub fn question(entry: &QuestionEntry) -> String {
    question_with_trigger(entry, "")
}

/// The last question of a page loads the next page once it scrolls into view.
pub fn question_page(entries: &[QuestionEntry], page: i64) -> String {
    let last = entries.len().saturating_sub(1);

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            if i == last {
                let trigger = format!(
                    r#" hx-get="/question?page={}" hx-trigger="revealed" hx-swap="afterend""#,
                    page + 1
                );
                question_with_trigger(entry, &trigger)
            } else {
                question(entry)
            }
        })
        .collect()
}

/// Payload for a deletion: the front-end drops every `<p>` with this
/// `data-question` value.
pub fn deleted_question(text: &str) -> String {
    escape(text)
}

fn question_with_trigger(entry: &QuestionEntry, trigger: &str) -> String {
    let text = escape(&entry.text);
    format!(
        r#"<p data-question="{text}"{trigger}>{}: {text}</p>"#,
        entry.asked_at.with_timezone(&Local).format("%H:%M:%S"),
    )
}

pub fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}
