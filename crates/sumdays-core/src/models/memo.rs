//! Memo model

use serde::{Deserialize, Serialize};

/// Default memo type for typed text
pub const TEXT_MEMO_TYPE: &str = "text";

/// A short memo captured during a day, later merged into the diary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    /// Local row id, shared with the server as `room_id`
    pub id: i64,
    pub content: String,
    /// Capture time of day (`HH:mm`)
    pub timestamp: String,
    /// Day the memo belongs to (`yyyy-MM-dd`)
    pub date: String,
    /// Position within the day
    pub order: i32,
    /// `text`, `audio`, `image`, ...
    pub memo_type: String,
}

impl Memo {
    /// Create a text memo stamped with the current local time
    #[must_use]
    pub fn new(id: i64, content: impl Into<String>, date: impl Into<String>, order: i32) -> Self {
        Self {
            id,
            content: content.into(),
            timestamp: chrono::Local::now().format("%H:%M").to_string(),
            date: date.into(),
            order,
            memo_type: TEXT_MEMO_TYPE.to_string(),
        }
    }

    /// Get first line as preview, truncated to `max_len` characters
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}
