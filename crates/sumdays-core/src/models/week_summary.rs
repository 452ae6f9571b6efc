//! Weekly summary model

use serde::{Deserialize, Serialize};

/// AI analysis of one week of diary entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSummary {
    /// First day of the week (`yyyy-MM-dd`), the record key
    pub start_date: String,
    pub end_date: String,
    pub diary_count: i64,
    pub emotion_analysis: serde_json::Value,
    pub highlights: serde_json::Value,
    pub insights: serde_json::Value,
    pub summary: serde_json::Value,
}
