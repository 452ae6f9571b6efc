//! Daily diary entry model

use serde::{Deserialize, Serialize};

/// One diary entry per calendar day
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyEntry {
    /// Entry day (`yyyy-MM-dd`), the record key
    pub date: String,
    pub diary: Option<String>,
    /// Keywords joined by `;`
    pub keywords: Option<String>,
    pub ai_comment: Option<String>,
    pub emotion_score: Option<f64>,
    pub emotion_icon: Option<String>,
    pub theme_icon: Option<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

impl DailyEntry {
    /// Create an empty entry for the given day
    #[must_use]
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Self::default()
        }
    }

    /// Split the stored keyword string into trimmed, non-empty keywords
    #[must_use]
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .as_deref()
            .unwrap_or("")
            .split(';')
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Whether the diary text has been written
    #[must_use]
    pub fn has_diary(&self) -> bool {
        self.diary
            .as_deref()
            .is_some_and(|diary| !diary.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_list_skips_blanks() {
        let entry = DailyEntry {
            keywords: Some("walk; rain;;  coffee ".to_string()),
            ..DailyEntry::new("2024-05-01")
        };
        assert_eq!(entry.keyword_list(), vec!["walk", "rain", "coffee"]);
    }

    #[test]
    fn has_diary_ignores_whitespace() {
        let mut entry = DailyEntry::new("2024-05-01");
        assert!(!entry.has_diary());
        entry.diary = Some("  ".to_string());
        assert!(!entry.has_diary());
        entry.diary = Some("Rainy day.".to_string());
        assert!(entry.has_diary());
    }
}
