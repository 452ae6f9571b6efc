//! Row mapping for the synced record kinds

use std::fmt;
use std::hash::Hash;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, Value, ValueRef};
use rusqlite::{Row, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::models::{DailyEntry, DirtyState, Memo, RecordKind, UserStyle, WeekSummary};

/// A record kind stored in its own table with dirty tracking columns.
///
/// Rows are selected as `key, COLUMNS..., sync_state, revision`;
/// [`SyncRecord::from_row`] reads the key at index 0 followed by the payload
/// columns in `COLUMNS` order.
pub trait SyncRecord: Clone + Send + Sync + 'static {
    type Key: Clone
        + fmt::Debug
        + fmt::Display
        + Eq
        + Hash
        + Send
        + Sync
        + Serialize
        + FromSql
        + Into<Value>;

    const KIND: RecordKind;
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    /// Payload columns, excluding key and tracking columns
    const COLUMNS: &'static [&'static str];
    const ORDER_BY: &'static str;

    fn key(&self) -> Self::Key;

    /// Payload values in `COLUMNS` order
    fn to_values(&self) -> Result<Vec<Value>>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl ToSql for DirtyState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DirtyState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

fn json_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

impl SyncRecord for Memo {
    type Key = i64;

    const KIND: RecordKind = RecordKind::Memo;
    const TABLE: &'static str = "memos";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] =
        &["content", "timestamp", "date", "memo_order", "memo_type"];
    const ORDER_BY: &'static str = "date ASC, memo_order ASC, id ASC";

    fn key(&self) -> i64 {
        self.id
    }

    fn to_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            self.content.clone().into(),
            self.timestamp.clone().into(),
            self.date.clone().into(),
            i64::from(self.order).into(),
            self.memo_type.clone().into(),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            timestamp: row.get(2)?,
            date: row.get(3)?,
            order: row.get(4)?,
            memo_type: row.get(5)?,
        })
    }
}

impl SyncRecord for DailyEntry {
    type Key = String;

    const KIND: RecordKind = RecordKind::DailyEntry;
    const TABLE: &'static str = "daily_entries";
    const KEY_COLUMN: &'static str = "date";
    const COLUMNS: &'static [&'static str] = &[
        "diary",
        "keywords",
        "ai_comment",
        "emotion_score",
        "emotion_icon",
        "theme_icon",
        "photo_urls",
    ];
    const ORDER_BY: &'static str = "date ASC";

    fn key(&self) -> String {
        self.date.clone()
    }

    fn to_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            self.diary.clone().into(),
            self.keywords.clone().into(),
            self.ai_comment.clone().into(),
            self.emotion_score.into(),
            self.emotion_icon.clone().into(),
            self.theme_icon.clone().into(),
            json_value(&self.photo_urls)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            date: row.get(0)?,
            diary: row.get(1)?,
            keywords: row.get(2)?,
            ai_comment: row.get(3)?,
            emotion_score: row.get(4)?,
            emotion_icon: row.get(5)?,
            theme_icon: row.get(6)?,
            photo_urls: json_column(row, 7)?,
        })
    }
}

impl SyncRecord for UserStyle {
    type Key = i64;

    const KIND: RecordKind = RecordKind::UserStyle;
    const TABLE: &'static str = "user_styles";
    const KEY_COLUMN: &'static str = "style_id";
    const COLUMNS: &'static [&'static str] = &[
        "style_name",
        "style_vector",
        "style_examples",
        "style_prompt",
        "sample_diary",
    ];
    const ORDER_BY: &'static str = "style_id DESC";

    fn key(&self) -> i64 {
        self.style_id
    }

    fn to_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            self.style_name.clone().into(),
            json_value(&self.style_vector)?,
            json_value(&self.style_examples)?,
            json_value(&self.style_prompt)?,
            self.sample_diary.clone().into(),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            style_id: row.get(0)?,
            style_name: row.get(1)?,
            style_vector: json_column(row, 2)?,
            style_examples: json_column(row, 3)?,
            style_prompt: json_column(row, 4)?,
            sample_diary: row.get(5)?,
        })
    }
}

impl SyncRecord for WeekSummary {
    type Key = String;

    const KIND: RecordKind = RecordKind::WeekSummary;
    const TABLE: &'static str = "week_summaries";
    const KEY_COLUMN: &'static str = "start_date";
    const COLUMNS: &'static [&'static str] = &[
        "end_date",
        "diary_count",
        "emotion_analysis",
        "highlights",
        "insights",
        "summary",
    ];
    const ORDER_BY: &'static str = "start_date ASC";

    fn key(&self) -> String {
        self.start_date.clone()
    }

    fn to_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            self.end_date.clone().into(),
            self.diary_count.into(),
            json_value(&self.emotion_analysis)?,
            json_value(&self.highlights)?,
            json_value(&self.insights)?,
            json_value(&self.summary)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            start_date: row.get(0)?,
            end_date: row.get(1)?,
            diary_count: row.get(2)?,
            emotion_analysis: json_column(row, 3)?,
            highlights: json_column(row, 4)?,
            insights: json_column(row, 5)?,
            summary: json_column(row, 6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_columns_match<R: SyncRecord>(record: &R) {
        assert_eq!(record.to_values().unwrap().len(), R::COLUMNS.len());
    }

    #[test]
    fn value_count_matches_columns() {
        assert_columns_match(&Memo::new(1, "memo", "2024-05-01", 0));
        assert_columns_match(&DailyEntry::new("2024-05-01"));
        assert_columns_match(&UserStyle {
            style_id: 1,
            style_name: "plain".to_string(),
            style_vector: vec![0.1, 0.2],
            style_examples: vec!["short.".to_string()],
            style_prompt: serde_json::json!({"tone": "calm"}),
            sample_diary: String::new(),
        });
        assert_columns_match(&WeekSummary {
            start_date: "2024-04-29".to_string(),
            end_date: "2024-05-05".to_string(),
            diary_count: 3,
            emotion_analysis: serde_json::json!({}),
            highlights: serde_json::json!([]),
            insights: serde_json::json!({}),
            summary: serde_json::json!({}),
        });
    }

    #[test]
    fn dirty_state_round_trips_through_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let state: DirtyState = conn
            .query_row("SELECT ?1", [DirtyState::Tombstoned], |row| row.get(0))
            .unwrap();
        assert_eq!(state, DirtyState::Tombstoned);

        let invalid = conn.query_row("SELECT 'deleted'", [], |row| row.get::<_, DirtyState>(0));
        assert!(invalid.is_err());
    }
}
