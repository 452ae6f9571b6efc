//! Request and response bodies of the `/api/db/sync` endpoint

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::SyncError;
use crate::db::{KindDelta, LocalSnapshot, SyncRecord};
use crate::models::{DailyEntry, Memo, UserStyle, WeekSummary, TEXT_MEMO_TYPE};
use crate::util::is_iso_date;

/// Accept a JSON document either inline or encoded as a string.
///
/// The server stores some columns as JSON text and may return them
/// undecoded. `null` maps to the default value.
fn json_or_text<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(T::default()),
        Value::String(text) => serde_json::from_str(&text)
            .or_else(|_| serde_json::from_value(Value::String(text)))
            .map_err(D::Error::custom),
        value => serde_json::from_value(value).map_err(D::Error::custom),
    }
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_memo_type() -> String {
    TEXT_MEMO_TYPE.to_string()
}

fn memo_type_or_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(text_memo_type))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoPayload {
    pub room_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    pub date: String,
    pub memo_order: i32,
    #[serde(
        rename = "type",
        default = "text_memo_type",
        deserialize_with = "memo_type_or_text"
    )]
    pub memo_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntryPayload {
    pub date: String,
    #[serde(default)]
    pub diary: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub ai_comment: Option<String>,
    #[serde(default)]
    pub emotion_score: Option<f64>,
    #[serde(default)]
    pub emotion_icon: Option<String>,
    #[serde(default)]
    pub theme_icon: Option<String>,
    #[serde(default, deserialize_with = "json_or_text")]
    pub photo_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStylePayload {
    pub style_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub style_name: String,
    #[serde(default, deserialize_with = "json_or_text")]
    pub style_vector: Vec<f32>,
    #[serde(default, deserialize_with = "json_or_text")]
    pub style_examples: Vec<String>,
    #[serde(default, deserialize_with = "json_or_text")]
    pub style_prompt: Value,
    #[serde(default)]
    pub sample_diary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummaryPayload {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub diary_count: Option<i64>,
    #[serde(default, deserialize_with = "json_or_text")]
    pub emotion_analysis: Value,
    #[serde(default, deserialize_with = "json_or_text")]
    pub highlights: Value,
    #[serde(default, deserialize_with = "json_or_text")]
    pub insights: Value,
    #[serde(default, deserialize_with = "json_or_text")]
    pub summary: Value,
}

impl From<&Memo> for MemoPayload {
    fn from(memo: &Memo) -> Self {
        Self {
            room_id: memo.id,
            content: memo.content.clone(),
            timestamp: memo.timestamp.clone(),
            date: memo.date.clone(),
            memo_order: memo.order,
            memo_type: memo.memo_type.clone(),
        }
    }
}

impl From<&DailyEntry> for DailyEntryPayload {
    fn from(entry: &DailyEntry) -> Self {
        Self {
            date: entry.date.clone(),
            diary: entry.diary.clone(),
            keywords: entry.keywords.clone(),
            ai_comment: entry.ai_comment.clone(),
            emotion_score: entry.emotion_score,
            emotion_icon: entry.emotion_icon.clone(),
            theme_icon: entry.theme_icon.clone(),
            photo_urls: entry.photo_urls.clone(),
        }
    }
}

impl From<&UserStyle> for UserStylePayload {
    fn from(style: &UserStyle) -> Self {
        Self {
            style_id: style.style_id,
            style_name: style.style_name.clone(),
            style_vector: style.style_vector.clone(),
            style_examples: style.style_examples.clone(),
            style_prompt: style.style_prompt.clone(),
            sample_diary: Some(style.sample_diary.clone()),
        }
    }
}

impl From<&WeekSummary> for WeekSummaryPayload {
    fn from(summary: &WeekSummary) -> Self {
        Self {
            start_date: summary.start_date.clone(),
            end_date: summary.end_date.clone(),
            diary_count: Some(summary.diary_count),
            emotion_analysis: summary.emotion_analysis.clone(),
            highlights: summary.highlights.clone(),
            insights: summary.insights.clone(),
            summary: summary.summary.clone(),
        }
    }
}

fn require_date(kind: &str, field: &str, value: &str) -> Result<(), SyncError> {
    if is_iso_date(value) {
        Ok(())
    } else {
        Err(SyncError::Data(format!(
            "{kind} has invalid {field} '{value}'"
        )))
    }
}

impl TryFrom<MemoPayload> for Memo {
    type Error = SyncError;

    fn try_from(payload: MemoPayload) -> Result<Self, SyncError> {
        require_date("memo", "date", &payload.date)?;
        Ok(Self {
            id: payload.room_id,
            content: payload.content,
            timestamp: payload.timestamp,
            date: payload.date,
            order: payload.memo_order,
            memo_type: payload.memo_type,
        })
    }
}

impl TryFrom<DailyEntryPayload> for DailyEntry {
    type Error = SyncError;

    fn try_from(payload: DailyEntryPayload) -> Result<Self, SyncError> {
        require_date("dailyEntry", "date", &payload.date)?;
        Ok(Self {
            date: payload.date,
            diary: payload.diary,
            keywords: payload.keywords,
            ai_comment: payload.ai_comment,
            emotion_score: payload.emotion_score,
            emotion_icon: payload.emotion_icon,
            theme_icon: payload.theme_icon,
            photo_urls: payload.photo_urls,
        })
    }
}

impl TryFrom<UserStylePayload> for UserStyle {
    type Error = SyncError;

    fn try_from(payload: UserStylePayload) -> Result<Self, SyncError> {
        Ok(Self {
            style_id: payload.style_id,
            style_name: payload.style_name,
            style_vector: payload.style_vector,
            style_examples: payload.style_examples,
            style_prompt: payload.style_prompt,
            sample_diary: payload.sample_diary.unwrap_or_default(),
        })
    }
}

impl TryFrom<WeekSummaryPayload> for WeekSummary {
    type Error = SyncError;

    fn try_from(payload: WeekSummaryPayload) -> Result<Self, SyncError> {
        require_date("weekSummary", "startDate", &payload.start_date)?;
        require_date("weekSummary", "endDate", &payload.end_date)?;
        Ok(Self {
            start_date: payload.start_date,
            end_date: payload.end_date,
            diary_count: payload.diary_count.unwrap_or(0),
            emotion_analysis: payload.emotion_analysis,
            highlights: payload.highlights,
            insights: payload.insights,
            summary: payload.summary,
        })
    }
}

/// Reference to a locally deleted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone<K> {
    pub key: K,
    pub deleted: bool,
}

/// One element of a kind's push list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PushEntry<K, P> {
    Deleted(Tombstone<K>),
    Edited(P),
}

impl<K, P> PushEntry<K, P> {
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }
}

/// Composite push body covering all four kinds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub memo: Vec<PushEntry<i64, MemoPayload>>,
    pub daily_entry: Vec<PushEntry<String, DailyEntryPayload>>,
    pub user_style: Vec<PushEntry<i64, UserStylePayload>>,
    pub week_summary: Vec<PushEntry<String, WeekSummaryPayload>>,
}

fn push_entries<R, P>(delta: &KindDelta<R>) -> Vec<PushEntry<R::Key, P>>
where
    R: SyncRecord,
    P: for<'a> From<&'a R>,
{
    let tombstones = delta.tombstones.iter().map(|stored| {
        PushEntry::Deleted(Tombstone {
            key: stored.record.key(),
            deleted: true,
        })
    });
    let edits = delta
        .edits
        .iter()
        .map(|stored| PushEntry::Edited(P::from(&stored.record)));
    tombstones.chain(edits).collect()
}

impl From<&crate::db::DirtySet> for PushPayload {
    fn from(dirty: &crate::db::DirtySet) -> Self {
        Self {
            memo: push_entries(&dirty.memo),
            daily_entry: push_entries(&dirty.daily_entry),
            user_style: push_entries(&dirty.user_style),
            week_summary: push_entries(&dirty.week_summary),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Error,
}

/// Application-level push result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    pub status: AckStatus,
    #[serde(default)]
    pub message: String,
}

impl PushAck {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AckStatus::Success
    }
}

/// Complete server dataset for the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    #[serde(default)]
    pub memo: Vec<MemoPayload>,
    #[serde(default)]
    pub daily_entry: Vec<DailyEntryPayload>,
    #[serde(default)]
    pub user_style: Vec<UserStylePayload>,
    #[serde(default)]
    pub week_summary: Vec<WeekSummaryPayload>,
}

fn convert_all<P, R>(payloads: Vec<P>) -> Result<Vec<R>, SyncError>
where
    R: TryFrom<P, Error = SyncError>,
{
    payloads.into_iter().map(R::try_from).collect()
}

impl TryFrom<RemoteSnapshot> for LocalSnapshot {
    type Error = SyncError;

    fn try_from(snapshot: RemoteSnapshot) -> Result<Self, SyncError> {
        Ok(Self {
            memos: convert_all(snapshot.memo)?,
            daily_entries: convert_all(snapshot.daily_entry)?,
            user_styles: convert_all(snapshot.user_style)?,
            week_summaries: convert_all(snapshot.week_summary)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DirtySet;
    use crate::models::{DirtyState, Stored};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn push_payload_uses_server_field_names() {
        let memo = Memo {
            id: 3,
            content: "Lunch with Mina".to_string(),
            timestamp: "12:30".to_string(),
            date: "2024-05-01".to_string(),
            order: 2,
            memo_type: TEXT_MEMO_TYPE.to_string(),
        };
        let mut entry = DailyEntry::new("2024-04-30");
        entry.ai_comment = Some("Nice".to_string());
        let dirty = DirtySet {
            memo: KindDelta {
                tombstones: vec![Stored {
                    record: Memo::new(9, "gone", "2024-05-01", 0),
                    state: DirtyState::Tombstoned,
                    revision: 4,
                }],
                edits: vec![Stored {
                    record: memo,
                    state: DirtyState::Edited,
                    revision: 1,
                }],
            },
            daily_entry: KindDelta {
                tombstones: Vec::new(),
                edits: vec![Stored {
                    record: entry,
                    state: DirtyState::Edited,
                    revision: 1,
                }],
            },
            ..DirtySet::default()
        };

        let body = serde_json::to_value(PushPayload::from(&dirty)).unwrap();

        assert_eq!(
            body["memo"],
            json!([
                {"key": 9, "deleted": true},
                {
                    "room_id": 3,
                    "content": "Lunch with Mina",
                    "timestamp": "12:30",
                    "date": "2024-05-01",
                    "memo_order": 2,
                    "type": "text"
                }
            ])
        );
        assert_eq!(body["dailyEntry"][0]["aiComment"], json!("Nice"));
        assert_eq!(body["userStyle"], json!([]));
        assert_eq!(body["weekSummary"], json!([]));
    }

    #[test]
    fn push_entries_decode_back_by_shape() {
        let body = json!({
            "memo": [{"key": 1, "deleted": true}],
            "dailyEntry": [{"date": "2024-05-01", "diary": "hi"}],
            "userStyle": [],
            "weekSummary": []
        });
        let payload: PushPayload = serde_json::from_value(body).unwrap();
        assert!(payload.memo[0].is_deleted());
        assert!(!payload.daily_entry[0].is_deleted());
    }

    #[test]
    fn snapshot_accepts_json_encoded_columns() {
        let body = json!({
            "memo": [],
            "dailyEntry": [{"date": "2024-05-01", "photoUrls": "[\"https://cdn/a.jpg\"]"}],
            "userStyle": [{
                "styleId": 2,
                "styleName": "Calm",
                "styleVector": "[0.5, 1.0]",
                "styleExamples": ["one"],
                "stylePrompt": "{\"tone\":\"warm\"}",
                "sampleDiary": null
            }],
            "weekSummary": [{
                "startDate": "2024-04-29",
                "endDate": "2024-05-05",
                "diaryCount": null,
                "highlights": "[]",
                "summary": "plain text"
            }]
        });

        let snapshot: RemoteSnapshot = serde_json::from_value(body).unwrap();
        let local = LocalSnapshot::try_from(snapshot).unwrap();

        assert_eq!(local.daily_entries[0].photo_urls, vec!["https://cdn/a.jpg"]);
        assert_eq!(local.user_styles[0].style_vector, vec![0.5, 1.0]);
        assert_eq!(local.user_styles[0].style_prompt, json!({"tone": "warm"}));
        assert_eq!(local.user_styles[0].sample_diary, "");
        assert_eq!(local.week_summaries[0].diary_count, 0);
        assert_eq!(local.week_summaries[0].highlights, json!([]));
        assert_eq!(local.week_summaries[0].summary, json!("plain text"));
        assert_eq!(local.week_summaries[0].insights, Value::Null);
    }

    #[test]
    fn snapshot_null_columns_take_local_defaults() {
        let body = json!({
            "memo": [{
                "room_id": 4,
                "content": null,
                "timestamp": null,
                "date": "2024-05-01",
                "memo_order": 0,
                "type": null
            }, {
                "room_id": 5,
                "date": "2024-05-01",
                "memo_order": 1
            }],
            "userStyle": [{"styleId": 1, "styleName": ""}, {"styleId": 2, "styleName": null}]
        });

        let snapshot: RemoteSnapshot = serde_json::from_value(body).unwrap();
        let local = LocalSnapshot::try_from(snapshot).unwrap();

        for memo in &local.memos {
            assert_eq!(memo.content, "");
            assert_eq!(memo.timestamp, "");
            assert_eq!(memo.memo_type, TEXT_MEMO_TYPE);
        }
        assert_eq!(local.memos.len(), 2);
        assert_eq!(local.user_styles.len(), 2);
        assert_eq!(local.user_styles[0].style_name, "");
        assert_eq!(local.user_styles[1].style_name, "");
    }

    #[test]
    fn snapshot_missing_kinds_default_to_empty() {
        let snapshot: RemoteSnapshot = serde_json::from_str("{}").unwrap();
        let local = LocalSnapshot::try_from(snapshot).unwrap();
        assert_eq!(local, LocalSnapshot::default());
    }

    #[test]
    fn snapshot_conversion_rejects_bad_dates() {
        let snapshot = RemoteSnapshot {
            daily_entry: vec![DailyEntryPayload::from(&DailyEntry::new("yesterday"))],
            ..RemoteSnapshot::default()
        };
        assert!(matches!(
            LocalSnapshot::try_from(snapshot),
            Err(SyncError::Data(_))
        ));
    }

    #[test]
    fn ack_parses_status() {
        let ack: PushAck =
            serde_json::from_str(r#"{"status":"error","message":"db down"}"#).unwrap();
        assert_eq!(ack, PushAck::error("db down"));
        assert!(!ack.is_success());
        assert!(serde_json::from_str::<PushAck>(r#"{"status":"maybe"}"#).is_err());
    }
}
