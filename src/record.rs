use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::summary::GeneratedSummary;

/// The eight reflection patterns a conversation is classified against.
///
/// Each pattern owns three store columns: the base column holds the
/// category label, `" - term"` a representative term and `" - quote"` an
/// illustrative quote.
pub const PATTERN_FIELDS: [&str; 8] = [
    "Engagement & Enjoyment",
    "Creativity & Pride in Building",
    "Challenges Faced & Problem-Solving",
    "Teamwork Dynamics",
    "Mentor Support & Relationship",
    "Suggestions for Improvement",
    "Recommendation Sentiment",
    "Overall Sentiment",
];

pub const FIELD_PHONE_NUMBER: &str = "Phone number";
pub const FIELD_PHONE: &str = "Phone";
pub const FIELD_CHILD_UID: &str = "Child UID";
pub const FIELD_CHILD_NAME: &str = "Child Name";
pub const FIELD_CONVERSATION: &str = "Conversation";
pub const FIELD_CREATED: &str = "Created";
pub const FIELD_SUMMARY_GENERATED: &str = "Summary Generated";
pub const FIELD_REFLECTION_DEPTH: &str = "Reflection Depth";
pub const FIELD_CHALLENGE_FAVORITE: &str = "Challenge Favorite";
pub const FIELD_CHALLENGE_DISLIKED: &str = "Challenge Disliked";
pub const FIELD_HIGHLIGHT_QUOTE_1: &str = "Highlight Quote 1";
pub const FIELD_HIGHLIGHT_QUOTE_2: &str = "Highlight Quote 2";
pub const FIELD_TAGS_1: &str = "Tags 1";
pub const FIELD_TAGS_2: &str = "Tags 2";

/// Rollup columns the dashboard filters on, keyed by their dashboard label.
pub const FILTER_FIELDS: [(&str, &str); 5] = [
    ("City", "City Rollup (from Child UID)"),
    ("Cohort", "Cohort Rollup (from Child UID)"),
    ("Batch", "Batches Rollup (from Child UID)"),
    ("Gender", "Child Gender Rollup (from Child UID)"),
    ("Grade", "Child Grade Rollup (from Child UID)"),
];

/// A raw record as returned by the record store: an opaque id plus a bag of
/// named field values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Field value as a trimmed string, or `None` when absent or non-text.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field) {
            Some(Value::String(s)) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A field update destined for the record store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordUpdate {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Read-only row from the profiles table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub id: String,
    pub phone_number: Option<String>,
}

impl ProfileRecord {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            phone_number: record.text(FIELD_PHONE_NUMBER),
        }
    }
}

/// Typed view of a feedback row. Absent text fields decode to empty
/// strings; the grouper drops rows it cannot summarize.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackEntry {
    pub id: String,
    pub phone: String,
    pub child_name: String,
    pub child_uid: Option<String>,
    pub conversation: String,
    pub created_at: Option<DateTime<Utc>>,
    pub summary_generated: bool,
}

impl FeedbackEntry {
    pub fn from_record(record: &Record) -> Self {
        let child_uid = match record.fields.get(FIELD_CHILD_UID) {
            Some(Value::Array(links)) => links
                .first()
                .and_then(Value::as_str)
                .map(|s| s.to_string()),
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        };
        let created_at = record
            .text(FIELD_CREATED)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Self {
            id: record.id.clone(),
            phone: record.text(FIELD_PHONE).unwrap_or_default(),
            child_name: record.text(FIELD_CHILD_NAME).unwrap_or_default(),
            child_uid,
            conversation: record.text(FIELD_CONVERSATION).unwrap_or_default(),
            created_at,
            summary_generated: record
                .fields
                .get(FIELD_SUMMARY_GENERATED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

/// Relationship backfill queued by the linker.
#[derive(Debug, Clone, PartialEq)]
pub struct UidUpdate {
    pub entry_id: String,
    pub profile_id: String,
}

impl UidUpdate {
    /// The store payload: the uid column is a link array.
    pub fn into_record_update(self) -> RecordUpdate {
        let mut fields = Map::new();
        fields.insert(FIELD_CHILD_UID.into(), json!([self.profile_id]));
        RecordUpdate {
            id: self.entry_id,
            fields,
        }
    }
}

/// Builds the full field payload for one summarized record.
///
/// Every value is an absolute overwrite and missing source values map to
/// empty strings or empty arrays, never null, so repeated application of
/// the same summary is a no-op on store state.
pub fn summary_fields(summary: &GeneratedSummary) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        FIELD_REFLECTION_DEPTH.into(),
        Value::String(summary.reflection_depth.clone()),
    );
    fields.insert(
        FIELD_CHALLENGE_FAVORITE.into(),
        Value::String(summary.challenge_favorite.clone()),
    );
    fields.insert(
        FIELD_CHALLENGE_DISLIKED.into(),
        Value::String(summary.challenge_disliked.clone()),
    );

    let quote = |idx: usize| -> String {
        summary
            .highlight_quotes
            .get(idx)
            .map(|h| h.quote.clone())
            .unwrap_or_default()
    };
    let tags = |idx: usize| -> Value {
        let tags = summary
            .highlight_quotes
            .get(idx)
            .map(|h| h.tags.clone())
            .unwrap_or_default();
        Value::Array(tags.into_iter().map(Value::String).collect())
    };
    fields.insert(FIELD_HIGHLIGHT_QUOTE_1.into(), Value::String(quote(0)));
    fields.insert(FIELD_HIGHLIGHT_QUOTE_2.into(), Value::String(quote(1)));
    fields.insert(FIELD_TAGS_1.into(), tags(0));
    fields.insert(FIELD_TAGS_2.into(), tags(1));

    for pattern in PATTERN_FIELDS {
        let reading = summary.patterns.get(pattern);
        let pick = |f: fn(&crate::summary::PatternReading) -> &String| -> Value {
            Value::String(reading.map(|r| f(r).clone()).unwrap_or_default())
        };
        fields.insert(pattern.into(), pick(|r| &r.category));
        fields.insert(format!("{pattern} - term"), pick(|r| &r.term));
        fields.insert(format!("{pattern} - quote"), pick(|r| &r.quote));
    }

    // The column is a checkbox behind typecast; "true" matches what the
    // store coerces.
    fields.insert(FIELD_SUMMARY_GENERATED.into(), Value::String("true".into()));
    fields
}
