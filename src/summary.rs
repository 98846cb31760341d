use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[a-zA-Z]*\s*|```\s*$").expect("valid regex"));

/// Error raised when a model response cannot be read as a summary batch.
#[derive(Debug, thiserror::Error)]
pub enum SummaryParseError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response is not a JSON array")]
    NotAnArray,
}

/// One pattern reading: category label, representative term, illustrative
/// quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatternReading {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub quote: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HighlightQuote {
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One student's generated summary as emitted by the completion service.
///
/// Every field is defaulted so a partially filled response still parses;
/// the applier maps missing values to empty store fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneratedSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub reflection_depth: String,
    #[serde(default)]
    pub challenge_favorite: String,
    #[serde(default)]
    pub challenge_disliked: String,
    #[serde(default)]
    pub highlight_quotes: Vec<HighlightQuote>,
    #[serde(default)]
    pub patterns: HashMap<String, PatternReading>,
    #[serde(default)]
    pub record_ids: Vec<String>,
}

/// Removes surrounding markdown code-fence markup from a raw model
/// response. Models are told to answer with bare JSON but frequently wrap
/// it anyway.
pub fn strip_code_fences(raw: &str) -> String {
    FENCE_RE.replace_all(raw.trim(), "").trim().to_string()
}

/// Parses one cache unit (one model response) into its summary batch.
pub fn parse_summary_batch(text: &str) -> Result<Vec<GeneratedSummary>, SummaryParseError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_array() {
        return Err(SummaryParseError::NotAnArray);
    }
    Ok(serde_json::from_value(value)?)
}
