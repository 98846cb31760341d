use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::record::{FIELD_CHILD_NAME, FIELD_PHONE, FILTER_FIELDS, Record};

/// A partial dropdown selection, keyed by dashboard label.
pub type Selections = HashMap<String, Vec<String>>;

/// Still-valid option values per dimension given a partial selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterResponse {
    pub options: BTreeMap<String, Vec<String>>,
    pub filtered_record_count: usize,
}

/// Unwraps rollup values the store hands back: JSON-encoded strings and
/// single-element arrays collapse to their inner value.
pub fn clean_rollup_value(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(s) => {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                if !matches!(parsed, Value::Number(_)) {
                    return clean_rollup_value(&parsed);
                }
            }
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) => match items.len() {
            0 => None,
            1 => clean_rollup_value(&items[0]),
            _ => Some(
                items
                    .iter()
                    .filter_map(clean_rollup_value)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        },
        other => Some(other.to_string()),
    }
}

fn matches_selection(record: &Record, selections: &Selections) -> bool {
    FILTER_FIELDS.iter().all(|(label, field)| {
        let selected = selections.get(*label).map(Vec::as_slice).unwrap_or(&[]);
        if selected.is_empty() {
            return true;
        }
        record
            .fields
            .get(*field)
            .and_then(clean_rollup_value)
            .map(|value| selected.iter().any(|s| s == &value))
            .unwrap_or(false)
    })
}

fn collect_options(records: &[&Record], field: &str) -> BTreeSet<String> {
    let mut values = BTreeSet::new();
    for record in records {
        if let Some(raw) = record.fields.get(field) {
            match raw {
                // Multi-value rollups contribute each element.
                Value::Array(items) if items.len() > 1 => {
                    values.extend(items.iter().filter_map(clean_rollup_value));
                }
                other => {
                    if let Some(v) = clean_rollup_value(other) {
                        values.insert(v);
                    }
                }
            }
        }
    }
    values
}

/// Maps a partial selection to the set of still-valid option values.
///
/// Rows are deduplicated by `(phone, name)` first so one student counts
/// once. A dimension that ends up with no options under the current
/// selection falls back to the options over all rows, which also covers
/// the initial unfiltered load.
pub fn filter_options(records: &[Record], selections: &Selections) -> FilterResponse {
    let mut seen = HashSet::new();
    let unique: Vec<&Record> = records
        .iter()
        .filter(|r| {
            let key = (
                r.text(FIELD_PHONE).unwrap_or_default(),
                r.text(FIELD_CHILD_NAME).unwrap_or_default(),
            );
            seen.insert(key)
        })
        .collect();

    let filtered: Vec<&Record> = unique
        .iter()
        .copied()
        .filter(|r| matches_selection(r, selections))
        .collect();

    let mut options = BTreeMap::new();
    for (label, field) in FILTER_FIELDS {
        let mut values = collect_options(&filtered, field);
        if values.is_empty() {
            values = collect_options(&unique, field);
        }
        options.insert(label.to_string(), values.into_iter().collect());
    }

    FilterResponse {
        options,
        filtered_record_count: filtered.len(),
    }
}
