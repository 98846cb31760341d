use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::filters::{Selections, clean_rollup_value};
use crate::record::{
    FIELD_CHALLENGE_DISLIKED, FIELD_CHALLENGE_FAVORITE, FIELD_CHILD_NAME, FIELD_PHONE,
    FILTER_FIELDS, PATTERN_FIELDS, Record,
};

/// Quotes sampled per category in the pattern summary.
const QUOTE_SAMPLE: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryStat {
    pub count: usize,
    pub quotes: Vec<String>,
}

/// Aggregated view over already-summarized records: per pattern, category
/// counts with sampled quotes, plus liked/disliked challenge tallies.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatternSummary {
    pub total_records_available: usize,
    pub records_fetched: usize,
    pub patterns: BTreeMap<String, BTreeMap<String, CategoryStat>>,
    pub most_liked_challenges: BTreeMap<String, usize>,
    pub most_disliked_challenges: BTreeMap<String, usize>,
}

fn normalize(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(|v| v.as_str().map(str::trim).map(str::to_string))
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => clean_rollup_value(value),
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

/// Comma-splits a challenge field and tallies each challenge, folding any
/// "Other ..." free-text variant into a single `Other` bucket.
fn tally_challenges(records: &[&Record], field: &str, counts: &mut BTreeMap<String, usize>) {
    let mut other = 0usize;
    for record in records {
        let Some(raw) = record.fields.get(field).and_then(normalize) else {
            continue;
        };
        for challenge in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if challenge.to_ascii_lowercase().starts_with("other") {
                other += 1;
            } else {
                *counts.entry(challenge.to_string()).or_default() += 1;
            }
        }
    }
    if other > 0 {
        counts.insert("Other".into(), other);
    }
}

/// Groups already-summarized records by pattern category and samples
/// quotes. Records are deduplicated by phone so each student counts once.
pub fn pattern_summary(records: &[Record], selections: &Selections) -> PatternSummary {
    let mut seen = HashSet::new();
    let unique: Vec<&Record> = records
        .iter()
        .filter(|r| match r.text(FIELD_PHONE) {
            Some(phone) => seen.insert(phone),
            None => false,
        })
        .collect();

    let filtered: Vec<&Record> = unique
        .iter()
        .copied()
        .filter(|r| matches_selection(r, selections))
        .collect();

    let mut rng = rand::thread_rng();
    let mut patterns = BTreeMap::new();
    for pattern in PATTERN_FIELDS {
        let mut categories: HashMap<String, CategoryStat> = HashMap::new();
        for record in &filtered {
            let Some(category) = record.fields.get(pattern).and_then(normalize) else {
                continue;
            };
            let stat = categories.entry(category).or_insert(CategoryStat {
                count: 0,
                quotes: Vec::new(),
            });
            stat.count += 1;
            if let Some(quote) = record
                .fields
                .get(&format!("{pattern} - quote"))
                .and_then(normalize)
            {
                stat.quotes.push(quote);
            }
        }
        if categories.is_empty() {
            continue;
        }
        let sampled: BTreeMap<String, CategoryStat> = categories
            .into_iter()
            .map(|(category, mut stat)| {
                stat.quotes.shuffle(&mut rng);
                stat.quotes.truncate(QUOTE_SAMPLE);
                (category, stat)
            })
            .collect();
        patterns.insert(pattern.to_string(), sampled);
    }

    let mut most_liked_challenges = BTreeMap::new();
    let mut most_disliked_challenges = BTreeMap::new();
    tally_challenges(&filtered, FIELD_CHALLENGE_FAVORITE, &mut most_liked_challenges);
    tally_challenges(
        &filtered,
        FIELD_CHALLENGE_DISLIKED,
        &mut most_disliked_challenges,
    );

    PatternSummary {
        total_records_available: unique.len(),
        records_fetched: filtered.len(),
        patterns,
        most_liked_challenges,
        most_disliked_challenges,
    }
}

/// Field projection the aggregator needs from the feedback table.
pub fn summary_query_fields() -> Vec<String> {
    let mut fields: Vec<String> = FILTER_FIELDS.iter().map(|(_, f)| f.to_string()).collect();
    for pattern in PATTERN_FIELDS {
        fields.push(pattern.to_string());
        fields.push(format!("{pattern} - term"));
        fields.push(format!("{pattern} - quote"));
    }
    fields.push(FIELD_CHILD_NAME.into());
    fields.push(FIELD_PHONE.into());
    fields.push(FIELD_CHALLENGE_FAVORITE.into());
    fields.push(FIELD_CHALLENGE_DISLIKED.into());
    fields
}
