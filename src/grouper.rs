use std::collections::HashMap;

use crate::record::FeedbackEntry;

/// All feedback rows sharing a `(phone, name)` pair, treated as one
/// student's full history.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentGroup {
    pub phone: String,
    pub name: String,
    /// Member conversations joined with newlines, oldest first.
    pub combined_conversation: String,
    /// Member record ids in the same chronological order.
    pub record_ids: Vec<String>,
    /// True when at least one member still lacks a generated summary.
    pub needs_summary: bool,
}

/// Partitions entries into student groups.
///
/// Rows with an empty phone, name or conversation are dropped: they can
/// neither be summarized nor matched back later. Members are ordered by
/// creation time with the record id as tie-break so the combined
/// conversation is byte-identical across runs over the same data.
pub fn build_groups(entries: &[FeedbackEntry]) -> Vec<StudentGroup> {
    let mut by_key: HashMap<(String, String), Vec<&FeedbackEntry>> = HashMap::new();
    let mut order: Vec<(String, String)> = Vec::new();
    for entry in entries {
        let phone = entry.phone.trim();
        let name = entry.child_name.trim();
        if phone.is_empty() || name.is_empty() || entry.conversation.trim().is_empty() {
            continue;
        }
        let key = (phone.to_string(), name.to_string());
        let members = by_key.entry(key.clone()).or_default();
        if members.is_empty() {
            order.push(key);
        }
        members.push(entry);
    }

    order
        .into_iter()
        .map(|key| {
            let mut members = by_key.remove(&key).unwrap_or_default();
            members.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
            let combined_conversation = members
                .iter()
                .map(|m| m.conversation.trim())
                .collect::<Vec<_>>()
                .join("\n");
            StudentGroup {
                phone: key.0,
                name: key.1,
                record_ids: members.iter().map(|m| m.id.clone()).collect(),
                needs_summary: members.iter().any(|m| !m.summary_generated),
                combined_conversation,
            }
        })
        .collect()
}

/// The groups the batch summarizer should process.
pub fn groups_needing_summary(entries: &[FeedbackEntry]) -> Vec<StudentGroup> {
    build_groups(entries)
        .into_iter()
        .filter(|g| g.needs_summary)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(
        id: &str,
        phone: &str,
        name: &str,
        conversation: &str,
        created_secs: Option<i64>,
        summarized: bool,
    ) -> FeedbackEntry {
        FeedbackEntry {
            id: id.into(),
            phone: phone.into(),
            child_name: name.into(),
            child_uid: None,
            conversation: conversation.into(),
            created_at: created_secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            summary_generated: summarized,
        }
    }

    #[test]
    fn grouping_is_a_partition_of_complete_entries() {
        let entries = vec![
            entry("E1", "5550100", "Ana", "a", Some(1), false),
            entry("E2", "5550100", "Ana", "b", Some(2), false),
            entry("E3", "5550101", "Ben", "c", Some(3), false),
            entry("E4", "", "Nameless", "d", Some(4), false),
            entry("E5", "5550102", "Cara", "", Some(5), false),
        ];
        let groups = build_groups(&entries);
        let member_count: usize = groups.iter().map(|g| g.record_ids.len()).sum();
        assert_eq!(groups.len(), 2);
        assert_eq!(member_count, 3);
        assert!(groups.iter().all(|g| !g.record_ids.is_empty()));
    }

    #[test]
    fn mixed_group_still_needs_summary_and_joins_in_order() {
        let entries = vec![
            entry("E2", "5550100", "Ana", "B", Some(2), false),
            entry("E1", "5550100", "Ana", "A", Some(1), true),
        ];
        let groups = groups_needing_summary(&entries);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].needs_summary);
        assert_eq!(groups[0].combined_conversation, "A\nB");
        assert_eq!(groups[0].record_ids, vec!["E1", "E2"]);
    }

    #[test]
    fn fully_summarized_groups_are_excluded() {
        let entries = vec![entry("E1", "5550100", "Ana", "A", Some(1), true)];
        assert!(groups_needing_summary(&entries).is_empty());
        assert_eq!(build_groups(&entries).len(), 1);
    }

    #[test]
    fn equal_timestamps_tie_break_on_id() {
        let entries = vec![
            entry("E2", "5550100", "Ana", "second", Some(1), false),
            entry("E1", "5550100", "Ana", "first", Some(1), false),
        ];
        let groups = build_groups(&entries);
        assert_eq!(groups[0].combined_conversation, "first\nsecond");
    }

    #[test]
    fn keys_are_trimmed_but_not_normalized() {
        let entries = vec![
            entry("E1", " 5550100 ", "Ana", "a", Some(1), false),
            entry("E2", "5550100", "Ana ", "b", Some(2), false),
            entry("E3", "+1-555-0100", "Ana", "c", Some(3), false),
        ];
        let groups = build_groups(&entries);
        // Trimming merges the first two; the formatted variant stays its
        // own group.
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].record_ids, vec!["E1", "E2"]);
    }
}
