use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::record::{FeedbackEntry, ProfileRecord, UidUpdate};
use crate::store::RecordStore;

/// Store-side batch limit for relationship backfills.
const UID_BATCH_SIZE: usize = 10;

/// Reduces a free-text phone value to its comparable tail: ASCII digits
/// only, one leading `1` country code dropped when a plausible subscriber
/// number remains, capped at the last 10 digits.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = match digits.strip_prefix('1') {
        Some(rest) if rest.len() >= 7 => rest.to_string(),
        _ => digits,
    };
    let tail = digits.len().saturating_sub(10);
    digits[tail..].to_string()
}

/// Computes the relationship backfills needed so every feedback entry whose
/// phone matches a known profile carries a link to it.
///
/// Profiles with duplicate normalized phones resolve last-write-wins, and
/// entries that already carry a link are skipped, so re-running the linker
/// is safe.
pub fn plan_uid_updates(
    profiles: &[ProfileRecord],
    entries: &[FeedbackEntry],
) -> Vec<UidUpdate> {
    let mut phone_to_profile: HashMap<String, &str> = HashMap::new();
    for profile in profiles {
        if let Some(phone) = &profile.phone_number {
            let normalized = normalize_phone(phone);
            if !normalized.is_empty() {
                phone_to_profile.insert(normalized, profile.id.as_str());
            }
        }
    }

    entries
        .iter()
        .filter(|e| e.child_uid.is_none() && !e.phone.is_empty())
        .filter_map(|e| {
            phone_to_profile
                .get(&normalize_phone(&e.phone))
                .map(|profile_id| UidUpdate {
                    entry_id: e.id.clone(),
                    profile_id: profile_id.to_string(),
                })
        })
        .collect()
}

/// Applies uid updates in fixed batches. A failed batch is logged and
/// skipped; later batches still run. Returns how many entries landed.
pub async fn apply_uid_updates(
    store: &Arc<dyn RecordStore>,
    table: &str,
    updates: Vec<UidUpdate>,
) -> usize {
    let total = updates.len();
    let mut linked = 0usize;
    for batch in updates.chunks(UID_BATCH_SIZE) {
        let records: Vec<_> = batch
            .iter()
            .cloned()
            .map(UidUpdate::into_record_update)
            .collect();
        match store.batch_update(table, &records).await {
            Ok(()) => linked += batch.len(),
            Err(e) => warn!(error = %e, batch = batch.len(), "uid batch update failed"),
        }
    }
    info!(linked, total, "uid linking complete");
    linked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, phone: &str) -> ProfileRecord {
        ProfileRecord {
            id: id.into(),
            phone_number: Some(phone.into()),
        }
    }

    fn entry(id: &str, phone: &str, uid: Option<&str>) -> FeedbackEntry {
        FeedbackEntry {
            id: id.into(),
            phone: phone.into(),
            child_name: "Ana".into(),
            child_uid: uid.map(Into::into),
            conversation: "hi".into(),
            created_at: None,
            summary_generated: false,
        }
    }

    #[test]
    fn normalizes_formatting_and_country_code() {
        assert_eq!(normalize_phone("+1-555-0100"), "5550100");
        assert_eq!(normalize_phone("5550100"), "5550100");
        assert_eq!(normalize_phone("(212) 555-0100"), "2125550100");
        assert_eq!(normalize_phone("+1 212 555 0100"), "2125550100");
        // Too short to be a country-coded number; the 1 stays.
        assert_eq!(normalize_phone("1234567"), "1234567");
        assert_eq!(normalize_phone("no digits"), "");
    }

    #[test]
    fn links_matching_unlinked_entry() {
        let updates = plan_uid_updates(
            &[profile("P1", "+1-555-0100")],
            &[entry("E1", "5550100", None)],
        );
        assert_eq!(
            updates,
            vec![UidUpdate {
                entry_id: "E1".into(),
                profile_id: "P1".into(),
            }]
        );
    }

    #[test]
    fn already_linked_entries_are_skipped() {
        let updates = plan_uid_updates(
            &[profile("P1", "5550100")],
            &[entry("E1", "5550100", Some("P1"))],
        );
        assert!(updates.is_empty());
    }

    #[test]
    fn unknown_phones_emit_nothing() {
        let updates = plan_uid_updates(
            &[profile("P1", "5550100")],
            &[entry("E1", "5550199", None)],
        );
        assert!(updates.is_empty());
    }

    #[test]
    fn duplicate_profile_phones_resolve_last_write_wins() {
        let updates = plan_uid_updates(
            &[profile("P1", "5550100"), profile("P2", "5550100")],
            &[entry("E1", "5550100", None)],
        );
        assert_eq!(updates[0].profile_id, "P2");
    }
}
