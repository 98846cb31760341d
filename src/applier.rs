use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache_log::CacheLog;
use crate::record::{FIELD_CHILD_NAME, FIELD_PHONE, summary_fields};
use crate::store::RecordStore;
use crate::summary::{GeneratedSummary, parse_summary_batch, strip_code_fences};

/// Worker limit for per-record store updates.
const UPDATE_CONCURRENCY: usize = 4;

/// Outcome counts for one apply pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApplyReport {
    pub units: usize,
    pub units_skipped: usize,
    pub summaries: usize,
    pub applied: usize,
}

/// Drains the cache log into record-store field updates.
///
/// Idempotent across repeated invocations on the same log content: every
/// write is an absolute overwrite. The log is deleted only after the whole
/// update loop has run, which makes the applier safe to re-invoke on its
/// own after a crash between generation and apply.
pub struct CacheApplier {
    store: Arc<dyn RecordStore>,
    log: Arc<dyn CacheLog>,
    table: String,
}

impl CacheApplier {
    pub fn new(store: Arc<dyn RecordStore>, log: Arc<dyn CacheLog>, table: impl Into<String>) -> Self {
        Self {
            store,
            log,
            table: table.into(),
        }
    }

    pub async fn apply(&self) -> anyhow::Result<ApplyReport> {
        if !self.log.exists() {
            info!("no cache log present, nothing to apply");
            return Ok(ApplyReport::default());
        }

        let mut report = ApplyReport::default();
        let mut summaries: Vec<GeneratedSummary> = Vec::new();
        for unit in self.log.read_entries()? {
            report.units += 1;
            match parse_summary_batch(&strip_code_fences(&unit)) {
                Ok(batch) => summaries.extend(batch),
                Err(e) => {
                    let head: String = unit.chars().take(80).collect();
                    warn!(error = %e, %head, "skipping unparseable cache unit");
                    report.units_skipped += 1;
                }
            }
        }
        report.summaries = summaries.len();
        info!(summaries = report.summaries, units = report.units, "loaded cache log");

        let index = self.phone_name_index().await?;

        let mut updates: Vec<(String, GeneratedSummary)> = Vec::new();
        for summary in summaries {
            let phone = summary.phone.trim();
            let name = summary.name.trim();
            if phone.is_empty() || name.is_empty() {
                warn!(?summary, "summary missing phone or name, skipping");
                continue;
            }
            let ids: Vec<String> = if summary.record_ids.is_empty() {
                index
                    .get(&(phone.to_string(), name.to_string()))
                    .cloned()
                    .unwrap_or_default()
            } else {
                summary.record_ids.clone()
            };
            if ids.is_empty() {
                warn!(%name, %phone, "summary matches no record, dropping");
                continue;
            }
            for id in ids {
                updates.push((id, summary.clone()));
            }
        }

        // Per-record updates are mutually independent, so a small bounded
        // fan-out is safe; failures stay isolated per record.
        let planned = updates.len();
        report.applied = stream::iter(updates)
            .map(|(id, summary)| async move {
                match self
                    .store
                    .update(&self.table, &id, summary_fields(&summary), true)
                    .await
                {
                    Ok(()) => 1usize,
                    Err(e) => {
                        warn!(error = %e, %id, "record update failed");
                        0
                    }
                }
            })
            .buffer_unordered(UPDATE_CONCURRENCY)
            .fold(0, |acc, n| async move { acc + n })
            .await;

        // Consumption marker: only after the update loop, success or not.
        self.log.delete()?;
        info!(applied = report.applied, planned, "cache log drained and deleted");
        Ok(report)
    }

    /// Fallback resolution index from a fresh read of the feedback table.
    /// Duplicate rows for one student accumulate.
    async fn phone_name_index(&self) -> anyhow::Result<HashMap<(String, String), Vec<String>>> {
        let records = self
            .store
            .query(&self.table, &[FIELD_PHONE, FIELD_CHILD_NAME])
            .await?;
        let mut index: HashMap<(String, String), Vec<String>> = HashMap::new();
        for record in records {
            if let (Some(phone), Some(name)) =
                (record.text(FIELD_PHONE), record.text(FIELD_CHILD_NAME))
            {
                index.entry((phone, name)).or_default().push(record.id);
            }
        }
        Ok(index)
    }
}
