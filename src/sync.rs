use std::sync::Arc;
use tracing::info;

use crate::applier::CacheApplier;
use crate::cache_log::CacheLog;
use crate::grouper::groups_needing_summary;
use crate::linker::{apply_uid_updates, plan_uid_updates};
use crate::llm::CompletionClient;
use crate::record::{
    FIELD_CHILD_NAME, FIELD_CHILD_UID, FIELD_CONVERSATION, FIELD_CREATED, FIELD_PHONE,
    FIELD_PHONE_NUMBER, FIELD_SUMMARY_GENERATED, FeedbackEntry, ProfileRecord,
};
use crate::store::RecordStore;
use crate::summarizer::BatchSummarizer;

/// Table names the pipeline operates on.
#[derive(Debug, Clone)]
pub struct Tables {
    pub profiles: String,
    pub feedback: String,
}

/// Counts accumulated across one full pipeline run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub linked: usize,
    pub groups: usize,
    pub chunks_ok: usize,
    pub chunks_failed: usize,
    pub applied: usize,
}

impl SyncReport {
    pub fn message(&self) -> String {
        format!(
            "linked {} records, {} groups pending, {} chunks summarized ({} failed), applied {} updates",
            self.linked, self.groups, self.chunks_ok, self.chunks_failed, self.applied
        )
    }
}

/// The sync-and-summarize pipeline: linker, grouper, batch summarizer,
/// then cache applier, each stage isolated from the failures of the last.
pub struct SyncService {
    store: Arc<dyn RecordStore>,
    llm: Arc<dyn CompletionClient>,
    log: Arc<dyn CacheLog>,
    tables: Tables,
    prompt_template: String,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        llm: Arc<dyn CompletionClient>,
        log: Arc<dyn CacheLog>,
        tables: Tables,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            store,
            llm,
            log,
            tables,
            prompt_template: prompt_template.into(),
        }
    }

    pub async fn run(&self) -> anyhow::Result<SyncReport> {
        let mut report = SyncReport::default();

        let profiles: Vec<ProfileRecord> = self
            .store
            .query(&self.tables.profiles, &[FIELD_PHONE_NUMBER])
            .await?
            .iter()
            .map(ProfileRecord::from_record)
            .collect();
        let entries: Vec<FeedbackEntry> = self
            .store
            .query(
                &self.tables.feedback,
                &[
                    FIELD_PHONE,
                    FIELD_CHILD_UID,
                    FIELD_CHILD_NAME,
                    FIELD_CONVERSATION,
                    FIELD_CREATED,
                    FIELD_SUMMARY_GENERATED,
                ],
            )
            .await?
            .iter()
            .map(FeedbackEntry::from_record)
            .collect();
        info!(profiles = profiles.len(), entries = entries.len(), "fetched records");

        let updates = plan_uid_updates(&profiles, &entries);
        report.linked = apply_uid_updates(&self.store, &self.tables.feedback, updates).await;

        let groups = groups_needing_summary(&entries);
        report.groups = groups.len();
        info!(groups = groups.len(), "groups needing summaries");

        let summarizer = BatchSummarizer::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.log),
            self.prompt_template.clone(),
        );
        let summarized = summarizer.run(&groups).await;
        report.chunks_ok = summarized.chunks_ok;
        report.chunks_failed = summarized.chunks_failed;

        let applied = self.applier().apply().await?;
        report.applied = applied.applied;

        info!(?report, "sync complete");
        Ok(report)
    }

    /// The applier alone, for crash recovery with no new generation.
    pub fn applier(&self) -> CacheApplier {
        CacheApplier::new(
            Arc::clone(&self.store),
            Arc::clone(&self.log),
            self.tables.feedback.clone(),
        )
    }
}
