//! Backend of a student-feedback dashboard: links feedback rows to student
//! profiles in an external record store, derives per-student conversation
//! groups, drives a completion service in bounded batches, persists raw
//! model output to a durable cache log, and idempotently applies parsed
//! summaries back to the store.

pub mod args;
mod applier;
mod cache_log;
mod filters;
mod grouper;
mod linker;
mod llm;
pub mod logger;
mod pattern_summary;
mod prompt;
mod record;
mod server;
mod store;
mod summarizer;
mod summary;
mod sync;

pub use applier::{ApplyReport, CacheApplier};
pub use cache_log::{CacheLog, FileCacheLog, MemoryCacheLog};
pub use filters::{FilterResponse, Selections, filter_options};
pub use grouper::{StudentGroup, build_groups, groups_needing_summary};
pub use linker::{apply_uid_updates, normalize_phone, plan_uid_updates};
pub use llm::{CompletionClient, OllamaClient};
pub use pattern_summary::{PatternSummary, pattern_summary, summary_query_fields};
pub use prompt::{DEFAULT_PROMPT, render_prompt};
pub use record::{
    FIELD_CHILD_NAME, FIELD_CHILD_UID, FIELD_CONVERSATION, FIELD_CREATED, FIELD_PHONE,
    FIELD_PHONE_NUMBER, FIELD_SUMMARY_GENERATED, FeedbackEntry, PATTERN_FIELDS, ProfileRecord,
    Record, RecordUpdate, UidUpdate, summary_fields,
};
pub use server::{AppState, router, run_server};
pub use store::{AirtableStore, InMemoryRecordStore, RecordStore};
pub use summarizer::{BatchSummarizer, CHUNK_SIZE, SummarizerReport};
pub use summary::{GeneratedSummary, HighlightQuote, PatternReading, SummaryParseError};
pub use sync::{SyncReport, SyncService, Tables};
