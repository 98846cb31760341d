use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache_log::CacheLog;
use crate::grouper::StudentGroup;
use crate::llm::CompletionClient;
use crate::prompt::render_prompt;
use crate::summary::{parse_summary_batch, strip_code_fences};

/// Students per completion request. Sized to keep prompts small and bound
/// load on the completion service.
pub const CHUNK_SIZE: usize = 3;

/// Outcome counts for one summarizer pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SummarizerReport {
    pub chunks_ok: usize,
    pub chunks_failed: usize,
    pub summaries: usize,
}

/// Drives the completion service over eligible student groups and appends
/// each raw response to the cache log.
///
/// The append happens before parsing, so a response that later fails to
/// parse is still preserved for inspection. Downstream consumption goes
/// through the log, never through this struct's return value.
pub struct BatchSummarizer {
    llm: Arc<dyn CompletionClient>,
    log: Arc<dyn CacheLog>,
    prompt_template: String,
    chunk_size: usize,
}

impl BatchSummarizer {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        log: Arc<dyn CacheLog>,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            log,
            prompt_template: prompt_template.into(),
            chunk_size: CHUNK_SIZE,
        }
    }

    #[cfg(test)]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Processes groups in fixed chunks, sequentially. A chunk whose
    /// completion call fails or whose response fails to parse is logged and
    /// skipped; its members stay unsummarized for the next run.
    pub async fn run(&self, groups: &[StudentGroup]) -> SummarizerReport {
        let mut report = SummarizerReport::default();
        for chunk in groups.chunks(self.chunk_size) {
            match self.process_chunk(chunk).await {
                Ok(count) => {
                    report.chunks_ok += 1;
                    report.summaries += count;
                }
                Err(e) => {
                    warn!(error = %e, students = chunk.len(), "summary chunk failed");
                    report.chunks_failed += 1;
                }
            }
        }
        info!(
            chunks_ok = report.chunks_ok,
            chunks_failed = report.chunks_failed,
            summaries = report.summaries,
            "summarizer pass complete"
        );
        report
    }

    async fn process_chunk(&self, chunk: &[StudentGroup]) -> anyhow::Result<usize> {
        let prompt = render_prompt(&self.prompt_template, chunk)?;
        debug!(students = chunk.len(), "requesting summaries");
        let raw = self.llm.complete(&prompt).await?;
        let cleaned = strip_code_fences(&raw);

        // Durability point: the raw response is preserved even when the
        // parse below fails.
        self.log.append(&cleaned)?;

        let mut summaries = parse_summary_batch(&cleaned)?;
        for summary in &mut summaries {
            if summary.record_ids.is_empty() {
                // The prompt asks the model to echo record_ids; fall back
                // to name matching within the originating chunk when the
                // echo is missing.
                if let Some(group) = chunk.iter().find(|g| g.name == summary.name) {
                    summary.record_ids = group.record_ids.clone();
                } else {
                    warn!(name = %summary.name, "summary matches no student in its chunk");
                }
            }
        }
        Ok(summaries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_log::MemoryCacheLog;
    use crate::prompt::DEFAULT_PROMPT;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedLLM {
        responses: Vec<anyhow::Result<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedLLM {
        fn new(responses: Vec<anyhow::Result<String>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedLLM {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.responses[idx] {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn group(name: &str, ids: &[&str]) -> StudentGroup {
        StudentGroup {
            phone: "5550100".into(),
            name: name.into(),
            combined_conversation: "hi".into(),
            record_ids: ids.iter().map(|s| s.to_string()).collect(),
            needs_summary: true,
        }
    }

    #[tokio::test]
    async fn failed_chunk_leaves_no_log_entry_and_later_chunks_run() {
        let log = Arc::new(MemoryCacheLog::new());
        let llm = Arc::new(ScriptedLLM::new(vec![
            Err(anyhow::anyhow!("completion service down")),
            Ok(r#"[{"name":"Ben","phone":"5550100","record_ids":["E2"]}]"#.into()),
        ]));
        let summarizer =
            BatchSummarizer::new(llm, log.clone(), DEFAULT_PROMPT).with_chunk_size(1);

        let report = summarizer
            .run(&[group("Ana", &["E1"]), group("Ben", &["E2"])])
            .await;

        assert_eq!(report.chunks_failed, 1);
        assert_eq!(report.chunks_ok, 1);
        // Only the successful chunk reached the log.
        assert_eq!(log.read_entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_response_is_still_appended() {
        let log = Arc::new(MemoryCacheLog::new());
        let llm = Arc::new(ScriptedLLM::new(vec![Ok("sorry, I cannot".into())]));
        let summarizer = BatchSummarizer::new(llm, log.clone(), DEFAULT_PROMPT);

        let report = summarizer.run(&[group("Ana", &["E1"])]).await;

        assert_eq!(report.chunks_failed, 1);
        assert_eq!(log.read_entries().unwrap(), vec!["sorry, I cannot"]);
    }

    #[tokio::test]
    async fn fenced_response_is_stored_clean() {
        let log = Arc::new(MemoryCacheLog::new());
        let llm = Arc::new(ScriptedLLM::new(vec![Ok(
            "```json\n[{\"name\":\"Ana\"}]\n```".into(),
        )]));
        let summarizer = BatchSummarizer::new(llm, log.clone(), DEFAULT_PROMPT);

        let report = summarizer.run(&[group("Ana", &["E1"])]).await;

        assert_eq!(report.summaries, 1);
        assert_eq!(log.read_entries().unwrap(), vec!["[{\"name\":\"Ana\"}]"]);
    }
}
