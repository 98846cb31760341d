use clap::Parser;
use ollama_rs::Ollama;
use std::sync::Arc;

use reflectd::args::Args;
use reflectd::{
    AirtableStore, AppState, CacheLog, CompletionClient, DEFAULT_PROMPT, FileCacheLog,
    OllamaClient, RecordStore, SyncService, Tables, logger, run_server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init();

    let store_url = url::Url::parse(&args.store_url)?;
    let store: Arc<dyn RecordStore> = Arc::new(AirtableStore::new(
        store_url.as_str(),
        &args.base_id,
        &args.store_key,
    ));
    let log: Arc<dyn CacheLog> = Arc::new(FileCacheLog::new(&args.cache_file));
    let ollama = Ollama::try_new(&args.llm_url)?;
    let llm: Arc<dyn CompletionClient> =
        Arc::new(OllamaClient::new(ollama, &args.model, args.temperature));

    let prompt = match &args.prompt_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => DEFAULT_PROMPT.to_string(),
    };

    let sync = Arc::new(SyncService::new(
        Arc::clone(&store),
        llm,
        log,
        Tables {
            profiles: args.profiles_table.clone(),
            feedback: args.feedback_table.clone(),
        },
        prompt,
    ));

    if args.apply_only {
        let report = sync.applier().apply().await?;
        tracing::info!(applied = report.applied, "apply-only run finished");
        return Ok(());
    }

    let state = AppState {
        sync,
        store,
        feedback_table: args.feedback_table.clone(),
    };
    let handle = run_server(state, &args.host, args.port).await?;
    handle.await?;
    Ok(())
}
