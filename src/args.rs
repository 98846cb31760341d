use clap::Parser;
use std::path::PathBuf;

/// Command line arguments for the reflectd binary.
#[derive(Parser, Clone, Debug)]
#[command(name = "reflectd", version)]
pub struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, default_value_t = 3001)]
    pub port: u16,

    /// Record store API root.
    #[arg(long = "store-url", default_value = "https://api.airtable.com/v0")]
    pub store_url: String,
    #[arg(long = "store-key", env = "AIRTABLE_API_KEY", hide_env_values = true)]
    pub store_key: String,
    #[arg(long = "base-id", env = "AIRTABLE_BASE_ID")]
    pub base_id: String,
    /// Profiles table (store A).
    #[arg(long = "profiles-table", env = "AIRTABLE_TABLE_1")]
    pub profiles_table: String,
    /// Feedback table (store B).
    #[arg(long = "feedback-table", env = "AIRTABLE_TABLE_2")]
    pub feedback_table: String,

    /// Base URL for the completion service.
    #[arg(long = "llm-url", default_value = "http://localhost:11434")]
    pub llm_url: String,
    #[arg(long, default_value = "gemma3:27b")]
    pub model: String,
    /// Kept low so identical inputs yield near-identical summaries.
    #[arg(long, default_value_t = 0.4)]
    pub temperature: f32,
    /// Prompt template file overriding the built-in prompt.
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Durable cache log bridging generation and apply.
    #[arg(long = "cache-file", default_value = "summary_cache.log")]
    pub cache_file: PathBuf,

    /// Drain the cache log into the store and exit, without generating
    /// anything new. For recovery after an interrupted run.
    #[arg(long = "apply-only")]
    pub apply_only: bool,
}
