use anyhow::Context;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Durable append-only log bridging summary generation and application.
///
/// Appends are atomic additions of whole units, the log is never truncated
/// at the start of a run, and deletion only happens once the applier has
/// drained it. That discipline is what makes the pipeline resumable after
/// a crash between generation and apply.
pub trait CacheLog: Send + Sync {
    fn exists(&self) -> bool;

    /// Appends one unit (one raw model response) to the log, creating it
    /// if absent.
    fn append(&self, unit: &str) -> anyhow::Result<()>;

    /// Reads back every decodable unit, in append order. Unreadable units
    /// are skipped with a warning rather than failing the drain.
    fn read_entries(&self) -> anyhow::Result<Vec<String>>;

    fn delete(&self) -> anyhow::Result<()>;
}

/// File-backed log: one line per unit, each line the JSON string-literal
/// encoding of the raw unit text.
///
/// The encoding keeps the raw model output byte-exact (newlines included)
/// while making unit boundaries explicit, replacing the fragile
/// "newline followed by `[`" splitting the cache format grew out of.
pub struct FileCacheLog {
    path: PathBuf,
}

impl FileCacheLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CacheLog for FileCacheLog {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn append(&self, unit: &str) -> anyhow::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening cache log {}", self.path.display()))?;
        let line = serde_json::to_string(unit)?;
        writeln!(file, "{line}").context("appending cache log unit")?;
        file.sync_all().context("flushing cache log")?;
        Ok(())
    }

    fn read_entries(&self) -> anyhow::Result<Vec<String>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading cache log {}", self.path.display()))?;
        let mut units = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<String>(line) {
                Ok(unit) => units.push(unit),
                Err(e) => warn!(line = idx + 1, error = %e, "skipping undecodable cache log line"),
            }
        }
        Ok(units)
    }

    fn delete(&self) -> anyhow::Result<()> {
        fs::remove_file(&self.path)
            .with_context(|| format!("deleting cache log {}", self.path.display()))
    }
}

/// In-memory log used for tests. Mimics the API without touching the
/// filesystem.
#[derive(Default)]
pub struct MemoryCacheLog {
    units: Mutex<Option<Vec<String>>>,
}

impl MemoryCacheLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds the log, as if a previous run had appended and crashed.
    pub fn seeded(units: Vec<String>) -> Self {
        Self {
            units: Mutex::new(Some(units)),
        }
    }
}

impl CacheLog for MemoryCacheLog {
    fn exists(&self) -> bool {
        self.units.lock().unwrap().is_some()
    }

    fn append(&self, unit: &str) -> anyhow::Result<()> {
        self.units
            .lock()
            .unwrap()
            .get_or_insert_with(Vec::new)
            .push(unit.to_string());
        Ok(())
    }

    fn read_entries(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.units.lock().unwrap().clone().unwrap_or_default())
    }

    fn delete(&self) -> anyhow::Result<()> {
        *self.units.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_lifecycle() {
        let log = MemoryCacheLog::new();
        assert!(!log.exists());
        log.append("[1]").unwrap();
        log.append("[2]").unwrap();
        assert!(log.exists());
        assert_eq!(log.read_entries().unwrap(), vec!["[1]", "[2]"]);
        log.delete().unwrap();
        assert!(!log.exists());
    }
}
