use reflectd::{CacheLog, FileCacheLog};
use std::fs::OpenOptions;
use std::io::Write;

#[test]
fn round_trips_units_with_embedded_newlines() {
    let dir = tempfile::tempdir().unwrap();
    let log = FileCacheLog::new(dir.path().join("summary_cache.log"));

    assert!(!log.exists());
    log.append("[{\"name\":\"Ana\"}]").unwrap();
    log.append("line one\nline two").unwrap();

    assert!(log.exists());
    assert_eq!(
        log.read_entries().unwrap(),
        vec!["[{\"name\":\"Ana\"}]", "line one\nline two"]
    );

    log.delete().unwrap();
    assert!(!log.exists());
}

#[test]
fn undecodable_lines_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary_cache.log");
    let log = FileCacheLog::new(&path);

    log.append("first").unwrap();
    // Simulate a torn write from a crashed process.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "\"torn unit without closing quote").unwrap();
    log.append("last").unwrap();

    assert_eq!(log.read_entries().unwrap(), vec!["first", "last"]);
}

#[test]
fn append_never_truncates_existing_units() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary_cache.log");

    FileCacheLog::new(&path).append("from run one").unwrap();
    // A fresh handle, as a new process would open it.
    let log = FileCacheLog::new(&path);
    log.append("from run two").unwrap();

    assert_eq!(
        log.read_entries().unwrap(),
        vec!["from run one", "from run two"]
    );
}
