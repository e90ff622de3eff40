use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

const LOG_FILE_NAME: &str = "chat.log";

/// Append-only transcript of every USER/AI exchange.
///
/// One line per turn: `[<ISO timestamp>] USER: <text>` or
/// `[<ISO timestamp>] AI: <text>` with a blank separator line after AI
/// entries. Entries are never rewritten or removed. A USER/AI pair shares
/// the timestamp the caller captured when the prompt arrived.
pub struct TranscriptStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TranscriptStore {
    /// Create the transcript directory and log file if missing.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(LOG_FILE_NAME);
        OpenOptions::new().create(true).append(true).open(&path)?;

        info!("Transcript log at {}", path.display());

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_user(&self, timestamp: DateTime<Utc>, text: &str) -> io::Result<()> {
        self.append_line(&format!("[{}] USER: {}\n", iso(timestamp), text))
    }

    pub fn append_ai(&self, timestamp: DateTime<Utc>, text: &str) -> io::Result<()> {
        self.append_line(&format!("[{}] AI: {}\n\n", iso(timestamp), text))
    }

    /// Whole log verbatim; a missing file reads as empty, not as an error.
    pub fn read_all(&self) -> io::Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    // Single write_all under the lock keeps concurrent appends whole-line.
    fn append_line(&self, line: &str) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

// Millisecond precision with a Z suffix, matching JS Date.toISOString().
fn iso(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn user_and_ai_lines_share_the_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).unwrap();
        let ts = fixed_ts();

        store.append_user(ts, "hello").unwrap();
        store.append_ai(ts, "Hi there").unwrap();

        let log = store.read_all().unwrap();
        assert_eq!(
            log,
            "[2025-01-02T03:04:05.000Z] USER: hello\n\
             [2025-01-02T03:04:05.000Z] AI: Hi there\n\n"
        );
    }

    #[test]
    fn read_all_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).unwrap();
        fs::remove_file(store.path()).unwrap();
        assert_eq!(store.read_all().unwrap(), "");
    }

    #[test]
    fn read_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path()).unwrap();
        store.append_user(fixed_ts(), "once").unwrap();
        assert_eq!(store.read_all().unwrap(), store.read_all().unwrap());
    }

    #[test]
    fn concurrent_appends_never_interleave_within_a_line() {
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TranscriptStore::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.append_user(Utc::now(), &format!("writer-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let log = store.read_all().unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 8 * 50);
        for line in lines {
            assert!(line.starts_with('['), "corrupt line: {line}");
            assert!(line.contains("] USER: writer-"), "corrupt line: {line}");
        }
    }
}
