//! Completion monitor
//!
//! Polls the emulator log until the firmware prints its completion marker.
//! The log is tailed incrementally, but a match is still "marker anywhere in
//! the file so far": the tail of each read is carried over so a marker split
//! across two polls is found, and a truncated file is re-read from the start.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::Instant;

use crate::common::{Error, Result};

/// Poll cadence and bound
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` waits forever
    pub timeout: Option<Duration>,
}

/// Returned once the marker was seen
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub elapsed: Duration,
    pub polls: u32,
}

/// Incremental reader over a growing log file
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: u64,
    carry: Vec<u8>,
}

impl LogTail {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
            carry: Vec::new(),
        }
    }

    /// Read whatever was appended since the last poll and look for `marker`
    ///
    /// A file that doesn't exist yet counts as empty.
    pub async fn poll(&mut self, marker: &[u8]) -> Result<bool> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata().await?.len();
        if len < self.offset {
            tracing::debug!(path = %self.path.display(), "Log truncated, re-reading");
            self.offset = 0;
            self.carry.clear();
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut fresh = Vec::new();
        file.read_to_end(&mut fresh).await?;
        self.offset += fresh.len() as u64;

        let mut window = std::mem::take(&mut self.carry);
        window.extend_from_slice(&fresh);

        let found = contains(&window, marker);

        let keep = marker.len().saturating_sub(1).min(window.len());
        self.carry = window.split_off(window.len() - keep);

        Ok(found)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// One-shot check of the whole log
pub async fn log_contains(log: &Path, marker: &str) -> Result<bool> {
    LogTail::new(log).poll(marker.as_bytes()).await
}

/// Block until `marker` appears in `log`
///
/// Checks immediately, then once per interval. Fails with
/// [`Error::CompletionTimeout`] once `options.timeout` has elapsed.
pub async fn await_completion(log: &Path, marker: &str, options: PollOptions) -> Result<Completion> {
    tracing::info!(log = %log.display(), "Monitoring log file for completion");

    let started = Instant::now();
    let deadline = options.timeout.map(|t| started + t);
    let mut tail = LogTail::new(log);
    let mut polls = 0u32;

    loop {
        polls += 1;
        if tail.poll(marker.as_bytes()).await? {
            let elapsed = started.elapsed();
            tracing::info!(marker, elapsed_ms = elapsed.as_millis() as u64, "Completion line found");
            return Ok(Completion { elapsed, polls });
        }

        let mut wake = Instant::now() + options.interval;
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(Error::CompletionTimeout {
                    marker: marker.to_string(),
                    secs: options.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                });
            }
            wake = wake.min(deadline);
        }

        tokio::time::sleep_until(wake).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MARKER: &str = "main_task: Returned from app_main()";

    fn options(timeout_ms: Option<u64>) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(10),
            timeout: timeout_ms.map(Duration::from_millis),
        }
    }

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_returns_only_after_marker_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.log");
        append(&log, "I (31) boot: ESP-IDF\n");

        let writer_log = log.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            append(&writer_log, &format!("I (900) {MARKER}\n"));
            Instant::now()
        });

        let completion = await_completion(&log, MARKER, options(Some(5_000)))
            .await
            .unwrap();
        let written_at = writer.await.unwrap();

        assert!(Instant::now() >= written_at);
        assert!(completion.polls > 1);
        assert!(completion.elapsed >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_missing_log_then_created() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.log");

        let writer_log = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            append(&writer_log, MARKER);
        });

        await_completion(&log, MARKER, options(Some(5_000)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_times_out_without_marker() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.log");
        append(&log, "Guru Meditation Error: Core 0 panic'ed\n");

        let result = await_completion(&log, MARKER, options(Some(50))).await;
        assert!(matches!(result, Err(Error::CompletionTimeout { .. })));
    }

    #[tokio::test]
    async fn test_marker_split_across_polls() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.log");
        let (head, rest) = MARKER.split_at(10);

        let mut tail = LogTail::new(&log);
        append(&log, &format!("noise\n{head}"));
        assert!(!tail.poll(MARKER.as_bytes()).await.unwrap());

        append(&log, rest);
        assert!(tail.poll(MARKER.as_bytes()).await.unwrap());
    }

    #[tokio::test]
    async fn test_truncated_log_is_reread() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.log");
        append(&log, "a long line from the previous boot that pushes the offset\n");

        let mut tail = LogTail::new(&log);
        assert!(!tail.poll(MARKER.as_bytes()).await.unwrap());

        std::fs::write(&log, MARKER).unwrap();
        assert!(tail.poll(MARKER.as_bytes()).await.unwrap());
    }

    #[tokio::test]
    async fn test_log_contains_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.log");
        assert!(!log_contains(&log, MARKER).await.unwrap());
        append(&log, MARKER);
        assert!(log_contains(&log, MARKER).await.unwrap());
    }
}
