//! Append-only, size-rotated JSON-lines log for raw LIDAR sweeps.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use roamsense_types::RoamError;
use tracing::{debug, info};

/// Default rotation threshold (1 MiB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024;

/// Writes one JSON document per line, starting a new timestamped file once
/// the current one grows past `max_file_size_bytes`.
///
/// Files are named `lidar_{unix_seconds}_{micros}Z.jsonl`.
#[derive(Debug, Clone)]
pub struct ScanLogWriter {
    dir: PathBuf,
    max_file_size_bytes: u64,
    current: PathBuf,
}

impl ScanLogWriter {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl AsRef<Path>, max_file_size_bytes: u64) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let current = fresh_filename(&dir, None);
        info!(file = %current.display(), "scan log target");
        Self {
            dir,
            max_file_size_bytes,
            current,
        }
    }

    pub fn current_file(&self) -> &Path {
        &self.current
    }

    /// Append `line` followed by `\n`.
    ///
    /// `line` must be a single-line JSON document; anything else is a caller
    /// bug and is rejected with [`RoamError::InvalidPayload`].
    pub fn write_line(&mut self, line: &str) -> Result<(), RoamError> {
        if line.contains(['\n', '\r']) {
            return Err(RoamError::InvalidPayload(
                "scan log line must not contain line breaks".to_string(),
            ));
        }
        serde_json::from_str::<serde_json::Value>(line)
            .map_err(|e| RoamError::InvalidPayload(format!("scan log line is not JSON: {e}")))?;

        if let Ok(meta) = fs::metadata(&self.current) {
            if meta.len() > self.max_file_size_bytes {
                self.current = fresh_filename(&self.dir, Some(&self.current));
                info!(file = %self.current.display(), "rotated scan log");
            }
        }

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        debug!(file = %self.current.display(), bytes = line.len() + 1, "scan log line written");
        Ok(())
    }
}

fn fresh_filename(dir: &Path, previous: Option<&Path>) -> PathBuf {
    let now = Utc::now();
    let stem = format!("lidar_{}_{:06}", now.timestamp(), now.timestamp_subsec_micros());
    let mut candidate = dir.join(format!("{stem}Z.jsonl"));
    let mut n = 1;
    while candidate.exists() || previous == Some(candidate.as_path()) {
        candidate = dir.join(format!("{stem}_{n}Z.jsonl"));
        n += 1;
    }
    candidate
}
