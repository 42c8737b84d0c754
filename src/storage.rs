// =============================================================================
// Cold store — durable per-(symbol, timeframe) series files
// =============================================================================
//
// One JSON file per key under the data directory holding the full ascending
// series. Writes are atomic (tmp sibling + rename) so a crash mid-write
// never leaves a half-written file visible to readers. Loads degrade to an
// empty series when the file is missing or unreadable; callers treat that
// as "absent" and refetch.
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::types::{Candle, SeriesKey};

pub struct ColdStore {
    data_dir: PathBuf,
}

impl ColdStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `<data_dir>/<SYMBOL>_<TIMEFRAME>.json`, both parts stripped to
    /// alphanumerics so a hostile symbol cannot escape the data directory.
    fn file_path(&self, key: &SeriesKey) -> PathBuf {
        let symbol: String = key
            .symbol
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let timeframe: String = key
            .timeframe
            .code()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        self.data_dir.join(format!("{}_{}.json", symbol, timeframe))
    }

    /// Load the durable series for `key`. Missing files and parse failures
    /// both come back as an empty series.
    pub fn load(&self, key: &SeriesKey) -> Vec<Candle> {
        let path = self.file_path(key);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = %key, "no durable series file yet");
                return Vec::new();
            }
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e, "failed to read series file");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Candle>>(&content) {
            Ok(series) => series,
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e, "corrupt series file, treating as absent");
                Vec::new()
            }
        }
    }

    /// Persist the full series for `key`, replacing the previous file.
    ///
    /// Empty series are skipped so a failed fetch can never wipe a good
    /// durable copy. The write goes to a tmp sibling first, then renames.
    pub fn save(&self, key: &SeriesKey, series: &[Candle]) -> Result<()> {
        if series.is_empty() {
            warn!(key = %key, "skipping save of empty series");
            return Ok(());
        }

        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("failed to create data dir {}", self.data_dir.display())
        })?;

        let path = self.file_path(key);
        let content =
            serde_json::to_string(series).context("failed to serialise series to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp series to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to rename tmp series to {}", path.display()))?;

        debug!(key = %key, points = series.len(), "series saved (atomic)");
        Ok(())
    }

    /// Age of the durable copy, `None` when no file exists yet.
    pub fn last_write_age(&self, key: &SeriesKey) -> Option<Duration> {
        let modified = std::fs::metadata(self.file_path(key))
            .ok()?
            .modified()
            .ok()?;
        Some(SystemTime::now().duration_since(modified).unwrap_or_default())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
