//! Device-local trust cache
//!
//! A single JSON object mapping lowercased usernames to the millisecond epoch
//! of their last successful login. Entries are never evicted; validity is
//! computed at read time against a fixed 14-day window. The file lives in the
//! platform data dir (or wherever the config points) and survives process
//! restarts; a corrupt or missing file degrades to an empty cache.

use fieldops_common::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Validity window for a remembered device
pub const TRUST_WINDOW_MS: i64 = 14 * 24 * 60 * 60 * 1000;

/// Persistent record of recent successful logins
pub struct TrustStore {
    path: PathBuf,
    entries: HashMap<String, i64>,
}

impl TrustStore {
    /// Open the store at `path`, loading existing entries. Unreadable or
    /// unparseable content is discarded with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Trust cache at {} unparseable ({e}), starting empty", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { path, entries }
    }

    /// Current wall-clock time as millisecond epoch.
    pub fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Record a successful login for `username` at `now_ms` and persist.
    pub fn record(&mut self, username: &str, now_ms: i64) -> Result<()> {
        self.entries
            .insert(username.trim().to_lowercase(), now_ms);
        self.persist()
    }

    /// Last recorded login for `username`, if any.
    pub fn last_login_ms(&self, username: &str) -> Option<i64> {
        self.entries.get(&username.trim().to_lowercase()).copied()
    }

    /// Whether `username` has a login recorded within the validity window
    /// as of `now_ms`.
    pub fn is_trusted_at(&self, username: &str, now_ms: i64) -> bool {
        match self.last_login_ms(username) {
            Some(ts) => now_ms - ts < TRUST_WINDOW_MS,
            None => false,
        }
    }

    /// Where this store persists.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash mid-write never truncates the cache
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(&self.entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
