//! Healed-step audit log.
//!
//! An append-only JSON array of [`HealedStepLogEntry`] at a project-level
//! path. Diagnostic only; the runtime never reads it back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::result::SanarResult;

/// Default audit log location, relative to the project root
pub const DEFAULT_AUDIT_LOG_PATH: &str = "healed-steps.json";

/// One healed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealedStepLogEntry {
    /// Source-like reconstruction of the failing call
    pub original_step: String,
    /// Error message of the failing call
    pub error: String,
    /// Repair that was executed
    pub healed_code: String,
    /// When the heal happened
    pub timestamp: DateTime<Utc>,
    /// Page URL at heal time
    pub url: String,
}

impl HealedStepLogEntry {
    /// Entry stamped with the current time
    #[must_use]
    pub fn now(
        original_step: impl Into<String>,
        error: impl Into<String>,
        healed_code: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            original_step: original_step.into(),
            error: error.into(),
            healed_code: healed_code.into(),
            timestamp: Utc::now(),
            url: url.into(),
        }
    }
}

/// Append-only audit log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Log at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. A corrupt existing log is replaced rather than
    /// blocking new entries.
    pub fn append(&self, entry: &HealedStepLogEntry) -> SanarResult<()> {
        let mut entries = match self.read() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Audit log unreadable, starting a new one");
                Vec::new()
            }
        };
        entries.push(entry.clone());
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    /// All entries, oldest first; a missing file is empty
    pub fn read(&self) -> SanarResult<Vec<HealedStepLogEntry>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
