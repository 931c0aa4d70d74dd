//! Request log
//!
//! One JSON line per handled request. Path resolution:
//! 1. `$LUMINOUS_NIX_LOG_FILE`
//! 2. `$XDG_STATE_HOME/luminous-nix/requests.jsonl`
//! 3. `~/.local/state/luminous-nix/requests.jsonl`
//!
//! Write failures are swallowed: logging never fails a request.

use luminous_shared::{Intent, OperationResult};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOG_FILE_ENV: &str = "LUMINOUS_NIX_LOG_FILE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    /// RFC 3339 timestamp
    pub ts: String,
    pub req_id: String,
    pub query: String,
    pub intent: String,
    pub confidence: f32,
    pub dry_run: bool,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestLogEntry {
    pub fn new(intent: &Intent, result: &OperationResult, dry_run: bool) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            req_id: uuid::Uuid::new_v4().to_string(),
            query: intent.raw_query.clone(),
            intent: intent.intent_type().to_string(),
            confidence: intent.confidence,
            dry_run,
            success: result.success,
            duration_ms: result.duration.map(|s| (s * 1000.0) as u64).unwrap_or(0),
            error: result.error.clone(),
        }
    }

    /// Append to the resolved log path, ignoring every failure
    pub fn write(&self) {
        if let Some(path) = log_path() {
            if let Err(e) = self.write_to(&path) {
                debug!("request log {} not written: {}", path.display(), e);
            }
        }
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", json)
    }
}

pub fn log_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(LOG_FILE_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    if let Ok(state) = std::env::var("XDG_STATE_HOME") {
        if !state.is_empty() {
            return Some(PathBuf::from(state).join("luminous-nix").join("requests.jsonl"));
        }
    }
    dirs::home_dir().map(|home| {
        home.join(".local")
            .join("state")
            .join("luminous-nix")
            .join("requests.jsonl")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use luminous_shared::IntentKind;

    #[test]
    fn test_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("requests.jsonl");
        let intent = Intent::new(
            IntentKind::Install {
                packages: vec!["firefox".to_string()],
            },
            "install firefox",
            0.9,
        );
        let ok = OperationResult::success("Would install: firefox").with_duration(0.0123);
        let bad = OperationResult::failure("timed out after 5s");

        RequestLogEntry::new(&intent, &ok, true).write_to(&path).unwrap();
        RequestLogEntry::new(&intent, &bad, false).write_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<RequestLogEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].intent, "install");
        assert_eq!(entries[0].duration_ms, 12);
        assert!(entries[0].error.is_none());
        assert_eq!(entries[1].error.as_deref(), Some("timed out after 5s"));
    }
}
