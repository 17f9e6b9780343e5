//! Persisted project state marker (`.tracker_project.json`).
//!
//! The marker is the sole source of truth for the first-run decision. The
//! agent writes it once tracker bootstrap completes; the harness only reads
//! it (and never deletes it — reset is an explicit external action).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed relative path of the marker inside the target directory.
pub const STATE_MARKER: &str = ".tracker_project.json";

/// Cached knowledge about a target project's tracker initialization.
///
/// Forward compatible: unknown fields are ignored and missing fields default,
/// so `initialized` degrades to `false`. In well-formed records
/// `initialized == true` implies `meta_issue_id` is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectState {
    pub initialized: bool,
    /// Coarse progress counter, advisory only.
    pub total_issues: u64,
    pub meta_issue_id: Option<String>,
}

pub fn state_marker_path(project_dir: &Path) -> PathBuf {
    project_dir.join(STATE_MARKER)
}

/// Load the marker. Missing, unreadable, or structurally invalid records read
/// as absent — never as errors — so the first-run decision degrades safely to
/// "fresh" (bootstrap itself is idempotent).
pub fn load_project_state(project_dir: &Path) -> Option<ProjectState> {
    let path = state_marker_path(project_dir);
    let contents = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(state) => Some(state),
        Err(err) => {
            debug!(path = %path.display(), err = %err, "ignoring corrupt state marker");
            None
        }
    }
}

/// Whether tracker bootstrap has completed for this project.
pub fn is_initialized(project_dir: &Path) -> bool {
    load_project_state(project_dir)
        .map(|state| state.initialized)
        .unwrap_or(false)
}

/// Atomically write the marker (temp file + rename), so an interrupted write
/// can never produce a torn read on the next invocation.
pub fn write_project_state(project_dir: &Path, state: &ProjectState) -> Result<()> {
    let path = state_marker_path(project_dir);
    fs::create_dir_all(project_dir)
        .with_context(|| format!("create directory {}", project_dir.display()))?;
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp state marker {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path)
        .with_context(|| format!("replace state marker {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = ProjectState {
            initialized: true,
            total_issues: 42,
            meta_issue_id: Some("META-1".to_string()),
        };

        write_project_state(temp.path(), &state).expect("write");
        assert_eq!(load_project_state(temp.path()), Some(state));
        assert!(is_initialized(temp.path()));
    }

    #[test]
    fn missing_marker_reads_as_absent() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(load_project_state(temp.path()), None);
        assert!(!is_initialized(temp.path()));
    }

    #[test]
    fn corrupt_marker_reads_as_absent() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(state_marker_path(temp.path()), "{not json").expect("write");
        assert_eq!(load_project_state(temp.path()), None);
        assert!(!is_initialized(temp.path()));
    }

    #[test]
    fn unknown_and_missing_fields_are_tolerated() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            state_marker_path(temp.path()),
            r#"{"total_issues": 3, "future_field": [1, 2]}"#,
        )
        .expect("write");

        let state = load_project_state(temp.path()).expect("state");
        assert!(!state.initialized);
        assert_eq!(state.total_issues, 3);
        assert_eq!(state.meta_issue_id, None);
    }
}
