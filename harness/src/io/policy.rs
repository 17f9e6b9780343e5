//! Per-iteration execution policy and its materialized settings artifact.
//!
//! Each iteration gets a freshly built policy so grants never drift across
//! iterations. Filesystem grants are root-relative; the shell grant is
//! deliberately coarse and paired with a command-validation hook that the
//! engine evaluates per invocation, so blocked attempts stay auditable
//! without enumerating every safe command statically.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

/// Fixed relative path of the settings artifact inside the target directory.
pub const POLICY_ARTIFACT: &str = ".agent_settings.json";

/// Built-in file and shell capabilities.
pub const BUILTIN_TOOLS: [&str; 6] = ["Read", "Write", "Edit", "Glob", "Grep", "Bash"];

/// Browser-automation remote tools.
pub const BROWSER_TOOLS: [&str; 7] = [
    "mcp__puppeteer__puppeteer_navigate",
    "mcp__puppeteer__puppeteer_screenshot",
    "mcp__puppeteer__puppeteer_click",
    "mcp__puppeteer__puppeteer_fill",
    "mcp__puppeteer__puppeteer_select",
    "mcp__puppeteer__puppeteer_hover",
    "mcp__puppeteer__puppeteer_evaluate",
];

/// Tracker remote tools (issue and project management).
pub const TRACKER_TOOLS: [&str; 18] = [
    "mcp__linear__list_teams",
    "mcp__linear__get_team",
    "mcp__linear__list_projects",
    "mcp__linear__get_project",
    "mcp__linear__create_project",
    "mcp__linear__update_project",
    "mcp__linear__list_issues",
    "mcp__linear__get_issue",
    "mcp__linear__create_issue",
    "mcp__linear__update_issue",
    "mcp__linear__list_my_issues",
    "mcp__linear__list_comments",
    "mcp__linear__create_comment",
    "mcp__linear__list_issue_statuses",
    "mcp__linear__get_issue_status",
    "mcp__linear__list_issue_labels",
    "mcp__linear__list_users",
    "mcp__linear__get_user",
];

/// Immutable policy for exactly one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPolicy {
    #[serde(skip)]
    scope_root: PathBuf,
    sandbox: SandboxSettings,
    permissions: PermissionSettings,
    hooks: HookSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct SandboxSettings {
    enabled: bool,
    auto_allow_bash_if_sandboxed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionSettings {
    default_mode: String,
    allow: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct HookSettings {
    pre_shell: ShellHook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ShellHook {
    matcher: String,
    command: Vec<String>,
}

impl ExecutionPolicy {
    /// Build the policy for one iteration, deterministically.
    ///
    /// File grants use root-relative patterns (the engine runs with
    /// `scope_root` as cwd), so absolute paths outside the scope are never
    /// grantable. `Bash(*)` is the coarse grant; `validator_command` is the
    /// hook that vetoes individual commands at execution time.
    pub fn build(scope_root: &Path, validator_command: &[String]) -> Self {
        let mut allow: Vec<String> = BUILTIN_TOOLS
            .iter()
            .filter(|tool| **tool != "Bash")
            .map(|tool| format!("{tool}(./**)"))
            .collect();
        allow.push("Bash(*)".to_string());
        allow.extend(BROWSER_TOOLS.iter().map(|tool| tool.to_string()));
        allow.extend(TRACKER_TOOLS.iter().map(|tool| tool.to_string()));

        Self {
            scope_root: scope_root.to_path_buf(),
            sandbox: SandboxSettings {
                enabled: true,
                auto_allow_bash_if_sandboxed: true,
            },
            permissions: PermissionSettings {
                default_mode: "acceptEdits".to_string(),
                allow,
            },
            hooks: HookSettings {
                pre_shell: ShellHook {
                    matcher: "Bash".to_string(),
                    command: validator_command.to_vec(),
                },
            },
        }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.scope_root.join(POLICY_ARTIFACT)
    }

    /// Write the settings artifact: a full overwrite via temp file + rename.
    ///
    /// The only side effect of policy construction, and safe to call
    /// repeatedly.
    pub fn materialize(&self) -> Result<PathBuf> {
        let path = self.artifact_path();
        fs::create_dir_all(&self.scope_root)
            .with_context(|| format!("create directory {}", self.scope_root.display()))?;
        let mut buf = serde_json::to_string_pretty(self)?;
        buf.push('\n');
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &buf)
            .with_context(|| format!("write temp policy {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("replace policy {}", path.display()))?;
        debug!(path = %path.display(), "materialized execution policy");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Vec<String> {
        vec!["command-allowlist".to_string()]
    }

    #[test]
    fn build_is_deterministic() {
        let a = ExecutionPolicy::build(Path::new("/tmp/project"), &validator());
        let b = ExecutionPolicy::build(Path::new("/tmp/project"), &validator());
        assert_eq!(a, b);
    }

    #[test]
    fn file_grants_are_root_relative() {
        let policy = ExecutionPolicy::build(Path::new("/tmp/project"), &validator());
        let json = serde_json::to_string(&policy).expect("serialize");
        assert!(json.contains("Read(./**)"));
        assert!(json.contains("Write(./**)"));
        assert!(!json.contains("Read(/"));
    }

    #[test]
    fn shell_grant_pairs_with_validation_hook() {
        let policy = ExecutionPolicy::build(Path::new("/tmp/project"), &validator());
        let json = serde_json::to_string(&policy).expect("serialize");
        assert!(json.contains("Bash(*)"));
        assert!(json.contains("command-allowlist"));
        assert!(json.contains("\"matcher\":\"Bash\""));
    }

    #[test]
    fn allowlist_covers_the_fixed_catalogue_without_wildcards() {
        let policy = ExecutionPolicy::build(Path::new("/tmp/project"), &validator());
        let json = serde_json::to_string(&policy).expect("serialize");
        for tool in BROWSER_TOOLS.iter().chain(TRACKER_TOOLS.iter()) {
            assert!(json.contains(tool), "missing {tool}");
        }
        assert!(!json.contains("mcp__linear__*"));
    }

    #[test]
    fn materialize_overwrites_in_full() {
        let temp = tempfile::tempdir().expect("tempdir");
        let policy = ExecutionPolicy::build(temp.path(), &validator());

        fs::write(policy.artifact_path(), "stale contents").expect("seed stale artifact");
        let path = policy.materialize().expect("materialize");
        let first = fs::read_to_string(&path).expect("read");
        assert!(!first.contains("stale"));

        // Repeat materialization is byte-identical.
        policy.materialize().expect("re-materialize");
        let second = fs::read_to_string(&path).expect("read");
        assert_eq!(first, second);
    }
}
