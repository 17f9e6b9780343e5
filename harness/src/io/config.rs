//! Harness configuration stored under `<project>/.harness/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Harness tunables (TOML).
///
/// Intended to be edited by humans. A missing file or missing fields default
/// to usable values, so a fresh project needs no configuration at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Seconds to wait between iterations; also the error backoff.
    pub auto_continue_delay_secs: u64,

    /// Wall-clock budget for one engine invocation.
    pub engine_timeout_secs: u64,

    /// Wall-clock budget for the scaffolding generator.
    pub scaffold_timeout_secs: u64,

    /// Truncate captured child-process output beyond this many bytes.
    pub output_limit_bytes: usize,

    pub engine: EngineConfig,
    pub scaffold: ScaffoldConfig,
    pub validator: ValidatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Base command for the agent CLI. The harness appends the model and
    /// settings flags per iteration.
    pub command: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "claude".to_string(),
                "-p".to_string(),
                "--output-format".to_string(),
                "stream-json".to_string(),
                "--verbose".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScaffoldConfig {
    /// External scaffolding generator, invoked with `--name`, `--type`, and
    /// `--path`. Empty disables scaffolding entirely.
    pub command: Vec<String>,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            command: vec!["init-project".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Command-validation hook referenced from the policy artifact. Evaluated
    /// by the engine before any shell-class capability executes.
    pub command: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            command: vec!["command-allowlist".to_string()],
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            auto_continue_delay_secs: 3,
            engine_timeout_secs: 60 * 60,
            scaffold_timeout_secs: 15 * 60,
            output_limit_bytes: 100_000,
            engine: EngineConfig::default(),
            scaffold: ScaffoldConfig::default(),
            validator: ValidatorConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.engine_timeout_secs == 0 {
            return Err(anyhow!("engine_timeout_secs must be > 0"));
        }
        if self.scaffold_timeout_secs == 0 {
            return Err(anyhow!("scaffold_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.engine.command.is_empty() || self.engine.command[0].trim().is_empty() {
            return Err(anyhow!("engine.command must be a non-empty array"));
        }
        Ok(())
    }
}

pub fn harness_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".harness").join("config.toml")
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = harness_config_path(temp.path());
        let cfg = HarnessConfig {
            auto_continue_delay_secs: 0,
            scaffold: ScaffoldConfig {
                command: Vec::new(),
            },
            ..HarnessConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn validate_rejects_empty_engine_command() {
        let cfg = HarnessConfig {
            engine: EngineConfig {
                command: Vec::new(),
            },
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
