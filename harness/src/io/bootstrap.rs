//! Idempotent environment bootstrap for a target project.
//!
//! Three steps: scaffold a skeleton, propagate the spec, and gate on backend
//! provisioning. Every step is independently skippable and degrades to
//! "continue anyway" — a partially bootstrapped project is still workable by
//! the agent, whereas aborting wastes the run.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::spec_doc::{app_type_from_spec, spec_mentions_backend};
use crate::io::config::HarnessConfig;
use crate::io::policy::POLICY_ARTIFACT;
use crate::io::process::run_command_with_timeout;
use crate::io::state::STATE_MARKER;

/// Fixed destination name for the spec inside the project.
pub const SPEC_DEST_NAME: &str = "app_spec.txt";

const ENV_LOCAL: &str = ".env.local";
const BACKEND_DIR: &str = "convex";
const GENERATED_CLIENT_DIR: &str = "convex/_generated";
const BACKEND_ENV_KEYS: [&str; 2] = ["CONVEX_URL", "NEXT_PUBLIC_CONVEX_URL"];

/// Operator response at the provisioning gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateResponse {
    /// Operator claims setup completed; re-verify before trusting it.
    Ready,
    /// Proceed without the backend, degraded.
    Skip,
}

/// Blocking operator prompt used by the provisioning gate.
pub trait SetupPrompt {
    fn wait_for_setup(&self, project_dir: &Path) -> GateResponse;
}

/// Production prompt reading from stdin. EOF or a read error reads as skip so
/// an interrupted operator never wedges the session.
pub struct StdinPrompt;

impl SetupPrompt for StdinPrompt {
    fn wait_for_setup(&self, project_dir: &Path) -> GateResponse {
        println!("\n{}", "=".repeat(70));
        println!("  BACKEND SETUP REQUIRED (one-time per project)");
        println!("{}", "=".repeat(70));
        println!("\nThe backend requires interactive setup. In another terminal, run:");
        println!("\n  cd {}", project_dir.display());
        println!("  npx convex dev");
        println!("\nFollow the prompts to log in, pick a team, and create a project.");
        println!("When setup completes, return here and press Enter to continue.");
        println!("(Or type 'skip' to continue without the backend - some features won't work)");

        print!("\nPress Enter when ready (or 'skip'): ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => {
                println!("\nContinuing without backend setup");
                GateResponse::Skip
            }
            Ok(_) => {
                if line.trim().eq_ignore_ascii_case("skip") {
                    GateResponse::Skip
                } else {
                    GateResponse::Ready
                }
            }
        }
    }
}

/// Scaffold a fresh project skeleton via the external generator.
///
/// Returns `false` whenever scaffolding was skipped or failed; that is a
/// degradation, not an error — the agent sets the project up manually.
pub fn scaffold_project(
    project_dir: &Path,
    spec_path: &Path,
    config: &HarnessConfig,
) -> Result<bool> {
    if config.scaffold.command.is_empty() {
        info!("scaffold command not configured, skipping");
        return Ok(false);
    }
    if project_dir.exists() && has_project_content(project_dir)? {
        println!(
            "Directory {} already exists and is not empty; skipping scaffolding.",
            project_dir.display()
        );
        return Ok(false);
    }

    let spec_content = match fs::read_to_string(spec_path) {
        Ok(content) => content,
        Err(err) => {
            warn!(spec = %spec_path.display(), err = %err, "spec unreadable, using default app type");
            String::new()
        }
    };
    let app_type = app_type_from_spec(&spec_content);
    let project_name = project_dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("project")
        .to_string();
    let parent = match project_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;

    println!("\n{}", "=".repeat(70));
    println!("  SCAFFOLDING PROJECT");
    println!("{}", "=".repeat(70));
    println!("\nProject name: {project_name}");
    println!("App type: {app_type}");
    println!("Location: {}\n", project_dir.display());

    let mut cmd = Command::new(&config.scaffold.command[0]);
    cmd.args(&config.scaffold.command[1..])
        .arg("--name")
        .arg(&project_name)
        .arg("--type")
        .arg(app_type.as_str())
        .arg("--path")
        .arg(parent);

    let output = match run_command_with_timeout(
        cmd,
        Duration::from_secs(config.scaffold_timeout_secs),
        config.output_limit_bytes,
    ) {
        Ok(output) => output,
        Err(err) => {
            warn!(err = %err, "scaffold generator failed to run");
            println!("Scaffolding failed; the agent will set the project up manually.");
            return Ok(false);
        }
    };

    print!("{}", String::from_utf8_lossy(&output.stdout));
    if !output.stderr.is_empty() {
        eprint!("{}", String::from_utf8_lossy(&output.stderr));
    }
    if output.timed_out || !output.status.success() {
        warn!(exit_code = ?output.status.code(), timed_out = output.timed_out, "scaffold generator exited abnormally");
        println!("Scaffolding did not complete; the agent may need to fix setup issues.");
        return Ok(false);
    }

    println!("Scaffolding complete.");
    Ok(true)
}

/// Harness-owned entries do not count as project content, so writing config
/// or a policy artifact first never suppresses scaffolding.
fn is_harness_owned(name: &str) -> bool {
    name == ".harness" || name == POLICY_ARTIFACT || name == STATE_MARKER
}

fn has_project_content(path: &Path) -> Result<bool> {
    for entry in fs::read_dir(path).with_context(|| format!("read directory {}", path.display()))? {
        let entry = entry.with_context(|| format!("read directory {}", path.display()))?;
        let name = entry.file_name();
        if !is_harness_owned(&name.to_string_lossy()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Copy the spec into the project under its fixed name.
///
/// Never overwrites: the agent may already be editing its copy. A missing
/// source is a reported degradation, not an error.
pub fn copy_spec_into_project(project_dir: &Path, spec_path: &Path) -> Result<()> {
    let dest = project_dir.join(SPEC_DEST_NAME);
    if dest.exists() {
        return Ok(());
    }
    if !spec_path.is_file() {
        warn!(spec = %spec_path.display(), "spec file missing, nothing to propagate");
        println!("Warning: spec file {} not found", spec_path.display());
        return Ok(());
    }
    fs::create_dir_all(project_dir)
        .with_context(|| format!("create directory {}", project_dir.display()))?;
    fs::copy(spec_path, &dest).with_context(|| {
        format!(
            "copy spec {} to {}",
            spec_path.display(),
            dest.display()
        )
    })?;
    println!("Copied spec into project as {SPEC_DEST_NAME}");
    Ok(())
}

fn backend_required(project_dir: &Path, spec_path: &Path) -> bool {
    if project_dir.join(BACKEND_DIR).exists() {
        return true;
    }
    fs::read_to_string(spec_path)
        .map(|content| spec_mentions_backend(&content))
        .unwrap_or(false)
}

/// Whether the backend already looks provisioned: a generated client
/// directory, or an env file carrying a deployment URL.
pub fn backend_configured(project_dir: &Path) -> bool {
    if project_dir.join(GENERATED_CLIENT_DIR).exists() {
        return true;
    }
    match fs::read_to_string(project_dir.join(ENV_LOCAL)) {
        Ok(contents) => BACKEND_ENV_KEYS.iter().any(|key| contents.contains(key)),
        Err(_) => false,
    }
}

/// Provisioning gate: block until the backend is configured, confirmed, or
/// explicitly skipped.
///
/// Runs on every session start — not only first run — since a previous run
/// may have skipped setup. A `Ready` answer is re-verified deterministically;
/// confirming without real provisioning reports unconfigured truthfully.
pub fn ensure_backend_configured<P: SetupPrompt>(
    project_dir: &Path,
    spec_path: &Path,
    prompt: &P,
) -> bool {
    if !backend_required(project_dir, spec_path) {
        return true;
    }
    if backend_configured(project_dir) {
        println!("Backend is already configured");
        return true;
    }

    match prompt.wait_for_setup(project_dir) {
        GateResponse::Skip => {
            println!("Skipping backend setup - database features will not work");
            false
        }
        GateResponse::Ready => {
            if backend_configured(project_dir) {
                println!("Backend configured successfully");
                maybe_print_seed_hint(project_dir);
                true
            } else {
                println!("Backend setup not detected. Continuing anyway...");
                println!("  (The agent may encounter errors related to the backend)");
                false
            }
        }
    }
}

fn maybe_print_seed_hint(project_dir: &Path) {
    let prospects = project_dir.join(BACKEND_DIR).join("prospects.ts");
    if let Ok(contents) = fs::read_to_string(&prospects)
        && contents.contains("seed")
    {
        println!("\nTip: seed the database with mock data:");
        println!("  cd {}", project_dir.display());
        println!("  npx convex run prospects:seed");
    }
}
