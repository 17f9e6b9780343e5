use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;

use harness::exit_codes;
use harness::io::bootstrap::StdinPrompt;
use harness::io::config::{harness_config_path, load_config};
use harness::io::engine::CliEngine;
use harness::logging;
use harness::session::{GENERATIONS_DIR, SessionConfig, resolve_project_dir, run_session};

const DEFAULT_MODEL: &str = "claude-opus-4-5-20251101";
const ENGINE_TOKEN_VAR: &str = "AGENT_OAUTH_TOKEN";
const TRACKER_KEY_VAR: &str = "LINEAR_API_KEY";

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Session harness for long-running autonomous coding agents"
)]
struct Cli {
    /// Project name or path. Bare names are placed under `generations/`.
    #[arg(long, default_value = "autonomous_demo_project")]
    project_dir: String,

    /// Application specification file to build from.
    #[arg(long)]
    spec: String,

    /// Engine invocations this session (the ceiling, never exceeded).
    /// Omit to iterate until interrupted.
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Model identifier passed to the engine.
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(exit_codes::FATAL);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    install_interrupt_handler()?;
    require_engine_token()?;
    warn_missing_tracker_key();

    let spec_path = Path::new(&cli.spec);
    if !spec_path.is_file() {
        bail!("spec file not found: {}", spec_path.display());
    }
    if cli.max_iterations == Some(0) {
        bail!("--max-iterations must be at least 1");
    }

    let project_dir = resolve_project_dir(&cli.project_dir);
    if project_dir.starts_with(GENERATIONS_DIR) {
        ensure_generations_readme()?;
    }

    let config = load_config(&harness_config_path(&project_dir)).context("load harness config")?;
    let engine = CliEngine::new(config.engine.command.clone());

    let session = SessionConfig {
        project_dir,
        spec_path: spec_path.to_path_buf(),
        max_iterations: cli.max_iterations,
        model: cli.model,
        harness: config,
    };
    run_session(&engine, &StdinPrompt, &session)?;
    Ok(())
}

/// Ctrl-C prints a resume hint and exits cleanly. No cleanup is needed:
/// every persisted write is atomic, so a re-invocation picks up from the
/// last consistent state.
fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        println!("\n\nInterrupted by user");
        println!("To resume, run the same command again.");
        std::process::exit(exit_codes::OK);
    })
    .context("install interrupt handler")
}

fn require_engine_token() -> Result<()> {
    if std::env::var_os(ENGINE_TOKEN_VAR).is_none() {
        bail!(
            "{ENGINE_TOKEN_VAR} is not set; the engine cannot authenticate. \
             Export it before starting a session."
        );
    }
    Ok(())
}

/// Tracker access without the key falls back to whatever credential the
/// tracker integration is globally configured with. Degraded, not fatal.
fn warn_missing_tracker_key() {
    if std::env::var_os(TRACKER_KEY_VAR).is_none() {
        warn!("{TRACKER_KEY_VAR} is not set, tracker access may be unavailable");
        println!("Warning: {TRACKER_KEY_VAR} is not set. Using globally configured tracker access, if any.");
    }
}

fn ensure_generations_readme() -> Result<()> {
    let dir = Path::new(GENERATIONS_DIR);
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    let readme = dir.join("README.md");
    if readme.exists() {
        return Ok(());
    }
    fs::write(
        &readme,
        "# Generations\n\nProjects built by the session harness. Each subdirectory is one\ngenerated application; safe to delete when no longer needed.\n",
    )
    .with_context(|| format!("write {}", readme.display()))?;
    Ok(())
}
