//! The session loop: bootstrap once, then iterate the engine under a ceiling.
//!
//! Control flow depends only on persisted state and stream health, never on
//! the content of agent output. Each iteration is a fresh engine session with
//! a freshly built execution policy.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::{IterationOutcome, SessionStatus};
use crate::io::bootstrap::{
    SPEC_DEST_NAME, SetupPrompt, copy_spec_into_project, ensure_backend_configured,
    scaffold_project,
};
use crate::io::config::HarnessConfig;
use crate::io::engine::{Engine, EngineRequest, run_iteration};
use crate::io::policy::ExecutionPolicy;
use crate::io::prompt::{PromptVariant, render_prompt};
use crate::io::state::is_initialized;
use crate::progress;

/// Default placement for bare project names.
pub const GENERATIONS_DIR: &str = "generations";

/// How a session started, decided once from the persisted marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Fresh,
    Resuming,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStop {
    /// The iteration ceiling was reached. The only stop condition: progress
    /// is handed off through the tracker, not inferred from output.
    CeilingReached,
}

/// What happened over one `run_session` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub start_mode: StartMode,
    pub iterations_run: u32,
    pub last_status: Option<SessionStatus>,
    pub stop: SessionStop,
}

/// Inputs for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub project_dir: PathBuf,
    pub spec_path: PathBuf,
    /// Engine invocations this session. `None` iterates without bound.
    pub max_iterations: Option<u32>,
    pub model: String,
    pub harness: HarnessConfig,
}

/// Resolve the operator-supplied project location.
///
/// Bare names land under `generations/` next to the invocation directory;
/// anything with a path separator (or absolute) is taken as given.
pub fn resolve_project_dir(raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() || raw.contains(std::path::MAIN_SEPARATOR) || raw.contains('/') {
        path.to_path_buf()
    } else {
        Path::new(GENERATIONS_DIR).join(raw)
    }
}

/// Run a full session: bootstrap, then up to `max_iterations` engine calls.
///
/// Bootstrap failures of any kind degrade to "continue anyway"; iteration
/// failures classify and retry. Nothing past startup validation aborts the
/// run. Without a ceiling this does not return.
#[instrument(skip_all, fields(project = %config.project_dir.display(), max_iterations = ?config.max_iterations))]
pub fn run_session<E: Engine, P: SetupPrompt>(
    engine: &E,
    setup_prompt: &P,
    config: &SessionConfig,
) -> Result<SessionReport> {
    let start_mode = if is_initialized(&config.project_dir) {
        StartMode::Resuming
    } else {
        StartMode::Fresh
    };
    progress::print_session_header(
        &config.project_dir,
        config.max_iterations,
        start_mode == StartMode::Resuming,
    );

    if start_mode == StartMode::Fresh
        && let Err(err) = scaffold_project(&config.project_dir, &config.spec_path, &config.harness)
    {
        warn!(err = %format!("{err:#}"), "scaffolding failed, continuing without a skeleton");
        println!("Scaffolding failed: {err:#}");
        println!("The agent will set the project up manually.");
    }
    if let Err(err) = copy_spec_into_project(&config.project_dir, &config.spec_path) {
        warn!(err = %format!("{err:#}"), "spec propagation failed, continuing without it");
        println!("Could not copy the spec into the project: {err:#}");
    }
    if !ensure_backend_configured(&config.project_dir, &config.spec_path, setup_prompt) {
        warn!("continuing without a configured backend");
    }

    let project_name = config
        .project_dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("project")
        .to_string();
    let delay = Duration::from_secs(config.harness.auto_continue_delay_secs);

    // The first-run prompt is sent at most once per session, tracked here
    // rather than re-derived from the marker: if tracker bootstrap fails the
    // next iteration still moves on to the coding prompt and the agent
    // repairs its tracking from inside the session.
    let mut first_run = start_mode == StartMode::Fresh;
    let mut iterations_run = 0u32;
    let mut last_status = None;
    loop {
        let iteration = iterations_run + 1;
        if let Some(max) = config.max_iterations
            && iteration > max
        {
            break;
        }
        progress::print_iteration_banner(&config.project_dir, iteration, config.max_iterations);

        let variant = if first_run {
            PromptVariant::Initializer
        } else {
            PromptVariant::Coding
        };
        first_run = false;

        let outcome = match prepare_request(config, &project_name, variant) {
            Ok(request) => run_iteration(engine, &request),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "iteration setup failed");
                println!("\nError during session: {err:#}");
                IterationOutcome {
                    status: SessionStatus::Error,
                    response_text: String::new(),
                }
            }
        };
        iterations_run = iteration;
        last_status = Some(outcome.status);

        match outcome.status {
            SessionStatus::Continue => {
                info!(iteration, "iteration completed");
            }
            SessionStatus::Error => {
                info!(iteration, "iteration failed, will retry with a fresh session");
                println!("Restarting with a fresh session after error...");
            }
        }

        // Uniform pacing for both outcomes; the error path gets the same
        // backoff as the happy path.
        let more = config.max_iterations.is_none_or(|max| iteration < max);
        if more && !delay.is_zero() {
            println!("\nContinuing in {} seconds...", delay.as_secs());
            thread::sleep(delay);
        }
    }

    progress::print_session_footer(&config.project_dir, iterations_run);
    Ok(SessionReport {
        start_mode,
        iterations_run,
        last_status,
        stop: SessionStop::CeilingReached,
    })
}

/// Render the prompt and materialize a fresh policy for one iteration.
fn prepare_request(
    config: &SessionConfig,
    project_name: &str,
    variant: PromptVariant,
) -> Result<EngineRequest> {
    let prompt = render_prompt(variant, project_name, SPEC_DEST_NAME)?;
    let policy = ExecutionPolicy::build(&config.project_dir, &config.harness.validator.command);
    let settings_path = policy.materialize().context("materialize policy")?;
    Ok(EngineRequest {
        workdir: config.project_dir.clone(),
        prompt,
        model: config.model.clone(),
        settings_path,
        timeout: Duration::from_secs(config.harness.engine_timeout_secs),
    })
}
