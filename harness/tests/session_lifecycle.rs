//! Loop-level tests for full session lifecycle scenarios.
//!
//! These drive `run_session` against scripted engines to verify end-to-end
//! behavior: prompt routing across the initialization boundary, iteration
//! ceilings, error recovery, and the artifacts bootstrap leaves on disk.

use std::fs;
use std::path::{Path, PathBuf};

use harness::core::events::AgentEvent;
use harness::core::types::SessionStatus;
use harness::io::bootstrap::SPEC_DEST_NAME;
use harness::io::config::{HarnessConfig, ScaffoldConfig};
use harness::io::policy::POLICY_ARTIFACT;
use harness::io::state::{ProjectState, write_project_state};
use harness::session::{SessionConfig, SessionStop, StartMode, run_session};
use harness::test_support::{ScriptedEngine, ScriptedEvent, ScriptedPrompt, ScriptedSession};

fn test_harness_config() -> HarnessConfig {
    HarnessConfig {
        auto_continue_delay_secs: 0,
        scaffold: ScaffoldConfig {
            command: Vec::new(),
        },
        ..HarnessConfig::default()
    }
}

fn session_config(project_dir: &Path, spec_path: &Path, max_iterations: u32) -> SessionConfig {
    SessionConfig {
        project_dir: project_dir.to_path_buf(),
        spec_path: spec_path.to_path_buf(),
        max_iterations: Some(max_iterations),
        model: "test-model".to_string(),
        harness: test_harness_config(),
    }
}

fn write_spec(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("spec.txt");
    fs::write(&path, contents).expect("write spec");
    path
}

fn text(text: &str) -> ScriptedEvent {
    ScriptedEvent::Event(AgentEvent::AssistantText(text.to_string()))
}

fn mark_initialized(workdir: &Path) {
    write_project_state(
        workdir,
        &ProjectState {
            initialized: true,
            total_issues: 12,
            meta_issue_id: Some("META-1".to_string()),
        },
    )
    .expect("write marker");
}

/// Fresh-project lifecycle: iteration 1 runs the initializer prompt, the
/// scripted agent writes the marker during that session, and iteration 2
/// routes to the coding prompt without restarting the harness.
#[test]
fn fresh_project_routes_initializer_then_coding() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("app");
    let spec = write_spec(temp.path(), "A plain static site.");

    let engine = ScriptedEngine::with_sessions(vec![
        ScriptedSession::with_effect(
            vec![text("setting up tracker")],
            Box::new(|workdir| mark_initialized(workdir)),
        ),
        ScriptedSession::new(vec![text("implementing first issue")]),
    ]);
    let prompt = ScriptedPrompt::new(Vec::new());

    let report = run_session(&engine, &prompt, &session_config(&project, &spec, 2))
        .expect("run session");

    assert_eq!(report.start_mode, StartMode::Fresh);
    assert_eq!(report.iterations_run, 2);
    assert_eq!(report.last_status, Some(SessionStatus::Continue));
    assert_eq!(report.stop, SessionStop::CeilingReached);

    let prompts = engine.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("brand-new project"));
    assert!(prompts[1].contains("continuing work"));
}

/// The first-run prompt is sent exactly once even when tracker bootstrap
/// fails: a scripted agent that never writes the marker still gets the
/// coding prompt from iteration 2 on, and the agent repairs its tracking
/// from inside the session.
#[test]
fn initializer_prompt_is_sent_exactly_once_without_marker() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("app");
    let spec = write_spec(temp.path(), "A plain static site.");

    let engine = ScriptedEngine::new(vec![
        vec![text("tracker setup failed")],
        vec![text("working anyway")],
        vec![text("still working")],
    ]);
    let prompt = ScriptedPrompt::new(Vec::new());

    let report = run_session(&engine, &prompt, &session_config(&project, &spec, 3))
        .expect("run session");

    assert_eq!(report.start_mode, StartMode::Fresh);
    let prompts = engine.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("brand-new project"));
    assert!(prompts[1].contains("continuing work"));
    assert!(prompts[2].contains("continuing work"));
    let first_run_count = prompts
        .iter()
        .filter(|p| p.contains("brand-new project"))
        .count();
    assert_eq!(first_run_count, 1);
}

/// Bootstrap filesystem failures degrade instead of aborting: a target path
/// that exists as a plain file breaks directory scanning, spec propagation,
/// and policy writes, yet the session still runs to its ceiling.
#[test]
fn bootstrap_io_failures_degrade_instead_of_aborting() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("app");
    fs::write(&project, "not a directory").expect("write file in the way");
    let spec = write_spec(temp.path(), "A plain static site.");

    let engine = ScriptedEngine::new(Vec::new());
    let prompt = ScriptedPrompt::new(Vec::new());
    let config = SessionConfig {
        project_dir: project.clone(),
        spec_path: spec.clone(),
        max_iterations: Some(1),
        model: "test-model".to_string(),
        harness: HarnessConfig {
            auto_continue_delay_secs: 0,
            ..HarnessConfig::default()
        },
    };

    let report = run_session(&engine, &prompt, &config).expect("run degraded, not abort");

    assert_eq!(report.iterations_run, 1);
    assert_eq!(report.last_status, Some(SessionStatus::Error));
    // The engine is never reached: policy materialization fails first.
    assert!(engine.prompts().is_empty());
}

/// Resuming lifecycle: with the marker already on disk, every iteration uses
/// the coding prompt and no setup prompt fires for a backend-free spec.
#[test]
fn resuming_project_routes_coding_from_first_iteration() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("app");
    fs::create_dir_all(&project).expect("mkdir");
    mark_initialized(&project);
    let spec = write_spec(temp.path(), "A plain static site.");

    let engine = ScriptedEngine::new(vec![vec![text("resuming work")]]);
    let prompt = ScriptedPrompt::new(Vec::new());

    let report = run_session(&engine, &prompt, &session_config(&project, &spec, 1))
        .expect("run session");

    assert_eq!(report.start_mode, StartMode::Resuming);
    let prompts = engine.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("continuing work"));
    assert_eq!(prompt.calls(), 0);
}

/// The ceiling is exact: a session with N iterations starts the engine N
/// times, no more, even when every iteration succeeds and could continue.
#[test]
fn iteration_ceiling_is_never_exceeded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("app");
    fs::create_dir_all(&project).expect("mkdir");
    mark_initialized(&project);
    let spec = write_spec(temp.path(), "spec");

    let engine = ScriptedEngine::new(vec![
        vec![text("one")],
        vec![text("two")],
        vec![text("three")],
    ]);
    let prompt = ScriptedPrompt::new(Vec::new());

    let report = run_session(&engine, &prompt, &session_config(&project, &spec, 3))
        .expect("run session");

    assert_eq!(report.iterations_run, 3);
    assert_eq!(engine.prompts().len(), 3);
    assert_eq!(report.stop, SessionStop::CeilingReached);
}

/// A transport failure mid-stream consumes its iteration and the loop retries
/// with a fresh session instead of aborting.
#[test]
fn transport_errors_retry_with_fresh_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("app");
    fs::create_dir_all(&project).expect("mkdir");
    mark_initialized(&project);
    let spec = write_spec(temp.path(), "spec");

    let engine = ScriptedEngine::new(vec![
        vec![
            text("partial"),
            ScriptedEvent::Fail("stream timed out".to_string()),
        ],
        vec![text("recovered")],
    ]);
    let prompt = ScriptedPrompt::new(Vec::new());

    let report = run_session(&engine, &prompt, &session_config(&project, &spec, 2))
        .expect("run session");

    assert_eq!(report.iterations_run, 2);
    assert_eq!(report.last_status, Some(SessionStatus::Continue));
    assert_eq!(engine.prompts().len(), 2);
}

/// Bootstrap artifacts: the spec lands in the project under its fixed name
/// and each iteration leaves a parseable policy artifact behind.
#[test]
fn bootstrap_leaves_spec_copy_and_policy_artifact() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("app");
    let spec = write_spec(temp.path(), "Build a landing page.");

    let engine = ScriptedEngine::new(vec![vec![text("ok")]]);
    let prompt = ScriptedPrompt::new(Vec::new());

    run_session(&engine, &prompt, &session_config(&project, &spec, 1)).expect("run session");

    let spec_copy = fs::read_to_string(project.join(SPEC_DEST_NAME)).expect("spec copy");
    assert_eq!(spec_copy, "Build a landing page.");

    let settings = fs::read_to_string(project.join(POLICY_ARTIFACT)).expect("policy artifact");
    let parsed: serde_json::Value = serde_json::from_str(&settings).expect("valid json");
    let allow = parsed
        .pointer("/permissions/allow")
        .and_then(|v| v.as_array())
        .expect("allow list");
    assert!(allow.iter().any(|v| v == "Bash(*)"));
}

/// An engine that fails on every iteration still runs to the ceiling; the
/// report records the degraded final status rather than an error.
#[test]
fn persistent_engine_failure_still_respects_ceiling() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("app");
    fs::create_dir_all(&project).expect("mkdir");
    mark_initialized(&project);
    let spec = write_spec(temp.path(), "spec");

    // No scripted sessions at all: every start errors.
    let engine = ScriptedEngine::new(Vec::new());
    let prompt = ScriptedPrompt::new(Vec::new());

    let report = run_session(&engine, &prompt, &session_config(&project, &spec, 2))
        .expect("run session");

    assert_eq!(report.iterations_run, 2);
    assert_eq!(report.last_status, Some(SessionStatus::Error));
    assert_eq!(report.stop, SessionStop::CeilingReached);
}
