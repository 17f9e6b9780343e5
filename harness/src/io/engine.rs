//! Engine abstraction and its CLI-backed implementation.
//!
//! The [`Engine`] trait is the seam between the iteration loop and the real
//! agent CLI, so the session machinery is testable against scripted fakes.
//! One invocation is one engine session: the prompt goes in on stdin, typed
//! events come back until the stream drains or fails.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::events::{AgentEvent, ToolDisposition, truncate};
use crate::core::types::{IterationOutcome, SessionStatus};
use crate::io::process::{LineStream, spawn_line_stream};

/// Characters of response text echoed in the iteration banner.
const RESPONSE_ECHO_LIMIT: usize = 500;

/// Everything one engine invocation needs.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub workdir: PathBuf,
    pub prompt: String,
    pub model: String,
    pub settings_path: PathBuf,
    pub timeout: Duration,
}

/// A live engine session's event stream.
pub trait EventStream {
    /// Next typed event, `Ok(None)` at normal end of stream.
    fn next_event(&mut self) -> Result<Option<AgentEvent>>;
}

/// Starts engine sessions.
pub trait Engine {
    type Stream: EventStream;

    fn start(&self, request: &EngineRequest) -> Result<Self::Stream>;
}

/// Production engine: spawns the agent CLI and parses its JSONL stdout.
pub struct CliEngine {
    command: Vec<String>,
}

impl CliEngine {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Engine for CliEngine {
    type Stream = CliEventStream;

    #[instrument(skip_all, fields(model = %request.model, workdir = %request.workdir.display()))]
    fn start(&self, request: &EngineRequest) -> Result<CliEventStream> {
        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("engine command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..])
            .arg("--model")
            .arg(&request.model)
            .arg("--settings")
            .arg(&request.settings_path)
            .current_dir(&request.workdir);

        debug!("starting engine session");
        let lines = spawn_line_stream(cmd, request.prompt.as_bytes(), request.timeout)?;
        Ok(CliEventStream {
            lines,
            pending: Vec::new(),
        })
    }
}

/// Lazily parses stdout lines into events. A line can carry several events;
/// extras queue in `pending` until consumed.
pub struct CliEventStream {
    lines: LineStream,
    pending: Vec<AgentEvent>,
}

impl EventStream for CliEventStream {
    fn next_event(&mut self) -> Result<Option<AgentEvent>> {
        loop {
            if !self.pending.is_empty() {
                return Ok(Some(self.pending.remove(0)));
            }
            match self.lines.next_line() {
                None => return Ok(None),
                Some(Err(err)) => return Err(err),
                Some(Ok(line)) => {
                    self.pending = AgentEvent::parse_line(&line);
                }
            }
        }
    }
}

/// Run one full iteration against the engine.
///
/// Drains the stream to completion, narrating events to the operator, and
/// classifies the iteration. Transport failures mid-stream classify as
/// [`SessionStatus::Error`]; tool-level errors inside a healthy stream do not.
pub fn run_iteration<E: Engine>(engine: &E, request: &EngineRequest) -> IterationOutcome {
    let mut stream = match engine.start(request) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "engine failed to start");
            println!("\nError during session: {err:#}");
            return IterationOutcome {
                status: SessionStatus::Error,
                response_text: String::new(),
            };
        }
    };

    let mut response_text = String::new();
    loop {
        match stream.next_event() {
            Ok(None) => break,
            Ok(Some(event)) => narrate_event(&event, &mut response_text),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "engine stream failed");
                println!("\nError during session: {err:#}");
                return IterationOutcome {
                    status: SessionStatus::Error,
                    response_text,
                };
            }
        }
    }

    if !response_text.is_empty() {
        println!(
            "\nSession response (truncated): {}",
            truncate(&response_text, RESPONSE_ECHO_LIMIT)
        );
    }
    IterationOutcome {
        status: SessionStatus::Continue,
        response_text,
    }
}

fn narrate_event(event: &AgentEvent, response_text: &mut String) {
    match event {
        AgentEvent::AssistantText(text) => {
            println!("{text}");
            response_text.push_str(text);
        }
        AgentEvent::ToolInvocation {
            name,
            input_preview,
        } => {
            println!("\n[Tool: {name}] {input_preview}");
        }
        AgentEvent::ToolResult(ToolDisposition::Ok) => {
            println!("[Done]");
        }
        AgentEvent::ToolResult(ToolDisposition::Error(detail)) => {
            println!("[Error] {detail}");
        }
        AgentEvent::ToolResult(ToolDisposition::Blocked(detail)) => {
            println!("[BLOCKED] {detail}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedEngine, ScriptedEvent};

    fn request() -> EngineRequest {
        EngineRequest {
            workdir: PathBuf::from("."),
            prompt: "do work".to_string(),
            model: "test-model".to_string(),
            settings_path: PathBuf::from(".agent_settings.json"),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn drained_stream_classifies_continue() {
        let engine = ScriptedEngine::new(vec![vec![
            ScriptedEvent::Event(AgentEvent::AssistantText("working".to_string())),
            ScriptedEvent::Event(AgentEvent::ToolResult(ToolDisposition::Ok)),
        ]]);

        let outcome = run_iteration(&engine, &request());
        assert_eq!(outcome.status, SessionStatus::Continue);
        assert_eq!(outcome.response_text, "working");
    }

    #[test]
    fn tool_errors_do_not_fail_the_iteration() {
        let engine = ScriptedEngine::new(vec![vec![
            ScriptedEvent::Event(AgentEvent::ToolResult(ToolDisposition::Error(
                "compile failed".to_string(),
            ))),
            ScriptedEvent::Event(AgentEvent::ToolResult(ToolDisposition::Blocked(
                "Command blocked".to_string(),
            ))),
            ScriptedEvent::Event(AgentEvent::AssistantText("recovering".to_string())),
        ]]);

        let outcome = run_iteration(&engine, &request());
        assert_eq!(outcome.status, SessionStatus::Continue);
        assert_eq!(outcome.response_text, "recovering");
    }

    #[test]
    fn transport_failure_classifies_error() {
        let engine = ScriptedEngine::new(vec![vec![
            ScriptedEvent::Event(AgentEvent::AssistantText("partial".to_string())),
            ScriptedEvent::Fail("stream timed out".to_string()),
        ]]);

        let outcome = run_iteration(&engine, &request());
        assert_eq!(outcome.status, SessionStatus::Error);
        assert_eq!(outcome.response_text, "partial");
    }

    #[test]
    fn cli_stream_queues_multiple_events_per_line() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]}}"#;
        let sh = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(format!("printf '%s\\n' '{line}'"));
            cmd
        };
        let lines = spawn_line_stream(sh, b"", Duration::from_secs(5)).expect("spawn");
        let mut stream = CliEventStream {
            lines,
            pending: Vec::new(),
        };

        assert_eq!(
            stream.next_event().expect("event"),
            Some(AgentEvent::AssistantText("a".to_string()))
        );
        assert_eq!(
            stream.next_event().expect("event"),
            Some(AgentEvent::AssistantText("b".to_string()))
        );
        assert_eq!(stream.next_event().expect("event"), None);
    }
}
