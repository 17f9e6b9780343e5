//! Scripted fakes for exercising the session loop without a real engine.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::core::events::AgentEvent;
use crate::io::bootstrap::{GateResponse, SetupPrompt};
use crate::io::engine::{Engine, EngineRequest, EventStream};

/// One scripted item in a fake engine session.
#[derive(Debug, Clone)]
pub enum ScriptedEvent {
    Event(AgentEvent),
    /// Fail the stream at this point with the given message.
    Fail(String),
}

/// Side effect run when a scripted session starts, with the session workdir.
/// Stands in for on-disk changes the real agent would make.
pub type SessionEffect = Box<dyn Fn(&Path) + Send>;

/// One scripted engine session.
pub struct ScriptedSession {
    pub events: Vec<ScriptedEvent>,
    pub effect: Option<SessionEffect>,
}

impl ScriptedSession {
    pub fn new(events: Vec<ScriptedEvent>) -> Self {
        Self {
            events,
            effect: None,
        }
    }

    pub fn with_effect(events: Vec<ScriptedEvent>, effect: SessionEffect) -> Self {
        Self {
            events,
            effect: Some(effect),
        }
    }
}

/// Engine fake that replays scripted sessions in order and records the
/// prompts it was started with.
pub struct ScriptedEngine {
    sessions: Mutex<Vec<ScriptedSession>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new(sessions: Vec<Vec<ScriptedEvent>>) -> Self {
        Self::with_sessions(sessions.into_iter().map(ScriptedSession::new).collect())
    }

    pub fn with_sessions(sessions: Vec<ScriptedSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts passed to `start`, in invocation order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Engine for ScriptedEngine {
    type Stream = ScriptedStream;

    fn start(&self, request: &EngineRequest) -> Result<ScriptedStream> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.is_empty() {
            return Err(anyhow!("scripted engine exhausted"));
        }
        let session = sessions.remove(0);
        if let Some(effect) = &session.effect {
            effect(&request.workdir);
        }
        Ok(ScriptedStream {
            events: session.events,
        })
    }
}

pub struct ScriptedStream {
    events: Vec<ScriptedEvent>,
}

impl EventStream for ScriptedStream {
    fn next_event(&mut self) -> Result<Option<AgentEvent>> {
        if self.events.is_empty() {
            return Ok(None);
        }
        match self.events.remove(0) {
            ScriptedEvent::Event(event) => Ok(Some(event)),
            ScriptedEvent::Fail(message) => Err(anyhow!(message)),
        }
    }
}

/// Setup prompt fake replaying scripted responses; exhaustion answers skip.
pub struct ScriptedPrompt {
    responses: Mutex<Vec<GateResponse>>,
    calls: Mutex<usize>,
}

impl ScriptedPrompt {
    pub fn new(responses: Vec<GateResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl SetupPrompt for ScriptedPrompt {
    fn wait_for_setup(&self, _project_dir: &Path) -> GateResponse {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            GateResponse::Skip
        } else {
            responses.remove(0)
        }
    }
}
