//! Outcome types shared between the executor and the session loop.

/// Terminal classification of one iteration.
///
/// Deliberately coarse: tool-level failures inside a session do not change the
/// classification because the agent is expected to self-correct next session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The event stream drained normally; continue with a fresh session.
    Continue,
    /// The engine call or its stream failed; retry with a fresh session.
    Error,
}

/// Result of one executor invocation. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub status: SessionStatus,
    /// Accumulated assistant text. Informational only; never parsed for
    /// control decisions.
    pub response_text: String,
}
