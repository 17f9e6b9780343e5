//! Session harness for long-running autonomous coding agents.
//!
//! Wraps an agent CLI in an iteration loop: bootstrap the target project once,
//! then repeatedly invoke the engine with the right prompt until an iteration
//! ceiling is reached. Progress survives restarts through a persisted marker
//! and an external issue tracker, never through conversational memory. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (event parsing, spec heuristics,
//!   outcome types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem state, child processes,
//!   the engine boundary). Isolated to enable scripted fakes in tests.
//!
//! [`session`] coordinates core logic with I/O to implement the loop.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod progress;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
