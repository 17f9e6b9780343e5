//! Side-effecting operations: filesystem, child processes, the engine boundary.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod policy;
pub mod process;
pub mod prompt;
pub mod state;
