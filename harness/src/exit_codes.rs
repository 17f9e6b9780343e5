//! Stable exit codes for the harness CLI.

/// Session ran to its iteration ceiling.
pub const OK: i32 = 0;
/// Fatal setup failure (unusable config, missing credentials, bad spec path).
pub const FATAL: i32 = 1;
