//! Pure, deterministic logic with no I/O.

pub mod events;
pub mod spec_doc;
pub mod types;
