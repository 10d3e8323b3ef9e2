//! Connections: per-guild rule cache, authoring operations, and convergence
//!
//! # Flow
//!
//! ```text
//! authoring (CLI / UI) ──► ConnectionManager ──► SettingsStore
//!                                │  (whole-list rewrite)
//!                                ▼
//!                          guild cache (replaced wholesale on every load)
//!                                │
//!          sweep / bridge ──► process_member ──► Platform add/remove
//! ```
//!
//! # Authoring contract
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `add_connection` | next id = max + 1, append, persist |
//! | `remove_connection` | filter out, persist |
//! | `toggle_connection` | flip `enabled`, persist |
//! | `update_connection_logic` | set AND/OR, persist |
//! | `add_protected_role` / `remove_protected_role` | idempotent set edit, persist |
//!
//! Input validation is the caller's job.

mod manager;
mod report;

pub use manager::{ConnectionError, ConnectionManager, GuildRules};
pub use report::{AppliedChange, FailedChange, MemberReport, SkipReason};
