//! Roleconnect: declarative automatic role grant/revoke for community guilds.
//!
//! A *role connection* says "if a member satisfies these role conditions,
//! give (or remove) this target role". The engine keeps every member's
//! roles converged with the enabled connections, reactively on role-change
//! events and defensively with a periodic full sweep.
//!
//! # Architecture
//!
//! ```text
//! Engine
//!   │
//!   ├── ReconciliationScheduler (every 5 min)
//!   │     └── for each guild: reload rules → process_member(every member)
//!   │
//!   ├── EventBridge (member role-change events)
//!   │     └── skip if another subsystem holds the member → process_member(member)
//!   │
//!   └── ConnectionManager
//!         ├── per-guild cache: rules + protected roles (reloaded wholesale)
//!         ├── authoring: add / remove / toggle / logic / protect / unprotect
//!         └── process_member: conditions → decision table → Platform add/remove
//! ```
//!
//! # Decision table
//!
//! | Action | Satisfied | Has role | Effect |
//! |--------|-----------|----------|--------|
//! | give | yes | no | add |
//! | give | no | yes | remove |
//! | remove | yes | yes | remove |
//! | otherwise | | | nothing |
//!
//! Bots and holders of a protected role are never touched.
//!
//! # Features
//!
//! - `native` (default) - `FileStore`, `init_logging`, and the `roleconnect` CLI
//!
//! # Usage
//!
//! ```ignore
//! use roleconnect::{Action, Condition, ConnectionManager, GuildId, Logic, MemoryStore, RoleId};
//! use std::sync::Arc;
//!
//! let manager = ConnectionManager::new(Arc::new(MemoryStore::new()));
//! let id = manager
//!     .add_connection(GuildId(42), RoleId(20), Action::Give, vec![Condition::has(10u64)], Logic::And)
//!     .await?;
//!
//! let report = manager.process_member(&platform, &member).await;
//! ```

// =============================================================================
// Shared modules
// =============================================================================
pub mod bridge;
pub mod connections;
pub mod core;
pub mod engine;
pub mod platform;
pub mod runtime;
pub mod store;
pub mod sweep;

// =============================================================================
// Native-only modules
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================
pub use bridge::{EventBridge, MemberLock, ProcessingMembers, Unlocked};
pub use connections::{ConnectionError, ConnectionManager, GuildRules, MemberReport, SkipReason};
pub use crate::core::{Action, Condition, ConditionKind, GuildId, Logic, RoleChange, RoleId, Rule, RuleId, UserId};
pub use engine::{Engine, EngineConfig, EngineHandle};
pub use platform::{Member, MemberUpdate, MemoryPlatform, Platform, PlatformError, Role};
pub use runtime::{install_signal_handlers, Shutdown, ShutdownSignal};
pub use store::{MemoryStore, SettingsStore, StoreError};
pub use sweep::{ReconciliationScheduler, SweepReport};

#[cfg(feature = "native")]
pub use store::FileStore;
