//! Platform contract: what the engine consumes from the chat gateway/REST client
//!
//! Member role sets are always read from the platform at evaluation time;
//! the engine never caches or persists them.
//!
//! # Contract
//!
//! | Call | Used by |
//! |------|---------|
//! | `guilds` | sweep: every connected guild |
//! | `members` | sweep: every member the platform exposes |
//! | `resolve_role` | `process_member`: stale target detection |
//! | `add_role` / `remove_role` | `process_member`: the only mutations |
//!
//! Member-update events are delivered separately as a stream of
//! [`MemberUpdate`] into the bridge.

mod memory;

pub use memory::{MemoryPlatform, MutationRecord};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

use crate::core::{GuildId, RoleId, UserId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("missing permission to manage role {role}")]
    PermissionDenied { role: RoleId },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// Snapshot of a guild member as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub bot: bool,
    pub roles: HashSet<RoleId>,
}

impl Member {
    pub fn new(guild_id: impl Into<GuildId>, user_id: impl Into<UserId>) -> Self {
        Self { guild_id: guild_id.into(), user_id: user_id.into(), bot: false, roles: HashSet::new() }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<RoleId>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_bot(mut self) -> Self { self.bot = true; self }

    pub fn has_role(&self, role: RoleId) -> bool { self.roles.contains(&role) }

    pub fn holds_any(&self, roles: &BTreeSet<RoleId>) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }
}

/// Member-update event with role snapshots on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberUpdate {
    pub before: Member,
    pub after: Member,
}

impl MemberUpdate {
    pub fn roles_changed(&self) -> bool { self.before.roles != self.after.roles }
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Guilds currently connected
    async fn guilds(&self) -> Vec<GuildId>;
    async fn members(&self, guild_id: GuildId) -> Result<Vec<Member>, PlatformError>;
    /// `None` when the role no longer exists
    async fn resolve_role(&self, guild_id: GuildId, role_id: RoleId) -> Option<Role>;
    async fn add_role(&self, member: &Member, role_id: RoleId, reason: &str) -> Result<(), PlatformError>;
    async fn remove_role(&self, member: &Member, role_id: RoleId, reason: &str) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_role_queries() {
        let member = Member::new(1u64, 2u64).with_roles([10u64, 11]);
        assert!(member.has_role(RoleId(10)));
        assert!(!member.has_role(RoleId(12)));
        assert!(member.holds_any(&[RoleId(12), RoleId(11)].into_iter().collect()));
        assert!(!member.holds_any(&BTreeSet::new()));
        assert!(!member.bot);
        assert!(member.as_bot().bot);
    }

    #[test]
    fn update_detects_role_change_only() {
        let before = Member::new(1u64, 2u64).with_roles([10u64]);
        let same = MemberUpdate { before: before.clone(), after: before.clone() };
        assert!(!same.roles_changed());
        let changed = MemberUpdate { before: before.clone(), after: before.with_roles([10u64, 11]) };
        assert!(changed.roles_changed());
    }
}
