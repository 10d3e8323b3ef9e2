//! MemoryPlatform: in-process guilds, roles, and members
//!
//! Backs the CLI dry run and the test suites. Role changes that actually
//! alter a member (engine-made or external) are published as
//! [`MemberUpdate`]s on the subscribed channel, the same way a gateway
//! echoes the bot's own mutations back to it.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::{Member, MemberUpdate, Platform, PlatformError, Role};
use crate::core::{GuildId, RoleChange, RoleId, UserId};

/// One add/remove call, recorded whether or not it changed anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRecord {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub change: RoleChange,
    pub reason: String,
}

#[derive(Debug, Default)]
struct GuildState {
    roles: BTreeMap<RoleId, Role>,
    members: BTreeMap<UserId, Member>,
    denied: HashSet<RoleId>,
    unavailable: bool,
}

#[derive(Debug, Default)]
struct State {
    guilds: BTreeMap<GuildId, GuildState>,
    log: Vec<MutationRecord>,
    events: Option<mpsc::UnboundedSender<MemberUpdate>>,
}

#[derive(Debug, Default)]
pub struct MemoryPlatform {
    state: Mutex<State>,
}

impl MemoryPlatform {
    pub fn new() -> Self { Self::default() }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Route member-update events to a fresh channel (replaces any previous one).
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MemberUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().events = Some(tx);
        rx
    }

    pub fn add_guild(&self, guild_id: impl Into<GuildId>) {
        self.state().guilds.entry(guild_id.into()).or_default();
    }

    pub fn create_role(&self, guild_id: impl Into<GuildId>, role_id: impl Into<RoleId>, name: impl Into<String>) {
        let role_id = role_id.into();
        let mut state = self.state();
        let guild = state.guilds.entry(guild_id.into()).or_default();
        guild.roles.insert(role_id, Role { id: role_id, name: name.into() });
    }

    /// Delete a role; members keep no trace of it.
    pub fn delete_role(&self, guild_id: impl Into<GuildId>, role_id: impl Into<RoleId>) {
        let role_id = role_id.into();
        let mut state = self.state();
        if let Some(guild) = state.guilds.get_mut(&guild_id.into()) {
            guild.roles.remove(&role_id);
            for member in guild.members.values_mut() {
                member.roles.remove(&role_id);
            }
        }
    }

    /// Insert or replace a member without emitting an event.
    pub fn upsert_member(&self, member: Member) {
        let mut state = self.state();
        let guild = state.guilds.entry(member.guild_id).or_default();
        guild.members.insert(member.user_id, member);
    }

    pub fn member(&self, guild_id: impl Into<GuildId>, user_id: impl Into<UserId>) -> Option<Member> {
        let state = self.state();
        state.guilds.get(&guild_id.into())?.members.get(&user_id.into()).cloned()
    }

    /// External role edit (another bot, a moderator). Emits an event on change.
    pub fn set_member_roles(
        &self,
        guild_id: impl Into<GuildId>,
        user_id: impl Into<UserId>,
        roles: impl IntoIterator<Item = impl Into<RoleId>>,
    ) -> Option<Member> {
        let roles: HashSet<RoleId> = roles.into_iter().map(Into::into).collect();
        let mut state = self.state();
        let guild = state.guilds.get_mut(&guild_id.into())?;
        let member = guild.members.get_mut(&user_id.into())?;
        let before = member.clone();
        member.roles = roles;
        let after = member.clone();
        Self::emit(&state, before, after.clone());
        Some(after)
    }

    /// Make add/remove of `role_id` fail with `PermissionDenied`.
    pub fn deny_role(&self, guild_id: impl Into<GuildId>, role_id: impl Into<RoleId>) {
        let mut state = self.state();
        state.guilds.entry(guild_id.into()).or_default().denied.insert(role_id.into());
    }

    /// Make member enumeration for the guild fail.
    pub fn set_unavailable(&self, guild_id: impl Into<GuildId>, unavailable: bool) {
        let mut state = self.state();
        state.guilds.entry(guild_id.into()).or_default().unavailable = unavailable;
    }

    pub fn mutations(&self) -> Vec<MutationRecord> { self.state().log.clone() }
    pub fn mutation_count(&self) -> usize { self.state().log.len() }
    pub fn clear_mutations(&self) { self.state().log.clear(); }

    fn emit(state: &State, before: Member, after: Member) {
        if before.roles == after.roles {
            return;
        }
        if let Some(tx) = &state.events {
            // Receiver gone means nobody listens any more.
            let _ = tx.send(MemberUpdate { before, after });
        }
    }

    fn mutate(&self, member: &Member, role_id: RoleId, change: RoleChange, reason: &str) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.log.push(MutationRecord {
            guild_id: member.guild_id,
            user_id: member.user_id,
            role_id,
            change,
            reason: reason.to_string(),
        });

        let guild = state
            .guilds
            .get_mut(&member.guild_id)
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", member.guild_id)))?;
        if !guild.roles.contains_key(&role_id) {
            return Err(PlatformError::NotFound(format!("role {}", role_id)));
        }
        if guild.denied.contains(&role_id) {
            return Err(PlatformError::PermissionDenied { role: role_id });
        }
        let current = guild
            .members
            .get_mut(&member.user_id)
            .ok_or_else(|| PlatformError::NotFound(format!("member {}", member.user_id)))?;

        let before = current.clone();
        match change {
            RoleChange::Add => current.roles.insert(role_id),
            RoleChange::Remove => current.roles.remove(&role_id),
        };
        let after = current.clone();
        Self::emit(&state, before, after);
        Ok(())
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn guilds(&self) -> Vec<GuildId> {
        self.state().guilds.keys().copied().collect()
    }

    async fn members(&self, guild_id: GuildId) -> Result<Vec<Member>, PlatformError> {
        let state = self.state();
        let guild = state
            .guilds
            .get(&guild_id)
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", guild_id)))?;
        if guild.unavailable {
            return Err(PlatformError::Unavailable(format!("guild {} members", guild_id)));
        }
        Ok(guild.members.values().cloned().collect())
    }

    async fn resolve_role(&self, guild_id: GuildId, role_id: RoleId) -> Option<Role> {
        self.state().guilds.get(&guild_id)?.roles.get(&role_id).cloned()
    }

    async fn add_role(&self, member: &Member, role_id: RoleId, reason: &str) -> Result<(), PlatformError> {
        self.mutate(member, role_id, RoleChange::Add, reason)
    }

    async fn remove_role(&self, member: &Member, role_id: RoleId, reason: &str) -> Result<(), PlatformError> {
        self.mutate(member, role_id, RoleChange::Remove, reason)
    }
}
