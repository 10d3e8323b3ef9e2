//! ConnectionManager: cache + CRUD + process_member

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::report::{AppliedChange, FailedChange, MemberReport, SkipReason};
use crate::core::keys::settings;
use crate::core::{Action, Condition, GuildId, Logic, RoleChange, RoleId, Rule, RuleId};
use crate::platform::{Member, Platform, PlatformError};
use crate::store::{SettingsStore, StoreError};

/// Errors surfaced to authoring callers. Loads never fail.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to persist: {0}")]
    Store(#[from] StoreError),

    #[error("failed to encode: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("guild {0}: no rule ids left")]
    IdsExhausted(GuildId),
}

/// Cached state for one guild
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildRules {
    pub connections: Vec<Rule>,
    pub protected: BTreeSet<RoleId>,
}

impl GuildRules {
    pub fn enabled(&self) -> impl Iterator<Item = &Rule> {
        self.connections.iter().filter(|r| r.enabled)
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.connections.iter().find(|r| r.id == id)
    }
}

/// Next id is max + 1, so an emptied guild starts over at 1. `None` once
/// a stored id already sits at the top of the range.
fn next_id(rules: &[Rule]) -> Option<RuleId> {
    rules.iter().map(|r| r.id).max().unwrap_or(0).checked_add(1)
}

pub struct ConnectionManager {
    store: Arc<dyn SettingsStore>,
    cache: RwLock<HashMap<GuildId, GuildRules>>,
}

impl ConnectionManager {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store, cache: RwLock::new(HashMap::new()) }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> { &self.store }

    // =========================================================================
    // Loading (never fails; degrades to empty)
    // =========================================================================

    /// Read rules from the store and replace the cached list.
    pub async fn load_connections(&self, guild_id: GuildId) -> Vec<Rule> {
        let connections = self.read_connections(guild_id).await;
        self.cache.write().await.entry(guild_id).or_default().connections = connections.clone();
        connections
    }

    /// Read protected roles from the store and replace the cached set.
    pub async fn load_protected_roles(&self, guild_id: GuildId) -> BTreeSet<RoleId> {
        let protected = self.read_protected(guild_id).await;
        self.cache.write().await.entry(guild_id).or_default().protected = protected.clone();
        protected
    }

    /// Reload both halves of the guild entry.
    pub async fn reload(&self, guild_id: GuildId) -> GuildRules {
        let connections = self.read_connections(guild_id).await;
        let protected = self.read_protected(guild_id).await;
        let rules = GuildRules { connections, protected };
        self.cache.write().await.insert(guild_id, rules.clone());
        rules
    }

    /// Cached entry, loading it on first use.
    pub async fn guild_rules(&self, guild_id: GuildId) -> GuildRules {
        if let Some(rules) = self.cache.read().await.get(&guild_id) {
            return rules.clone();
        }
        self.reload(guild_id).await
    }

    pub async fn connections(&self, guild_id: GuildId) -> Vec<Rule> {
        self.guild_rules(guild_id).await.connections
    }

    pub async fn protected_roles(&self, guild_id: GuildId) -> BTreeSet<RoleId> {
        self.guild_rules(guild_id).await.protected
    }

    pub async fn is_cached(&self, guild_id: GuildId) -> bool {
        self.cache.read().await.contains_key(&guild_id)
    }

    async fn read_connections(&self, guild_id: GuildId) -> Vec<Rule> {
        let raw = match self.store.get_setting(settings::ROLE_CONNECTIONS, guild_id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("guild {}: could not read role connections: {}", guild_id, e);
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Rule>>(&raw) {
            Ok(mut rules) => {
                for rule in &mut rules {
                    rule.guild_id = guild_id;
                }
                rules
            }
            Err(e) => {
                warn!("guild {}: malformed role connections, treating as empty: {}", guild_id, e);
                Vec::new()
            }
        }
    }

    async fn read_protected(&self, guild_id: GuildId) -> BTreeSet<RoleId> {
        let raw = match self.store.get_setting(settings::PROTECTED_ROLES, guild_id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeSet::new(),
            Err(e) => {
                warn!("guild {}: could not read protected roles: {}", guild_id, e);
                return BTreeSet::new();
            }
        };
        serde_json::from_str::<BTreeSet<RoleId>>(&raw).unwrap_or_else(|e| {
            warn!("guild {}: malformed protected roles, treating as empty: {}", guild_id, e);
            BTreeSet::new()
        })
    }

    async fn save_connections(&self, guild_id: GuildId, connections: Vec<Rule>) -> Result<(), ConnectionError> {
        let raw = serde_json::to_string(&connections)?;
        self.store.set_setting(settings::ROLE_CONNECTIONS, &raw, guild_id).await?;
        self.cache.write().await.entry(guild_id).or_default().connections = connections;
        Ok(())
    }

    async fn save_protected(&self, guild_id: GuildId, protected: BTreeSet<RoleId>) -> Result<(), ConnectionError> {
        let raw = serde_json::to_string(&protected)?;
        self.store.set_setting(settings::PROTECTED_ROLES, &raw, guild_id).await?;
        self.cache.write().await.entry(guild_id).or_default().protected = protected;
        Ok(())
    }

    // =========================================================================
    // Authoring
    // =========================================================================

    pub async fn add_connection(
        &self,
        guild_id: GuildId,
        target_role_id: RoleId,
        action: Action,
        conditions: Vec<Condition>,
        logic: Logic,
    ) -> Result<RuleId, ConnectionError> {
        let mut connections = self.load_connections(guild_id).await;
        let id = next_id(&connections).ok_or(ConnectionError::IdsExhausted(guild_id))?;
        connections.push(Rule { id, guild_id, target_role_id, action, conditions, logic, enabled: true });
        self.save_connections(guild_id, connections).await?;
        info!("guild {}: added role connection #{} ({} {})", guild_id, id, action.as_str(), target_role_id);
        Ok(id)
    }

    /// Returns whether a rule with `id` existed.
    pub async fn remove_connection(&self, guild_id: GuildId, id: RuleId) -> Result<bool, ConnectionError> {
        let mut connections = self.load_connections(guild_id).await;
        let before = connections.len();
        connections.retain(|r| r.id != id);
        if connections.len() == before {
            return Ok(false);
        }
        self.save_connections(guild_id, connections).await?;
        info!("guild {}: removed role connection #{}", guild_id, id);
        Ok(true)
    }

    /// Flip `enabled`; returns the new state, or `None` if no such rule.
    pub async fn toggle_connection(&self, guild_id: GuildId, id: RuleId) -> Result<Option<bool>, ConnectionError> {
        let mut connections = self.load_connections(guild_id).await;
        let Some(rule) = connections.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        rule.enabled = !rule.enabled;
        let enabled = rule.enabled;
        self.save_connections(guild_id, connections).await?;
        info!("guild {}: role connection #{} {}", guild_id, id, if enabled { "enabled" } else { "disabled" });
        Ok(Some(enabled))
    }

    pub async fn update_connection_logic(&self, guild_id: GuildId, id: RuleId, logic: Logic) -> Result<bool, ConnectionError> {
        let mut connections = self.load_connections(guild_id).await;
        let Some(rule) = connections.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        rule.logic = logic;
        self.save_connections(guild_id, connections).await?;
        info!("guild {}: role connection #{} logic set to {}", guild_id, id, logic.as_str());
        Ok(true)
    }

    /// Returns whether the role was newly protected.
    pub async fn add_protected_role(&self, guild_id: GuildId, role_id: RoleId) -> Result<bool, ConnectionError> {
        let mut protected = self.load_protected_roles(guild_id).await;
        if !protected.insert(role_id) {
            return Ok(false);
        }
        self.save_protected(guild_id, protected).await?;
        info!("guild {}: role {} protected", guild_id, role_id);
        Ok(true)
    }

    /// Returns whether the role was protected before.
    pub async fn remove_protected_role(&self, guild_id: GuildId, role_id: RoleId) -> Result<bool, ConnectionError> {
        let mut protected = self.load_protected_roles(guild_id).await;
        if !protected.remove(&role_id) {
            return Ok(false);
        }
        self.save_protected(guild_id, protected).await?;
        info!("guild {}: role {} unprotected", guild_id, role_id);
        Ok(true)
    }

    // =========================================================================
    // Convergence
    // =========================================================================

    /// Converge one member's roles with the guild's enabled rules.
    ///
    /// Conditions always read the incoming snapshot; the target-role check
    /// reads a working copy updated after each successful mutation, so a
    /// later rule in list order sees (and may undo) an earlier rule's change.
    pub async fn process_member<P: Platform + ?Sized>(&self, platform: &P, member: &Member) -> MemberReport {
        if member.bot {
            return MemberReport::skipped(member.user_id, SkipReason::Bot);
        }
        let rules = self.guild_rules(member.guild_id).await;
        if member.holds_any(&rules.protected) {
            debug!("guild {}: member {} is protected", member.guild_id, member.user_id);
            return MemberReport::skipped(member.user_id, SkipReason::Protected);
        }

        let mut report = MemberReport::new(member.user_id);
        let mut held = member.roles.clone();

        for rule in rules.enabled() {
            if platform.resolve_role(member.guild_id, rule.target_role_id).await.is_none() {
                debug!("guild {}: rule #{} targets missing role {}", member.guild_id, rule.id, rule.target_role_id);
                report.stale.push(rule.id);
                continue;
            }

            let has_role = held.contains(&rule.target_role_id);
            let Some(change) = rule.evaluate(&member.roles, has_role) else {
                continue;
            };

            let reason = rule.reason();
            let result = match change {
                RoleChange::Add => platform.add_role(member, rule.target_role_id, &reason).await,
                RoleChange::Remove => platform.remove_role(member, rule.target_role_id, &reason).await,
            };

            match result {
                Ok(()) => {
                    match change {
                        RoleChange::Add => held.insert(rule.target_role_id),
                        RoleChange::Remove => held.remove(&rule.target_role_id),
                    };
                    info!(
                        "guild {}: {} role {} for member {} (rule #{})",
                        member.guild_id, change.as_str(), rule.target_role_id, member.user_id, rule.id
                    );
                    report.applied.push(AppliedChange { rule_id: rule.id, role_id: rule.target_role_id, change });
                }
                Err(e) => {
                    match &e {
                        PlatformError::NotFound(what) => {
                            debug!("guild {}: rule #{} skipped, {} vanished", member.guild_id, rule.id, what)
                        }
                        _ => warn!(
                            "guild {}: rule #{} could not {} role {} for member {}: {}",
                            member.guild_id, rule.id, change.as_str(), rule.target_role_id, member.user_id, e
                        ),
                    }
                    report.failures.push(FailedChange {
                        rule_id: rule.id,
                        role_id: rule.target_role_id,
                        change,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
