//! Rule: conditions combined with AND/OR, mapped to a give/remove action
//!
//! # Stored shape
//!
//! ```json
//! {"id": 1, "target_role_id": 20, "action": "give",
//!  "conditions": [{"type": "has", "role_id": 10}],
//!  "logic": "AND", "enabled": true}
//! ```
//!
//! The guild id is not part of the stored shape; the store key already
//! scopes a rule list to its guild, and the loader stamps it back on.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::condition::Condition;
use super::decision::{decide, RoleChange};
use super::ids::{GuildId, RoleId};

/// Rule id, unique within a guild
pub type RuleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Give,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Give => "give",
            Action::Remove => "remove",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "give" | "add" | "grant" => Some(Action::Give),
            "remove" | "revoke" | "take" => Some(Action::Remove),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AND" | "ALL" => Some(Logic::And),
            "OR" | "ANY" => Some(Logic::Or),
            _ => None,
        }
    }
}

fn enabled_by_default() -> bool { true }

/// A role connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    #[serde(skip)]
    pub guild_id: GuildId,
    pub target_role_id: RoleId,
    pub action: Action,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub logic: Logic,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl Rule {
    pub fn new(id: RuleId, guild_id: GuildId, target_role_id: RoleId, action: Action) -> Self {
        Self { id, guild_id, target_role_id, action, conditions: Vec::new(), logic: Logic::And, enabled: true }
    }

    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self { self.conditions = conditions; self }
    pub fn with_condition(mut self, condition: Condition) -> Self { self.conditions.push(condition); self }
    pub fn with_logic(mut self, logic: Logic) -> Self { self.logic = logic; self }
    pub fn disabled(mut self) -> Self { self.enabled = false; self }

    /// Combine per-condition results. An empty condition list never matches.
    pub fn conditions_satisfied(&self, member_roles: &HashSet<RoleId>) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        let mut results = self.conditions.iter().map(|c| c.evaluate(member_roles));
        match self.logic {
            Logic::And => results.all(|r| r),
            Logic::Or => results.any(|r| r),
        }
    }

    /// Decide the change for this rule. Conditions read `member_roles`;
    /// `has_target` is whether the member currently holds the target role.
    pub fn evaluate(&self, member_roles: &HashSet<RoleId>, has_target: bool) -> Option<RoleChange> {
        decide(self.action, self.conditions_satisfied(member_roles), has_target)
    }

    /// Audit-log reason attached to mutations this rule makes
    pub fn reason(&self) -> String {
        format!("{} #{}", crate::core::keys::REASON_PREFIX, self.id)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joiner = format!(" {} ", self.logic.as_str());
        let conditions: Vec<String> = self.conditions.iter().map(|c| c.to_string()).collect();
        write!(f, "#{} {} {} when {}", self.id, self.action.as_str(), self.target_role_id, conditions.join(&joiner))?;
        if !self.enabled {
            write!(f, " (disabled)")?;
        }
        Ok(())
    }
}
