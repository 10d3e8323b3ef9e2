//! Condition: atomic "has role X" / "lacks role X" predicate

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::ids::RoleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionKind {
    #[serde(rename = "has")]
    Has,
    #[serde(rename = "doesnt_have")]
    Lacks,
}

impl ConditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::Has => "has",
            ConditionKind::Lacks => "doesnt_have",
        }
    }
}

/// Single predicate over a member's role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub role_id: RoleId,
}

impl Condition {
    pub fn has(role_id: impl Into<RoleId>) -> Self { Self { kind: ConditionKind::Has, role_id: role_id.into() } }
    pub fn lacks(role_id: impl Into<RoleId>) -> Self { Self { kind: ConditionKind::Lacks, role_id: role_id.into() } }

    /// Total: every condition yields a definite answer for any role set.
    pub fn evaluate(&self, member_roles: &HashSet<RoleId>) -> bool {
        let held = member_roles.contains(&self.role_id);
        match self.kind {
            ConditionKind::Has => held,
            ConditionKind::Lacks => !held,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConditionKind::Has => write!(f, "has {}", self.role_id),
            ConditionKind::Lacks => write!(f, "lacks {}", self.role_id),
        }
    }
}
