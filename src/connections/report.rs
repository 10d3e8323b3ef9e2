//! Outcome of one `process_member` pass

use serde::Serialize;

use crate::core::{RoleChange, RoleId, RuleId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    Bot,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedChange {
    pub rule_id: RuleId,
    pub role_id: RoleId,
    pub change: RoleChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedChange {
    pub rule_id: RuleId,
    pub role_id: RoleId,
    pub change: RoleChange,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberReport {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    pub applied: Vec<AppliedChange>,
    pub failures: Vec<FailedChange>,
    /// Enabled rules whose target role no longer exists
    pub stale: Vec<RuleId>,
}

impl MemberReport {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, skipped: None, applied: Vec::new(), failures: Vec::new(), stale: Vec::new() }
    }

    pub fn skipped(user_id: UserId, reason: SkipReason) -> Self {
        Self { skipped: Some(reason), ..Self::new(user_id) }
    }

    /// Mutation calls attempted, successful or not
    pub fn attempted(&self) -> usize { self.applied.len() + self.failures.len() }

    pub fn is_noop(&self) -> bool { self.attempted() == 0 }
}
