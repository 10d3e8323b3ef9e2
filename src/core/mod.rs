//! Core rule model: ids, conditions, rules, and the decision table.
//!
//! Everything here is pure and synchronous; I/O lives in `store`,
//! `platform`, and `connections`.

pub mod condition;
pub mod decision;
pub mod ids;
pub mod keys;
pub mod rule;

pub use condition::{Condition, ConditionKind};
pub use decision::{decide, RoleChange};
pub use ids::{GuildId, RoleId, UserId};
pub use rule::{Action, Logic, Rule, RuleId};
