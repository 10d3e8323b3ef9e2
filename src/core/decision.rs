//! Decision table: the only place a role mutation is decided
//!
//! | action | satisfied | has_role | change |
//! |--------|-----------|----------|--------|
//! | give   | true      | false    | add    |
//! | give   | false     | true     | remove |
//! | remove | true      | true     | remove |
//! | *      | *         | *        | none   |
//!
//! Every row that mutates moves the member toward a state where the same
//! row no longer fires, so re-evaluating after the change is a no-op.

use serde::{Deserialize, Serialize};

use super::rule::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleChange {
    Add,
    Remove,
}

impl RoleChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleChange::Add => "add",
            RoleChange::Remove => "remove",
        }
    }
}

pub fn decide(action: Action, satisfied: bool, has_role: bool) -> Option<RoleChange> {
    match (action, satisfied, has_role) {
        (Action::Give, true, false) => Some(RoleChange::Add),
        // Give rules auto-revoke once the member stops qualifying.
        (Action::Give, false, true) => Some(RoleChange::Remove),
        (Action::Remove, true, true) => Some(RoleChange::Remove),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_three_rows_mutate() {
        let mut mutating = Vec::new();
        for action in [Action::Give, Action::Remove] {
            for satisfied in [true, false] {
                for has_role in [true, false] {
                    if let Some(change) = decide(action, satisfied, has_role) {
                        mutating.push((action, satisfied, has_role, change));
                    }
                }
            }
        }
        assert_eq!(
            mutating,
            vec![
                (Action::Give, true, false, RoleChange::Add),
                (Action::Give, false, true, RoleChange::Remove),
                (Action::Remove, true, true, RoleChange::Remove),
            ]
        );
    }

    #[test]
    fn applying_the_change_settles_the_row() {
        for action in [Action::Give, Action::Remove] {
            for satisfied in [true, false] {
                for has_role in [true, false] {
                    let after = match decide(action, satisfied, has_role) {
                        Some(RoleChange::Add) => true,
                        Some(RoleChange::Remove) => false,
                        None => has_role,
                    };
                    assert_eq!(decide(action, satisfied, after), None);
                }
            }
        }
    }

    #[test]
    fn remove_never_adds() {
        for satisfied in [true, false] {
            for has_role in [true, false] {
                assert_ne!(decide(Action::Remove, satisfied, has_role), Some(RoleChange::Add));
            }
        }
    }
}
