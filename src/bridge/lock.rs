//! Advisory "member is being processed" capability
//!
//! Other role-mutating subsystems (verification, XP rewards, ...) mark a
//! member while they work on it. The bridge only ever asks.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::core::UserId;

pub trait MemberLock: Send + Sync {
    fn is_locked(&self, user_id: UserId) -> bool;
}

/// No subsystem ever locks; every event is processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlocked;

impl MemberLock for Unlocked {
    fn is_locked(&self, _user_id: UserId) -> bool { false }
}

/// Shared set owned by the subsystems that populate it.
#[derive(Debug, Clone, Default)]
pub struct ProcessingMembers {
    inner: Arc<RwLock<HashSet<UserId>>>,
}

impl ProcessingMembers {
    pub fn new() -> Self { Self::default() }

    /// Returns false if the member was already marked.
    pub fn insert(&self, user_id: UserId) -> bool {
        self.inner.write().unwrap_or_else(|p| p.into_inner()).insert(user_id)
    }

    pub fn remove(&self, user_id: UserId) -> bool {
        self.inner.write().unwrap_or_else(|p| p.into_inner()).remove(&user_id)
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).contains(&user_id)
    }

    /// Mark for the lifetime of the returned guard.
    pub fn mark(&self, user_id: UserId) -> ProcessingGuard {
        self.insert(user_id);
        ProcessingGuard { set: self.clone(), user_id }
    }
}

impl MemberLock for ProcessingMembers {
    fn is_locked(&self, user_id: UserId) -> bool { self.contains(user_id) }
}

pub struct ProcessingGuard {
    set: ProcessingMembers,
    user_id: UserId,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) { self.set.remove(self.user_id); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let set = ProcessingMembers::new();
        {
            let _guard = set.mark(UserId(5));
            assert!(set.is_locked(UserId(5)));
            assert!(!set.is_locked(UserId(6)));
        }
        assert!(!set.is_locked(UserId(5)));
    }

    #[test]
    fn clones_share_state() {
        let owner = ProcessingMembers::new();
        let reader: Arc<dyn MemberLock> = Arc::new(owner.clone());
        assert!(owner.insert(UserId(1)));
        assert!(!owner.insert(UserId(1)));
        assert!(reader.is_locked(UserId(1)));
        assert!(owner.remove(UserId(1)));
        assert!(!reader.is_locked(UserId(1)));
        assert!(!Unlocked.is_locked(UserId(1)));
    }
}
