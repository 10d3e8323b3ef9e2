//! EventBridge: member role-change events → process_member
//!
//! # Event flow
//!
//! ```text
//! gateway member update ──► EventBridge
//!                               │
//!                               ├── roles unchanged      → ignore
//!                               ├── member locked        → skip (next sweep converges)
//!                               └── otherwise            → process_member(after) on a tracked task
//!                                                              │
//!                                    add/remove role ◄─────────┘
//!                                          │
//!                                          └──► echoes back as a new member update
//! ```
//!
//! The engine never marks members itself, so its own mutations come back
//! through the bridge. The second pass finds nothing to do because every
//! decision-table row settles after it fires.

mod lock;

pub use lock::{MemberLock, ProcessingGuard, ProcessingMembers, Unlocked};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::connections::{ConnectionManager, MemberReport};
use crate::platform::{MemberUpdate, Platform};
use crate::runtime::ShutdownSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Unchanged,
    Locked,
    Dispatch,
}

#[derive(Clone)]
pub struct EventBridge {
    manager: Arc<ConnectionManager>,
    platform: Arc<dyn Platform>,
    lock: Arc<dyn MemberLock>,
}

impl EventBridge {
    pub fn new(manager: Arc<ConnectionManager>, platform: Arc<dyn Platform>) -> Self {
        Self { manager, platform, lock: Arc::new(Unlocked) }
    }

    pub fn with_lock(mut self, lock: Arc<dyn MemberLock>) -> Self { self.lock = lock; self }

    pub fn classify(&self, update: &MemberUpdate) -> Disposition {
        if !update.roles_changed() {
            Disposition::Unchanged
        } else if self.lock.is_locked(update.after.user_id) {
            Disposition::Locked
        } else {
            Disposition::Dispatch
        }
    }

    /// Process one event inline. `None` when the event was not dispatched.
    pub async fn handle(&self, update: &MemberUpdate) -> Option<MemberReport> {
        match self.classify(update) {
            Disposition::Dispatch => Some(self.manager.process_member(self.platform.as_ref(), &update.after).await),
            Disposition::Locked => {
                debug!("guild {}: member {} locked by another subsystem, deferring", update.after.guild_id, update.after.user_id);
                None
            }
            Disposition::Unchanged => None,
        }
    }

    /// Consume events until the channel closes or shutdown fires. Each
    /// dispatched event runs on its own task in a set owned by the loop:
    /// shutdown cancels whatever is still running, a closed channel lets
    /// it finish.
    pub fn spawn(self, mut events: mpsc::UnboundedReceiver<MemberUpdate>, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut in_flight = JoinSet::new();
            let mut cancelled = false;
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        cancelled = true;
                        break;
                    }
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => reap(joined),
                    next = events.recv() => {
                        let Some(update) = next else { break };
                        match self.classify(&update) {
                            Disposition::Dispatch => {
                                let bridge = self.clone();
                                in_flight.spawn(async move {
                                    let member = &update.after;
                                    let report = bridge.manager.process_member(bridge.platform.as_ref(), member).await;
                                    if !report.failures.is_empty() {
                                        warn!(
                                            "guild {}: {} role change(s) failed for member {}",
                                            member.guild_id,
                                            report.failures.len(),
                                            member.user_id
                                        );
                                    }
                                });
                            }
                            Disposition::Locked => debug!("member {} locked, event skipped", update.after.user_id),
                            Disposition::Unchanged => {}
                        }
                    }
                }
            }

            if !cancelled {
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        joined = in_flight.join_next() => match joined {
                            Some(joined) => reap(joined),
                            None => break,
                        },
                    }
                }
            }
            // Members cut off mid-pass converge on the next sweep.
            in_flight.shutdown().await;
            debug!("event bridge stopped");
        })
    }
}

fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            warn!("member update task panicked: {}", e);
        }
    }
}
