//! Engine: wires the sweep and the bridge around one ConnectionManager
//!
//! ```ignore
//! use roleconnect::{ConnectionManager, Engine, EngineConfig, MemoryStore, ProcessingMembers};
//! use std::sync::Arc;
//!
//! let manager = Arc::new(ConnectionManager::new(Arc::new(MemoryStore::new())));
//! let processing = ProcessingMembers::new(); // shared with verification, XP, ...
//!
//! let handle = Engine::new(manager, platform)
//!     .with_config(EngineConfig::from_env())
//!     .with_lock(Arc::new(processing.clone()))
//!     .start(gateway_member_updates, &shutdown);
//!
//! // later
//! shutdown.trigger();
//! handle.join().await;
//! ```

mod config;

pub use config::EngineConfig;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::{EventBridge, MemberLock, Unlocked};
use crate::connections::ConnectionManager;
use crate::platform::{MemberUpdate, Platform};
use crate::runtime::Shutdown;
use crate::sweep::ReconciliationScheduler;

pub struct Engine {
    manager: Arc<ConnectionManager>,
    platform: Arc<dyn Platform>,
    lock: Arc<dyn MemberLock>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(manager: Arc<ConnectionManager>, platform: Arc<dyn Platform>) -> Self {
        Self { manager, platform, lock: Arc::new(Unlocked), config: EngineConfig::default() }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self { self.config = config; self }
    pub fn with_lock(mut self, lock: Arc<dyn MemberLock>) -> Self { self.lock = lock; self }

    pub fn manager(&self) -> &Arc<ConnectionManager> { &self.manager }
    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn scheduler(&self) -> ReconciliationScheduler {
        ReconciliationScheduler::new(self.manager.clone(), self.platform.clone())
            .with_interval(self.config.sweep_interval)
            .with_sweep_on_start(self.config.sweep_on_start)
    }

    pub fn bridge(&self) -> EventBridge {
        EventBridge::new(self.manager.clone(), self.platform.clone()).with_lock(self.lock.clone())
    }

    /// Spawn the sweep loop and the event loop.
    pub fn start(self, events: mpsc::UnboundedReceiver<MemberUpdate>, shutdown: &Shutdown) -> EngineHandle {
        let sweep = self.scheduler().spawn(shutdown.subscribe());
        let bridge = self.bridge().spawn(events, shutdown.subscribe());
        tracing::info!("Role connection engine started");
        EngineHandle { sweep, bridge }
    }
}

/// Both engine tasks, cancelled or awaited together.
pub struct EngineHandle {
    sweep: JoinHandle<()>,
    bridge: JoinHandle<()>,
}

impl EngineHandle {
    pub fn abort(&self) {
        self.sweep.abort();
        self.bridge.abort();
    }

    pub fn is_finished(&self) -> bool { self.sweep.is_finished() && self.bridge.is_finished() }

    pub async fn join(self) {
        for (name, task) in [("sweep", self.sweep), ("bridge", self.bridge)] {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!("{} task ended abnormally: {}", name, e);
                }
            }
        }
    }
}
