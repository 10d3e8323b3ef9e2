//! ReconciliationScheduler: periodic full-guild sweep
//!
//! Every tick reloads each connected guild's rules from the store (so edits
//! made by other processes are picked up) and runs `process_member` for
//! every member the platform exposes.
//!
//! # Scheduling
//!
//! | Situation | Behavior |
//! |-----------|----------|
//! | sweep overruns the interval | next tick is delayed, never skipped or overlapped |
//! | one guild fails or panics | logged and listed in `failed_guilds`; other guilds still swept |
//! | one guild stalls | other guilds finish; the sweep ends when it does |
//! | shutdown | loop exits; a sweep in progress is dropped with its guild tasks |

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::connections::ConnectionManager;
use crate::core::keys::DEFAULT_SWEEP_SECS;
use crate::core::GuildId;
use crate::platform::Platform;
use crate::runtime::ShutdownSignal;

/// Totals for one guild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuildSweep {
    pub guild_id: GuildId,
    pub members: usize,
    pub mutations: usize,
    pub failures: usize,
}

/// Totals for one sweep across all guilds
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub guilds: Vec<GuildSweep>,
    pub failed_guilds: Vec<GuildId>,
}

impl SweepReport {
    pub fn members(&self) -> usize { self.guilds.iter().map(|g| g.members).sum() }
    pub fn mutations(&self) -> usize { self.guilds.iter().map(|g| g.mutations).sum() }
    pub fn failures(&self) -> usize { self.guilds.iter().map(|g| g.failures).sum() }
}

pub struct ReconciliationScheduler {
    manager: Arc<ConnectionManager>,
    platform: Arc<dyn Platform>,
    interval: Duration,
    sweep_on_start: bool,
}

impl ReconciliationScheduler {
    pub fn new(manager: Arc<ConnectionManager>, platform: Arc<dyn Platform>) -> Self {
        Self { manager, platform, interval: Duration::from_secs(DEFAULT_SWEEP_SECS), sweep_on_start: true }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self { self.interval = interval; self }
    pub fn with_sweep_on_start(mut self, on: bool) -> Self { self.sweep_on_start = on; self }

    pub fn interval(&self) -> Duration { self.interval }

    /// One full sweep. Guilds run concurrently; the call returns when all finish.
    pub async fn sweep(&self) -> SweepReport {
        let started_at = Utc::now();
        let mut tasks = JoinSet::new();
        // Guilds whose task has not reported back; a panicked task never does.
        let mut pending = BTreeSet::new();

        for guild_id in self.platform.guilds().await {
            if !pending.insert(guild_id) {
                continue;
            }
            let manager = self.manager.clone();
            let platform = self.platform.clone();
            tasks.spawn(async move { (guild_id, sweep_guild(&manager, platform.as_ref(), guild_id).await) });
        }

        let mut guilds = Vec::new();
        let mut failed_guilds = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((guild_id, result)) => {
                    pending.remove(&guild_id);
                    match result {
                        Ok(totals) => guilds.push(totals),
                        Err(e) => {
                            warn!("sweep of guild {} failed: {:#}", guild_id, e);
                            failed_guilds.push(guild_id);
                        }
                    }
                }
                Err(e) => warn!("guild sweep task died: {}", e),
            }
        }
        for guild_id in pending {
            warn!("sweep of guild {} did not complete", guild_id);
            failed_guilds.push(guild_id);
        }
        guilds.sort_by_key(|g| g.guild_id);
        failed_guilds.sort();

        SweepReport { started_at, finished_at: Utc::now(), guilds, failed_guilds }
    }

    /// Run sweeps on the interval until shutdown.
    pub fn spawn(self, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            // interval_at panics on a zero period
            let period = if self.interval.is_zero() { Duration::from_secs(DEFAULT_SWEEP_SECS) } else { self.interval };
            let start = if self.sweep_on_start {
                tokio::time::Instant::now()
            } else {
                tokio::time::Instant::now() + period
            };
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Reconciliation sweep every {}ms", period.as_millis());

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = shutdown.recv() => break,
                            report = self.sweep() => {
                                let took = report.finished_at - report.started_at;
                                info!(
                                    "Sweep: {} guilds ({} failed), {} members, {} mutations, {} failures in {}ms",
                                    report.guilds.len(),
                                    report.failed_guilds.len(),
                                    report.members(),
                                    report.mutations(),
                                    report.failures(),
                                    took.num_milliseconds()
                                );
                            }
                        }
                    }
                }
            }
            debug!("reconciliation scheduler stopped");
        })
    }
}

async fn sweep_guild(manager: &ConnectionManager, platform: &dyn Platform, guild_id: GuildId) -> Result<GuildSweep> {
    let rules = manager.reload(guild_id).await;
    let mut totals = GuildSweep { guild_id, ..Default::default() };
    if rules.enabled().next().is_none() {
        return Ok(totals);
    }

    let members = platform.members(guild_id).await?;
    for member in &members {
        let report = manager.process_member(platform, member).await;
        totals.members += 1;
        totals.mutations += report.applied.len();
        totals.failures += report.failures.len();
    }
    Ok(totals)
}
