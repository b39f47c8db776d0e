//! Recurring trigger for the sync cycle.
//!
//! Cycles run inline in the timer loop, so at most one is in flight. Ticks
//! missed while a cycle overruns are skipped, not queued.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::bus::DeviceBus;
use crate::sync::SyncContext;
use crate::weather::WeatherProvider;

/// How many times the timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Forever,
    Times(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub period: Duration,
    pub repeat: Repeat,
}

impl Schedule {
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            repeat: Repeat::Forever,
        }
    }

    pub fn times(mut self, n: u64) -> Self {
        self.repeat = Repeat::Times(n);
        self
    }
}

/// Counters kept by the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
}

/// Run cycles on `schedule` until shutdown or the repeat count is reached.
///
/// The first cycle runs immediately. A failed cycle is logged and the loop
/// carries on with the next tick.
pub async fn run_scheduler<P, B>(
    ctx: &mut SyncContext<P, B>,
    schedule: Schedule,
    mut shutdown: watch::Receiver<()>,
) -> SchedulerStats
where
    P: WeatherProvider,
    B: DeviceBus,
{
    log::info!(
        "Polling '{}' every {}s",
        ctx.place(),
        schedule.period.as_secs()
    );

    let mut interval = tokio::time::interval(schedule.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats = SchedulerStats::default();

    loop {
        if let Repeat::Times(n) = schedule.repeat {
            if stats.cycles >= n {
                log::debug!("Schedule exhausted after {} cycles", n);
                break;
            }
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                log::info!("Scheduler received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                stats.cycles += 1;
                match ctx.run_cycle().await {
                    Ok(report) if report.failed.is_empty() => {
                        log::debug!("Cycle {} published {} devices", stats.cycles, report.notified.len());
                    }
                    Ok(report) => {
                        log::warn!(
                            "Cycle {} published {} devices, {} failed: {:?}",
                            stats.cycles,
                            report.notified.len(),
                            report.failed.len(),
                            report.failed
                        );
                    }
                    Err(e) => {
                        stats.failed_cycles += 1;
                        log::warn!("Weather fetch for '{}' failed, skipping cycle: {}", ctx.place(), e);
                    }
                }
            }
        }
    }

    stats
}
