//! Periodic reclamation of expired files.

use crate::tracker::TaskTracker;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

/// How often to sweep and how old a file must be to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimSchedule {
    pub interval: Duration,
    pub max_age: Duration,
}

impl Default for ReclaimSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Run [`TaskTracker::reclaim_expired`] every `schedule.interval` until
/// `shutdown` turns `true` or its sender is dropped.
///
/// The first sweep happens one full interval after start.
pub fn spawn_reclaimer(
    tracker: TaskTracker,
    schedule: ReclaimSchedule,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(schedule.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick.
        let mut ticks = IntervalStream::new(interval).skip(1);

        info!(
            "Reclaimer started: every {:?}, max age {:?}",
            schedule.interval, schedule.max_age
        );
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                tick = ticks.next() => {
                    if tick.is_none() {
                        break;
                    }
                    let removed = tracker.reclaim_expired(schedule.max_age).await;
                    if removed > 0 {
                        info!("Reclaimed {} expired file(s)", removed);
                    } else {
                        debug!("Reclaim sweep found nothing to remove");
                    }
                }
            }
        }
        info!("Reclaimer stopped");
    })
}
