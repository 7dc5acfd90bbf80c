//! Periodic session cleanup
//!
//! The gate already drops expired sessions it happens to see. The reaper
//! catches the rest: sessions past `expires_at` that nobody presents again,
//! and sessions idle for longer than the inactivity window.

use crate::repositories::SessionStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Rows removed by one sweep; `None` marks a failed step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub expired: Option<u64>,
    pub stale: Option<u64>,
}

impl ReapReport {
    pub fn total(&self) -> u64 {
        self.expired.unwrap_or(0) + self.stale.unwrap_or(0)
    }
}

/// Deletes expired and idle sessions on a fixed interval
pub struct SessionReaper {
    store: Arc<dyn SessionStore>,
    inactivity_window: Duration,
    interval: std::time::Duration,
}

impl SessionReaper {
    pub fn new(
        store: Arc<dyn SessionStore>,
        inactivity_window: Duration,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            store,
            inactivity_window,
            interval,
        }
    }

    /// One sweep; a failing step does not stop the other
    pub async fn run_once(&self, now: DateTime<Utc>) -> ReapReport {
        let expired = match self.store.delete_expired(now).await {
            Ok(count) => {
                metrics::counter!("kummerkasten_sessions_reaped_total", "kind" => "expired")
                    .increment(count);
                Some(count)
            }
            Err(e) => {
                warn!(error = %e, "Failed to delete expired sessions");
                None
            }
        };

        let stale = match self.store.delete_stale(now, self.inactivity_window).await {
            Ok(count) => {
                metrics::counter!("kummerkasten_sessions_reaped_total", "kind" => "stale")
                    .increment(count);
                Some(count)
            }
            Err(e) => {
                warn!(error = %e, "Failed to delete stale sessions");
                None
            }
        };

        let report = ReapReport { expired, stale };
        if report.total() > 0 {
            info!(?report, "Reaped sessions");
        } else {
            debug!(?report, "Session sweep finished");
        }
        report
    }

    /// Run sweeps until `shutdown` turns true or its sender is dropped
    ///
    /// The first sweep happens one interval after start.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_secs = self.interval.as_secs(), "Session reaper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once(Utc::now()).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Session reaper stopped");
        })
    }
}
