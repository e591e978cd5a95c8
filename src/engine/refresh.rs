//! Refresh lifecycle for a long-lived dashboard.
//!
//! The controller owns the current [`DashboardView`] and publishes every
//! change through a `watch` channel. Refreshes may overlap; each one takes a
//! sequence number and its result is applied only if nothing newer has been
//! applied already.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::Aggregator;
use crate::aggregation::{Clock, ReportingPeriod};
use crate::models::DashboardSnapshot;

/// Where the controller is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Everything a consumer needs to render the dashboard.
#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    pub phase: RefreshPhase,
    /// Last successful snapshot. Kept across failed refreshes.
    pub snapshot: Option<Arc<DashboardSnapshot>>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared by the next success.
    pub error: Option<String>,
    /// Sequence number of the last applied result.
    pub sequence: u64,
}

/// What happened to one refresh's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Ready,
    Failed,
    /// A newer result had already been applied; this one was dropped.
    Superseded,
}

struct Shared {
    aggregator: Aggregator,
    clock: Arc<dyn Clock>,
    view: watch::Sender<DashboardView>,
    issued: AtomicU64,
}

impl Shared {
    async fn refresh(&self) -> RefreshOutcome {
        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.view.send_modify(|view| view.phase = RefreshPhase::Loading);
        debug!("Refresh #{} started", sequence);

        let period = ReportingPeriod::containing(self.clock.now());
        let result = self.aggregator.compute(&period).await;

        let mut outcome = RefreshOutcome::Superseded;
        self.view.send_if_modified(|view| {
            if sequence <= view.sequence {
                return false;
            }
            let latest = sequence == self.issued.load(Ordering::SeqCst);

            let settled = match result {
                Ok(snapshot) => {
                    view.snapshot = Some(Arc::new(snapshot));
                    view.last_updated = Some(self.clock.now());
                    view.error = None;
                    outcome = RefreshOutcome::Ready;
                    RefreshPhase::Ready
                }
                Err(e) => {
                    view.error = Some(e.to_string());
                    outcome = RefreshOutcome::Failed;
                    RefreshPhase::Error
                }
            };
            view.sequence = sequence;
            view.phase = if latest { settled } else { RefreshPhase::Loading };
            true
        });

        match outcome {
            RefreshOutcome::Ready => info!("Refresh #{} applied", sequence),
            RefreshOutcome::Failed => error!("Refresh #{} failed", sequence),
            RefreshOutcome::Superseded => debug!("Refresh #{} superseded, discarded", sequence),
        }
        outcome
    }
}

/// Drives an [`Aggregator`] on demand and on a timer.
pub struct RefreshController {
    shared: Arc<Shared>,
    timer: Option<JoinHandle<()>>,
}

impl RefreshController {
    pub fn new(aggregator: Aggregator, clock: Arc<dyn Clock>) -> Self {
        let (view, _) = watch::channel(DashboardView::default());
        Self {
            shared: Arc::new(Shared {
                aggregator,
                clock,
                view,
                issued: AtomicU64::new(0),
            }),
            timer: None,
        }
    }

    /// Initial load.
    pub async fn mount(&self) -> RefreshOutcome {
        info!("Loading dashboard");
        self.shared.refresh().await
    }

    /// Run one refresh now. Safe to call while another is in flight.
    #[allow(dead_code)] // For embedding callers; the CLI only refreshes on the timer
    pub async fn refresh(&self) -> RefreshOutcome {
        self.shared.refresh().await
    }

    /// Refresh every `period`, replacing any running timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_auto_refresh(&mut self, period: Duration) {
        self.stop_auto_refresh();
        info!("Auto refresh every {}s", period.as_secs());

        let shared = Arc::clone(&self.shared);
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                shared.refresh().await;
            }
        }));
    }

    /// Cancel the timer, dropping any refresh it has in flight.
    pub fn stop_auto_refresh(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!("Auto refresh stopped");
        }
    }

    #[allow(dead_code)] // Utility for embedding callers
    pub fn is_auto_refreshing(&self) -> bool {
        self.timer.is_some()
    }

    /// Current view.
    pub fn view(&self) -> DashboardView {
        self.shared.view.borrow().clone()
    }

    /// Receiver that is notified on every view change.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.shared.view.subscribe()
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}
