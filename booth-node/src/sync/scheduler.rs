//! Sync scheduler
//!
//! Funnels the periodic tick, connectivity-regained events and manual
//! requests into [`SyncEngine::run_cycle`]. Cycles run on their own task so
//! the loop keeps draining triggers; triggers that land while a cycle is in
//! flight are dropped. The tick period follows `sync_interval_secs` from the
//! operator settings and is re-armed as soon as they change.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::engine::SyncEngine;
use super::report::SyncTrigger;

/// Pending triggers kept while the loop is busy
const TRIGGER_QUEUE: usize = 8;

/// Cloneable front end used by the UI and the connectivity monitor
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SyncTrigger>,
    online: Arc<AtomicBool>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SchedulerHandle {
    /// Queue a cycle; returns false when the queue is full or the scheduler
    /// has stopped
    pub fn trigger(&self, trigger: SyncTrigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(%trigger, "Sync trigger not queued: {e}");
                false
            }
        }
    }

    /// "Force sync" from the operator
    pub fn force_sync(&self) -> bool {
        self.trigger(SyncTrigger::Manual)
    }

    /// Report the current connectivity; an offline → online transition
    /// triggers a cycle
    pub fn connectivity_changed(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::AcqRel);
        if online && !was_online {
            tracing::info!("Connectivity regained, scheduling sync");
            return self.trigger(SyncTrigger::ConnectivityRegained);
        }
        if !online && was_online {
            tracing::info!("Connectivity lost");
        }
        false
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Stop the loop and wait for an in-flight cycle to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::error!(error = ?e, "Sync scheduler task failed");
        }
    }
}

pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    rx: mpsc::Receiver<SyncTrigger>,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>, shutdown: CancellationToken) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(TRIGGER_QUEUE);
        let handle = SchedulerHandle {
            tx,
            online: Arc::new(AtomicBool::new(true)),
            shutdown: shutdown.clone(),
            task: Arc::new(Mutex::new(None)),
        };
        let scheduler = Self {
            engine,
            rx,
            shutdown,
        };
        (scheduler, handle)
    }

    /// Start the loop on the runtime; `shutdown()` on the handle stops it
    pub fn spawn(engine: Arc<SyncEngine>, shutdown: CancellationToken) -> SchedulerHandle {
        let (scheduler, handle) = Self::new(engine, shutdown);
        let task = tokio::spawn(scheduler.run());
        // Fresh mutex, never contended here
        if let Ok(mut slot) = handle.task.try_lock() {
            *slot = Some(task);
        }
        handle
    }

    /// 1. One cycle at startup
    /// 2. A cycle per interval tick
    /// 3. A cycle per queued trigger
    /// 4. Settings changes re-arm the ticker
    pub async fn run(mut self) {
        let settings = self.engine.settings().clone();
        let mut period = settings.sync_interval();
        tracing::info!(interval_secs = period.as_secs(), "Sync scheduler started");

        let mut in_flight: Option<JoinHandle<()>> = None;
        self.dispatch(SyncTrigger::Startup, &mut in_flight);

        let mut ticker = new_ticker(period);

        loop {
            let trigger = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Sync scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => Some(SyncTrigger::Timer),
                Some(trigger) = self.rx.recv() => Some(trigger),
                _ = settings.changed() => None,
            };
            if let Some(trigger) = trigger {
                self.dispatch(trigger, &mut in_flight);
            }

            let current = settings.sync_interval();
            if current != period {
                tracing::info!(
                    from_secs = period.as_secs(),
                    to_secs = current.as_secs(),
                    "Sync interval changed"
                );
                period = current;
                ticker = new_ticker(period);
            }
        }

        // No mid-flight cancellation: let a running cycle write its report
        if let Some(cycle) = in_flight
            && let Err(e) = cycle.await
        {
            tracing::error!(error = ?e, "Sync cycle task failed");
        }
    }

    fn dispatch(&self, trigger: SyncTrigger, in_flight: &mut Option<JoinHandle<()>>) {
        if in_flight.as_ref().is_some_and(|cycle| !cycle.is_finished()) {
            tracing::debug!(%trigger, "Sync in progress, trigger dropped");
            return;
        }
        let engine = self.engine.clone();
        *in_flight = Some(tokio::spawn(async move {
            engine.run_cycle(trigger).await;
        }));
    }
}

/// First tick one full period from now
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
