//! Refresh scheduler.
//!
//! Owns the recurring timer and drives one refresh cycle per tick:
//!
//! ```text
//! Idle --tick--> Fetching --ok--> Applying --publish--> Idle
//!                    |
//!                    +--error--> Failing --publish--> Idle
//! ```
//!
//! - At most one fetch is in flight; ticks that arrive while a cycle is
//!   running are dropped, so publications follow tick order.
//! - Failed cycles publish the last good metrics with an `Error` status.
//! - `Ready` degrades to `Stale` once the last accepted snapshot is older
//!   than twice the polling interval.
//! - After [`RefreshScheduler::stop`] returns nothing else is published.

mod clock;
mod subscribers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use subscribers::{StateSubscriber, SubscriptionId};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{self, RefreshConfig};
use crate::errors::{ConfigError, RefreshError};
use crate::metrics::{MetricsEngine, RollingWindow};
use crate::models::{DashboardState, DashboardStatus};
use crate::provider::{PriceSource, SnapshotFetcher};
use subscribers::SubscriberSet;

/// Where the scheduler is in its refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Waiting for the next tick.
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// A fetched snapshot is being turned into metrics.
    Applying,
    /// The cycle failed and the error state is being published.
    Failing,
}

impl std::fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Fetching => write!(f, "Fetching"),
            Self::Applying => write!(f, "Applying"),
            Self::Failing => write!(f, "Failing"),
        }
    }
}

/// Phase of the cycle started under `epoch`. A cycle from an older epoch
/// neither blocks new ticks nor overwrites the phase of a newer one.
#[derive(Clone, Copy, Debug)]
struct CycleSlot {
    phase: SchedulerPhase,
    epoch: u64,
}

/// History and last published state; only touched by one cycle at a time.
struct Pipeline {
    history: RollingWindow,
    state: Arc<DashboardState>,
}

struct Ticker {
    handle: JoinHandle<()>,
}

struct Inner {
    fetcher: SnapshotFetcher,
    engine: MetricsEngine,
    clock: Arc<dyn Clock>,
    subscribers: SubscriberSet,
    cycle: Mutex<CycleSlot>,
    /// Held while a cycle applies and publishes its result.
    pipeline: tokio::sync::Mutex<Pipeline>,
    /// Bumped by `stop`; cycles started under an older epoch are discarded.
    epoch: AtomicU64,
    interval: Mutex<Duration>,
    ticker: Mutex<Option<Ticker>>,
    latest: watch::Sender<Arc<DashboardState>>,
    ticks: AtomicU64,
    dropped_ticks: AtomicU64,
}

/// Periodically fetches prices, updates metrics, and publishes the result.
///
/// Cloning is cheap and every clone drives the same scheduler. All methods
/// that start work must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    /// Create a scheduler using the system clock.
    pub fn new(source: Arc<dyn PriceSource>, config: RefreshConfig) -> Result<Self, ConfigError> {
        Self::with_clock(source, config, Arc::new(SystemClock))
    }

    /// Create a scheduler with an explicit clock for staleness checks.
    pub fn with_clock(
        source: Arc<dyn PriceSource>,
        config: RefreshConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let engine = MetricsEngine::new(&config);
        let initial = Arc::new(DashboardState::loading());
        let (latest, _) = watch::channel(Arc::clone(&initial));

        Ok(Self {
            inner: Arc::new(Inner {
                fetcher: SnapshotFetcher::new(source, &config),
                pipeline: tokio::sync::Mutex::new(Pipeline {
                    history: engine.new_history(),
                    state: initial,
                }),
                engine,
                clock,
                subscribers: SubscriberSet::default(),
                cycle: Mutex::new(CycleSlot {
                    phase: SchedulerPhase::Idle,
                    epoch: 0,
                }),
                epoch: AtomicU64::new(0),
                interval: Mutex::new(config.poll_interval),
                ticker: Mutex::new(None),
                latest,
                ticks: AtomicU64::new(0),
                dropped_ticks: AtomicU64::new(0),
            }),
        })
    }

    /// Start ticking every `interval`, with the first cycle immediately.
    ///
    /// Returns `false` (and does nothing) if already running or if
    /// `interval` is zero.
    pub fn start(&self, interval: Duration) -> bool {
        if interval.is_zero() {
            warn!("Refresh scheduler start ignored: interval must be non-zero");
            return false;
        }

        let mut ticker = self.inner.lock_ticker();
        if ticker.is_some() {
            debug!("Refresh scheduler already running, start ignored");
            return false;
        }

        *self.inner.lock_interval() = interval;
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                Inner::on_tick(&inner, epoch);
            }
        });

        info!(
            "Refresh scheduler started ({}ms interval, source {})",
            interval.as_millis(),
            self.inner.fetcher.source_id()
        );
        *ticker = Some(Ticker { handle });
        true
    }

    /// Stop ticking.
    ///
    /// A fetch already in flight, whether from a tick or from
    /// [`refresh_now`](Self::refresh_now), is allowed to finish but its
    /// result is discarded. Once this returns, no further state is published.
    pub async fn stop(&self) {
        let ticker = self.inner.lock_ticker().take();
        let was_running = ticker.is_some();
        if let Some(ticker) = ticker {
            ticker.handle.abort();
        }

        // Wait out a cycle that is mid-publication, then invalidate the rest.
        let _pipeline = self.inner.pipeline.lock().await;
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if was_running {
            info!("Refresh scheduler stopped");
        } else {
            debug!("Refresh scheduler stop: no ticker, pending cycles invalidated");
        }
    }

    /// Run one cycle now, outside the timer.
    ///
    /// Subject to the same overlap rule as ticks: returns `false` when a
    /// cycle is already in flight.
    pub fn refresh_now(&self) -> bool {
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        Inner::on_tick(&self.inner, epoch)
    }

    pub fn subscribe(&self, subscriber: Arc<dyn StateSubscriber>) -> SubscriptionId {
        self.inner.subscribers.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Receiver that always holds the latest published state.
    pub fn watch(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.inner.latest.subscribe()
    }

    /// The latest published state (`Loading` before the first cycle).
    pub fn current_state(&self) -> Arc<DashboardState> {
        Arc::clone(&self.inner.latest.borrow())
    }

    /// Phase of the current cycle. A cycle orphaned by `stop` reads as `Idle`.
    pub fn phase(&self) -> SchedulerPhase {
        let slot = *self.inner.lock_cycle();
        if slot.epoch == self.inner.epoch.load(Ordering::SeqCst) {
            slot.phase
        } else {
            SchedulerPhase::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_ticker().is_some()
    }

    /// Ticks seen so far, including dropped ones.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    /// Ticks dropped because the previous cycle was still in flight.
    pub fn dropped_ticks(&self) -> u64 {
        self.inner.dropped_ticks.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn lock_cycle(&self) -> MutexGuard<'_, CycleSlot> {
        self.cycle.lock().unwrap_or_else(|poisoned| {
            warn!("Scheduler phase mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_ticker(&self) -> MutexGuard<'_, Option<Ticker>> {
        self.ticker.lock().unwrap_or_else(|poisoned| {
            warn!("Scheduler ticker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_interval(&self) -> MutexGuard<'_, Duration> {
        self.interval.lock().unwrap_or_else(|poisoned| {
            warn!("Scheduler interval mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Move the cycle of `epoch` to `phase`; no-op once a newer cycle owns the slot.
    fn set_phase(&self, epoch: u64, phase: SchedulerPhase) {
        let mut slot = self.lock_cycle();
        if slot.epoch == epoch {
            slot.phase = phase;
        }
    }

    /// Begin a cycle unless one of the same epoch is in flight. Returns
    /// whether a cycle started.
    fn on_tick(self: &Arc<Self>, epoch: u64) -> bool {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut slot = self.lock_cycle();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!("Tick {} ignored: scheduler stopped", tick);
                return false;
            }
            if slot.phase != SchedulerPhase::Idle && slot.epoch == epoch {
                self.dropped_ticks.fetch_add(1, Ordering::SeqCst);
                debug!("Tick {} dropped: previous cycle still {}", tick, slot.phase);
                drop(slot);

                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.check_staleness(epoch).await });
                return false;
            }
            *slot = CycleSlot {
                phase: SchedulerPhase::Fetching,
                epoch,
            };
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.run_cycle(tick, epoch).await });
        true
    }

    async fn run_cycle(&self, tick: u64, epoch: u64) {
        let fetched = self.fetcher.fetch().await;

        let mut pipeline = self.pipeline.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Tick {} result discarded: scheduler stopped", tick);
            self.set_phase(epoch, SchedulerPhase::Idle);
            return;
        }

        let next = match fetched {
            Ok(snapshot) => {
                self.set_phase(epoch, SchedulerPhase::Applying);
                let Pipeline { history, state } = &mut *pipeline;
                let next = self.engine.update(history, state, snapshot);
                if next.status.is_error() {
                    self.set_phase(epoch, SchedulerPhase::Failing);
                }
                next
            }
            Err(e) => {
                self.set_phase(epoch, SchedulerPhase::Failing);
                let error = RefreshError::from(e);
                warn!("Tick {} fetch failed: {}", tick, error);
                pipeline
                    .state
                    .with_status(DashboardStatus::Error(error.to_string()))
            }
        };

        let next = Arc::new(self.degrade_if_stale(next));
        debug!("Tick {} publishing status {}", tick, next.status);
        pipeline.state = Arc::clone(&next);
        self.publish(&next);
        drop(pipeline);

        self.set_phase(epoch, SchedulerPhase::Idle);
    }

    /// Re-evaluate staleness between cycles and publish if it just changed.
    async fn check_staleness(&self, epoch: u64) {
        let mut pipeline = self.pipeline.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        if pipeline.state.status != DashboardStatus::Ready {
            return;
        }

        let next = self.degrade_if_stale(pipeline.state.as_ref().clone());
        if next.status == DashboardStatus::Stale {
            info!(
                "Dashboard is stale: no accepted snapshot since {:?}",
                next.last_successful_update
            );
            let next = Arc::new(next);
            pipeline.state = Arc::clone(&next);
            self.publish(&next);
        }
    }

    /// `Ready` becomes `Stale` when the last accepted snapshot is older than
    /// twice the polling interval. `Error` is left as is.
    fn degrade_if_stale(&self, state: DashboardState) -> DashboardState {
        if state.status != DashboardStatus::Ready {
            return state;
        }
        let interval = *self.lock_interval();
        let stale_after = chrono::TimeDelta::from_std(config::stale_after(interval))
            .unwrap_or(chrono::TimeDelta::MAX);
        if state.is_stale_at(self.clock.now(), stale_after) {
            DashboardState {
                status: DashboardStatus::Stale,
                ..state
            }
        } else {
            state
        }
    }

    /// Subscribers first, so a `watch` receiver that wakes up observes
    /// subscribers already up to date.
    fn publish(&self, state: &Arc<DashboardState>) {
        self.subscribers.publish(state);
        self.latest.send_replace(Arc::clone(state));
    }
}
