//! Scripted price source.
//!
//! Replays a queue of prepared outcomes, optionally after a delay. Useful
//! for demos, offline runs, and exercising the scheduler without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use crate::errors::FetchError;
use crate::models::PriceSnapshot;
use crate::provider::PriceSource;

/// Provider ID constant
const PROVIDER_ID: &str = "STATIC";

struct ScriptedResponse {
    outcome: Result<PriceSnapshot, FetchError>,
    delay: Duration,
}

/// Price source that returns queued outcomes in order.
///
/// Once the queue is drained every call fails with a `Transport` error,
/// unless a fallback snapshot was set with [`repeat_last`](Self::repeat_last).
pub struct StaticPriceSource {
    queue: Mutex<VecDeque<ScriptedResponse>>,
    repeat: Mutex<Option<PriceSnapshot>>,
    calls: AtomicUsize,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Source that always returns the same snapshot.
    pub fn fixed(snapshot: PriceSnapshot) -> Self {
        let source = Self::new();
        source.repeat_last(snapshot);
        source
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| {
            warn!("Static price source mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn push_ok(&self, snapshot: PriceSnapshot) {
        self.push_delayed(Ok(snapshot), Duration::ZERO);
    }

    pub fn push_err(&self, error: FetchError) {
        self.push_delayed(Err(error), Duration::ZERO);
    }

    /// Queue an outcome that resolves only after `delay`.
    pub fn push_delayed(&self, outcome: Result<PriceSnapshot, FetchError>, delay: Duration) {
        Self::lock(&self.queue).push_back(ScriptedResponse { outcome, delay });
    }

    /// Snapshot returned whenever the queue is empty.
    pub fn repeat_last(&self, snapshot: PriceSnapshot) {
        *Self::lock(&self.repeat) = Some(snapshot);
    }

    /// Number of `fetch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        Self::lock(&self.queue).len()
    }
}

impl Default for StaticPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(&self) -> Result<PriceSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        // Guard must be dropped before the await below
        let next = Self::lock(&self.queue).pop_front();
        match next {
            Some(response) => {
                if !response.delay.is_zero() {
                    tokio::time::sleep(response.delay).await;
                }
                response.outcome
            }
            None => {
                let fallback = Self::lock(&self.repeat).clone();
                fallback
                    .ok_or_else(|| FetchError::Transport("no scripted response left".to_string()))
            }
        }
    }
}
