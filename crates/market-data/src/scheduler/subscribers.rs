//! Observer set for published dashboard states.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::warn;

use crate::models::DashboardState;

/// Receives every published [`DashboardState`].
///
/// States are shared and immutable; re-render from the whole state on each
/// call. Implemented for plain closures.
pub trait StateSubscriber: Send + Sync {
    fn on_state(&self, state: Arc<DashboardState>);
}

impl<F> StateSubscriber for F
where
    F: Fn(Arc<DashboardState>) + Send + Sync,
{
    fn on_state(&self, state: Arc<DashboardState>) {
        self(state)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Entry = (SubscriptionId, Arc<dyn StateSubscriber>);

/// Subscribers are copied out before delivery, so subscribing or
/// unsubscribing never waits on a publication in progress.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    next_id: AtomicU64,
    entries: RwLock<Vec<Entry>>,
}

impl SubscriberSet {
    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Subscriber set lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Subscriber set lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub(crate) fn subscribe(&self, subscriber: Arc<dyn StateSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().push((id, subscriber));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn publish(&self, state: &Arc<DashboardState>) {
        let targets: Vec<Arc<dyn StateSubscriber>> =
            self.read().iter().map(|(_, s)| Arc::clone(s)).collect();
        for subscriber in targets {
            subscriber.on_state(Arc::clone(state));
        }
    }
}
