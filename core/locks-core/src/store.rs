//! Process-wide cache of the most recently fetched lock set.
//!
//! The store is the single source of truth for every surface. It holds exactly
//! one [`LockSnapshot`] behind an `Arc`; replacing it is a single pointer swap,
//! so an observer can never see a half-updated list.
//!
//! # Replacement
//!
//! Updates are total. The authority is always right about the full set, so
//! there is no merge or partial update path. Each swap increments the version.
//!
//! # Observers
//!
//! Observers run synchronously inside [`LockStateStore::replace`], in
//! registration order, after the swap. The observer list is copied before the
//! calls, so an observer may subscribe or unsubscribe without deadlocking.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use crate::types::LockSnapshot;

type Observer = Arc<dyn Fn(&Arc<LockSnapshot>) + Send + Sync>;

struct Observers {
    next_id: u64,
    entries: Vec<(u64, Observer)>,
}

struct Inner {
    current: RwLock<Arc<LockSnapshot>>,
    observers: Mutex<Observers>,
}

/// Shared, cheaply cloneable handle to the lock state.
#[derive(Clone)]
pub struct LockStateStore {
    inner: Arc<Inner>,
}

impl Default for LockStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LockStateStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(LockSnapshot::empty())),
                observers: Mutex::new(Observers {
                    next_id: 0,
                    entries: Vec::new(),
                }),
            }),
        }
    }

    /// Latest swapped-in snapshot. Never waits on a fetch.
    pub fn current(&self) -> Arc<LockSnapshot> {
        // Recover from poisoning - the snapshot is immutable, so it is always whole
        self.inner
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swaps in `snapshot` with the next version and notifies every observer.
    pub fn replace(&self, snapshot: LockSnapshot) -> Arc<LockSnapshot> {
        let swapped = {
            let mut current = self
                .inner
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let next = Arc::new(snapshot.with_version(current.version() + 1));
            *current = Arc::clone(&next);
            next
        };

        tracing::info!(
            version = swapped.version(),
            locks = swapped.len(),
            "Lock snapshot replaced"
        );

        let observers: Vec<Observer> = self
            .observers()
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(&swapped);
        }

        swapped
    }

    /// Registers `observer` for every future replacement.
    ///
    /// The observer stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Arc<LockSnapshot>) + Send + Sync + 'static,
    {
        let mut observers = self.observers();
        let id = observers.next_id;
        observers.next_id += 1;
        observers.entries.push((id, Arc::new(observer)));

        Subscription {
            store: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers().entries.len()
    }

    fn observers(&self) -> MutexGuard<'_, Observers> {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Disposer returned by [`LockStateStore::subscribe`].
pub struct Subscription {
    store: Weak<Inner>,
    id: Option<u64>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        let (Some(id), Some(inner)) = (self.id.take(), self.store.upgrade()) else {
            return;
        };
        inner
            .observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries
            .retain(|(entry_id, _)| *entry_id != id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
