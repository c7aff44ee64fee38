use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::snapshot::SettingsSnapshot;

/// Message sent to subscribers whenever the published snapshot changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsChanged {
    pub generation: u64,
}

/// Owns the current [`SettingsSnapshot`] and notifies subscribers on change.
///
/// Cloning is cheap and every clone observes the same state, so a background
/// reload task can hold one clone while a controller holds another.
#[derive(Debug, Clone)]
pub struct SettingsProvider {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    current: RwLock<Arc<SettingsSnapshot>>,
    generation: AtomicU64,
    subscribers: Mutex<Vec<Sender<SettingsChanged>>>,
}

impl SettingsProvider {
    pub fn new(snapshot: SettingsSnapshot) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(snapshot)),
                generation: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the currently published snapshot.
    pub fn snapshot(&self) -> Arc<SettingsSnapshot> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Monotonic counter bumped once per effective replacement.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Registers a new listener. Dropped receivers are pruned on the next change.
    pub fn subscribe(&self) -> Receiver<SettingsChanged> {
        let (tx, rx) = unbounded();
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Publishes `snapshot`. Returns `false` without notifying anyone when it
    /// equals the current value.
    pub fn replace(&self, snapshot: SettingsSnapshot) -> bool {
        let generation = {
            let mut current = self
                .inner
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if **current == snapshot {
                return false;
            }
            *current = Arc::new(snapshot);
            self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
        };

        debug!(target: "settings", generation, "settings_replaced");
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(SettingsChanged { generation }).is_ok());
        true
    }

    /// Applies `op` to a copy of the current snapshot and publishes the result.
    pub fn update<F>(&self, op: F) -> bool
    where
        F: FnOnce(&mut SettingsSnapshot),
    {
        let mut next = (*self.snapshot()).clone();
        op(&mut next);
        next.sanitize();
        self.replace(next)
    }
}

impl Default for SettingsProvider {
    fn default() -> Self {
        Self::new(SettingsSnapshot::default())
    }
}
