//! `Saving` / `Saved` lifecycle notifications.
//!
//! Every controller operation takes the operation lock, emits
//! [`LifecycleEvent::Saving`], does its work, releases the lock, and then
//! emits [`LifecycleEvent::Saved`]. `Saved` fires even when the operation
//! failed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// The controller operation an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Initialize,
    Load,
    Save,
    Create,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialize => "initialize",
            Self::Load => "load",
            Self::Save => "save",
            Self::Create => "create",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A lifecycle notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The operation lock was acquired.
    Saving(Operation),
    /// The operation lock was released.
    Saved(Operation),
}

impl LifecycleEvent {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Saving(op) | Self::Saved(op) => *op,
        }
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, Self::Saving(_))
    }
}

/// Handle returned by [`LifecycleEvents::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Subscriber list for lifecycle events.
///
/// Callbacks run synchronously on the task that performed the operation,
/// in subscription order. Emission iterates a copy of the list, so a
/// callback may subscribe or unsubscribe without deadlocking.
#[derive(Default)]
pub struct LifecycleEvents {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(SubscriptionId, Callback)>>,
}

impl LifecycleEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .write()
            .expect("lock poisoned")
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write().expect("lock poisoned");
        let before = callbacks.len();
        callbacks.retain(|(sub, _)| *sub != id);
        callbacks.len() != before
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        let callbacks: Vec<Callback> = self
            .callbacks
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(&event);
        }
    }
}

impl fmt::Debug for LifecycleEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEvents")
            .field("subscribers", &self.len())
            .finish()
    }
}
