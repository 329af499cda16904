use std::sync::{Arc, Mutex, Weak};

use crate::controller::SaveController;

/// Weak index of initialized controllers, for tooling that wants to list
/// the saves currently alive in the process.
///
/// Controllers register themselves during
/// [`initialize`](SaveController::initialize). Entries never keep a
/// controller alive and are pruned once it is dropped.
#[derive(Debug, Default)]
pub struct LiveControllers {
    entries: Mutex<Vec<Weak<SaveController>>>,
}

impl LiveControllers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `controller`. Returns `false` if it was already tracked.
    pub fn register(&self, controller: &Arc<SaveController>) -> bool {
        let mut entries = self.entries.lock().expect("lock poisoned");
        entries.retain(|w| w.strong_count() > 0);
        let weak = Arc::downgrade(controller);
        if entries.iter().any(|w| w.ptr_eq(&weak)) {
            return false;
        }
        entries.push(weak);
        true
    }

    /// Drop entries whose controller is gone. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.lock().expect("lock poisoned");
        let before = entries.len();
        entries.retain(|w| w.strong_count() > 0);
        before - entries.len()
    }

    /// Controllers still alive, in registration order.
    pub fn live(&self) -> Vec<Arc<SaveController>> {
        self.entries
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
