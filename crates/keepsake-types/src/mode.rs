use std::fmt;

use serde::{Deserialize, Serialize};

/// Selects which side effects a load or save performs.
///
/// Both concerns are gated by one value so that a single operation covers
/// them under one lock acquisition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveMode {
    /// Load: hand the in-memory data to participants.
    /// Save: collect participant data into memory.
    #[default]
    MemoryOnly,
    /// Load: fetch persisted data into memory.
    /// Save: commit in-memory data to persistent storage.
    PersistentOnly,
    /// Both of the above; persistent fetch before broadcast on load,
    /// broadcast before persistent commit on save.
    Full,
}

impl SaveMode {
    /// Whether participants are notified.
    pub fn touches_memory(self) -> bool {
        !matches!(self, Self::PersistentOnly)
    }

    /// Whether the persistence backend is called.
    pub fn touches_persistent(self) -> bool {
        !matches!(self, Self::MemoryOnly)
    }
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryOnly => write!(f, "memory-only"),
            Self::PersistentOnly => write!(f, "persistent-only"),
            Self::Full => write!(f, "full"),
        }
    }
}
