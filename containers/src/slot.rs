use serde::{Deserialize, Serialize};
use std::fmt;

/// A slot number. Blocks are keyed by slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Slot(pub u64);

/// An epoch number: a fixed-size run of consecutive slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Epoch(pub u64);

impl Slot {
    /// Number of slots from `earlier` up to `self`, zero if `earlier` is ahead.
    pub fn distance_from(self, earlier: Slot) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn plus(self, slots: u64) -> Slot {
        Slot(self.0.saturating_add(slots))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
