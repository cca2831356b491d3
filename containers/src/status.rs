use crate::{Bytes32, Checkpoint, Epoch, Slot};
use serde::{Deserialize, Serialize};

/// Chain status advertised by a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    pub finalized: Checkpoint,
    pub head_root: Bytes32,
    pub head_slot: Slot,
}

impl Status {
    pub fn new(finalized: Checkpoint, head_root: Bytes32, head_slot: Slot) -> Self {
        Self {
            finalized,
            head_root,
            head_slot,
        }
    }

    pub fn finalized_epoch(&self) -> Epoch {
        self.finalized.epoch
    }
}
