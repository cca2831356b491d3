use containers::{Epoch, Slot};

pub const SLOTS_PER_EPOCH: u64 = 32;

/// Maximum number of blocks a peer may be asked for in one BlocksByRange request.
pub const MAX_REQUEST_BLOCKS: u64 = 1024;
/// Maximum number of blob sidecars a peer may be asked for in one BlobsSidecarsByRange request.
pub const MAX_REQUEST_BLOBS_SIDECARS: u64 = 128;

#[derive(Clone, Debug)]
pub struct ChainConfig {
    pub slots_per_epoch: u64,
    pub max_request_blocks: u64,
    pub max_request_blobs_sidecars: u64,
}

pub const DEVNET_CONFIG: ChainConfig = ChainConfig {
    slots_per_epoch: SLOTS_PER_EPOCH,
    max_request_blocks: MAX_REQUEST_BLOCKS,
    max_request_blobs_sidecars: MAX_REQUEST_BLOBS_SIDECARS,
};

impl Default for ChainConfig {
    fn default() -> Self {
        DEVNET_CONFIG
    }
}

impl ChainConfig {
    pub fn compute_start_slot_at_epoch(&self, epoch: Epoch) -> Slot {
        Slot(epoch.0.saturating_mul(self.slots_per_epoch))
    }

    /// First slot after the given finalized epoch's start slot.
    pub fn first_non_finalized_slot(&self, finalized_epoch: Epoch) -> Slot {
        self.compute_start_slot_at_epoch(finalized_epoch).plus(1)
    }
}
