/// Pairs blocks with their blobs sidecars within one round.
///
/// Blocks and sidecars arrive on two independent response streams with no
/// ordering guarantee between them. Whichever half of a pair arrives first
/// waits here until the other half shows up.
use std::collections::HashMap;

use containers::{BlobsSidecar, Bytes32, SignedBlock, Slot};
use tracing::debug;

type MatchKey = (Slot, Bytes32);

/// A block together with the sidecar carrying its blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedBlock {
    pub block: SignedBlock,
    pub blobs_sidecar: BlobsSidecar,
}

/// Correlation buffer for a single round.
///
/// A key is held in at most one of the two maps: as soon as its
/// counterpart arrives the pair is handed back and the entry removed.
#[derive(Debug, Default)]
pub struct BlockAndBlobsSidecarMatcher {
    blocks: HashMap<MatchKey, SignedBlock>,
    blobs_sidecars: HashMap<MatchKey, BlobsSidecar>,
}

impl BlockAndBlobsSidecarMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an arriving block.
    ///
    /// Returns the completed pair if its sidecar was already waiting.
    pub fn record_block(&mut self, block: SignedBlock) -> Option<MatchedBlock> {
        let key = (block.slot(), block.root());

        match self.blobs_sidecars.remove(&key) {
            Some(blobs_sidecar) => Some(MatchedBlock {
                block,
                blobs_sidecar,
            }),
            None => {
                self.blocks.insert(key, block);
                None
            }
        }
    }

    /// Record an arriving sidecar.
    ///
    /// Returns the completed pair if its block was already waiting.
    pub fn record_blobs_sidecar(&mut self, blobs_sidecar: BlobsSidecar) -> Option<MatchedBlock> {
        let key = (blobs_sidecar.beacon_block_slot, blobs_sidecar.beacon_block_root);

        match self.blocks.remove(&key) {
            Some(block) => Some(MatchedBlock {
                block,
                blobs_sidecar,
            }),
            None => {
                self.blobs_sidecars.insert(key, blobs_sidecar);
                None
            }
        }
    }

    /// Drop everything still waiting for a counterpart.
    pub fn clear(&mut self) {
        if !self.is_empty() {
            debug!(
                blocks = self.blocks.len(),
                blobs_sidecars = self.blobs_sidecars.len(),
                "Discarding unmatched blocks and sidecars"
            );
        }
        self.blocks.clear();
        self.blobs_sidecars.clear();
    }

    pub fn pending_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn pending_blobs_sidecars(&self) -> usize {
        self.blobs_sidecars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.blobs_sidecars.is_empty()
    }
}
