//! In-memory peer and local chain used by the command line driver.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Result, bail};
use async_trait::async_trait;
use containers::{
    BlobsSidecar, Block, Bytes32, Checkpoint, Epoch, SignedBlock, Slot, Status, ValidatorIndex,
};
use futures::{StreamExt as _, stream};
use libp2p_identity::PeerId;
use networking::sync::{
    BlobsSidecarManager, BlockImporter, ChainState, FailureReason, PeerConnection, ResponseStream,
};
use networking::types::GoodbyeReason;
use parking_lot::{Mutex, RwLock};
use tracing::{info, trace};

/// Canonical chain with a block at every slot from 1 to `head_slot`.
pub fn build_chain(head_slot: u64) -> Vec<SignedBlock> {
    let mut parent_root = Bytes32::default();
    (1..=head_slot)
        .map(|slot| {
            let block = SignedBlock {
                message: Block {
                    slot: Slot(slot),
                    proposer_index: ValidatorIndex(slot % 64),
                    parent_root,
                    state_root: Bytes32::default(),
                    body_root: Bytes32::default(),
                },
                signature: vec![],
            };
            parent_root = block.root();
            block
        })
        .collect()
}

pub struct SimulatedPeer {
    id: PeerId,
    status: Status,
    blocks: BTreeMap<Slot, SignedBlock>,
    max_blocks_per_response: Option<u64>,
    disconnected: Mutex<Option<GoodbyeReason>>,
}

impl SimulatedPeer {
    pub fn new(
        blocks: &[SignedBlock],
        finalized_epoch: Epoch,
        finalized_slot: Slot,
        max_blocks_per_response: Option<u64>,
    ) -> Self {
        let blocks: BTreeMap<_, _> = blocks
            .iter()
            .map(|block| (block.slot(), block.clone()))
            .collect();

        let root_at = |slot: Slot| {
            blocks
                .get(&slot)
                .map(SignedBlock::root)
                .unwrap_or_default()
        };

        let head_slot = blocks.keys().next_back().copied().unwrap_or_default();
        let status = Status::new(
            Checkpoint::new(finalized_epoch, root_at(finalized_slot)),
            root_at(head_slot),
            head_slot,
        );

        Self {
            id: PeerId::random(),
            status,
            blocks,
            max_blocks_per_response,
            disconnected: Mutex::new(None),
        }
    }

    pub fn disconnect_reason(&self) -> Option<GoodbyeReason> {
        *self.disconnected.lock()
    }

    fn blocks_in_range(&self, start_slot: Slot, count: u64) -> Vec<SignedBlock> {
        let limit = self.max_blocks_per_response.unwrap_or(count).min(count) as usize;
        self.blocks
            .range(start_slot..start_slot.plus(count))
            .map(|(_, block)| block.clone())
            .take(limit)
            .collect()
    }
}

#[async_trait]
impl PeerConnection for SimulatedPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn request_blocks_by_range(&self, start_slot: Slot, count: u64) -> ResponseStream<SignedBlock> {
        let blocks = self.blocks_in_range(start_slot, count);
        trace!(start_slot = start_slot.0, count, served = blocks.len(), "Serve blocks by range");
        stream::iter(blocks.into_iter().map(Ok)).boxed()
    }

    fn request_blobs_sidecars_by_range(
        &self,
        start_slot: Slot,
        count: u64,
    ) -> ResponseStream<BlobsSidecar> {
        let sidecars: Vec<_> = self
            .blocks_in_range(start_slot, count)
            .iter()
            .map(|block| BlobsSidecar::for_block(block.slot(), block.root()))
            .collect();
        stream::iter(sidecars.into_iter().map(Ok)).boxed()
    }

    async fn disconnect(&self, reason: GoodbyeReason) -> Result<()> {
        let mut disconnected = self.disconnected.lock();
        if disconnected.is_some() {
            bail!("peer {} already disconnected", self.id);
        }
        info!(peer = %self.id, reason = %reason, code = reason.code(), "Peer disconnected");
        *disconnected = Some(reason);
        Ok(())
    }
}

/// Local chain that accepts any block whose parent it already holds.
pub struct InMemoryChain {
    finalized_epoch: Epoch,
    head_slot: RwLock<Slot>,
    roots: RwLock<HashSet<Bytes32>>,
}

impl InMemoryChain {
    /// Local chain already holding `known_blocks`.
    pub fn new(finalized_epoch: Epoch, known_blocks: &[SignedBlock]) -> Self {
        let head_slot = known_blocks
            .iter()
            .map(SignedBlock::slot)
            .max()
            .unwrap_or_default();

        Self {
            finalized_epoch,
            head_slot: RwLock::new(head_slot),
            roots: RwLock::new(known_blocks.iter().map(SignedBlock::root).collect()),
        }
    }
}

impl ChainState for InMemoryChain {
    fn finalized_epoch(&self) -> Epoch {
        self.finalized_epoch
    }

    fn head_slot(&self) -> Slot {
        *self.head_slot.read()
    }

    fn contains_block(&self, root: &Bytes32) -> bool {
        self.roots.read().contains(root)
    }
}

#[async_trait]
impl BlockImporter for InMemoryChain {
    async fn import_block(&self, block: SignedBlock) -> Result<(), FailureReason> {
        let parent_root = block.parent_root();
        if !parent_root.is_zero() && !self.contains_block(&parent_root) {
            return Err(FailureReason::UnknownParent);
        }

        self.roots.write().insert(block.root());

        let mut head_slot = self.head_slot.write();
        *head_slot = (*head_slot).max(block.slot());

        Ok(())
    }
}

/// Sidecar store requiring sidecars from `first_blob_slot` onwards.
pub struct InMemoryBlobsSidecarStore {
    first_blob_slot: Option<Slot>,
    sidecars: Mutex<HashMap<Bytes32, BlobsSidecar>>,
}

impl InMemoryBlobsSidecarStore {
    pub fn new(first_blob_slot: Option<Slot>) -> Self {
        Self {
            first_blob_slot,
            sidecars: Mutex::new(HashMap::new()),
        }
    }

    pub fn stored_count(&self) -> usize {
        self.sidecars.lock().len()
    }
}

#[async_trait]
impl BlobsSidecarManager for InMemoryBlobsSidecarStore {
    fn is_storage_of_blobs_sidecar_required(&self, slot: Slot) -> bool {
        self.first_blob_slot.is_some_and(|first| slot >= first)
    }

    async fn store_unconfirmed_blobs_sidecar(&self, sidecar: BlobsSidecar) -> Result<()> {
        self.sidecars
            .lock()
            .insert(sidecar.beacon_block_root, sidecar);
        Ok(())
    }
}
