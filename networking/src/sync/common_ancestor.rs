/// Resume point search for the first round of a sync.
///
/// Syncing starts at the first non-finalized slot, but the local node may
/// already hold a long stretch of the peer's chain past that point. Rather
/// than download it again, probe a short run of blocks near the peer's head
/// and resume from the highest one we already have.
///
/// The probe is optimistic: a matching block is taken to mean everything
/// before it matches too. If that is wrong, the worst case is a failed
/// import further on, not a corrupted chain.
use containers::Slot;
use futures::StreamExt as _;
use tracing::{debug, trace};

use super::{
    config::PeerSyncConfig,
    error::SyncError,
    range_request::ResponseRange,
    traits::{ChainState, PeerConnection},
};

pub struct CommonAncestor<'a, C: ChainState + ?Sized> {
    chain: &'a C,
    config: &'a PeerSyncConfig,
}

impl<'a, C: ChainState + ?Sized> CommonAncestor<'a, C> {
    pub fn new(chain: &'a C, config: &'a PeerSyncConfig) -> Self {
        Self { chain, config }
    }

    /// Slot to resume syncing from, never earlier than `start_slot`.
    ///
    /// No request is made unless both the local chain and the peer hold at
    /// least `optimistic_history_length` slots past `start_slot`.
    pub async fn find<P: PeerConnection + ?Sized>(
        &self,
        peer: &P,
        start_slot: Slot,
        remote_head_slot: Slot,
    ) -> Result<Slot, SyncError> {
        let history_length = self.config.optimistic_history_length;
        let local_head_slot = self.chain.head_slot();

        if local_head_slot.distance_from(start_slot) < history_length
            || remote_head_slot.distance_from(start_slot) < history_length
        {
            trace!(
                start_slot = start_slot.0,
                local_head = local_head_slot.0,
                remote_head = remote_head_slot.0,
                "Not enough history to search for a common ancestor"
            );
            return Ok(start_slot);
        }

        let probe_start = Slot(remote_head_slot.0 - history_length);
        let probe_count = self.config.ancestor_probe_block_count;

        debug!(
            peer = %peer.id(),
            start_slot = probe_start.0,
            count = probe_count,
            "Probing peer for common ancestor"
        );

        let mut blocks = peer.request_blocks_by_range(probe_start, probe_count);
        let mut range = ResponseRange::new(probe_start, probe_count);
        let mut best_slot: Option<Slot> = None;

        while let Some(block) = blocks.next().await {
            let block = block?;
            range.record_block(block.slot())?;

            // Slots are strictly increasing, so the latest known block is the highest
            if self.chain.contains_block(&block.root()) {
                best_slot = Some(block.slot());
            }
        }

        Ok(best_slot.map_or(start_slot, |slot| slot.max(start_slot)))
    }
}
