/// Planning of the next range request.
use chain::ChainConfig;
use containers::Slot;

use super::traits::{BlobsSidecarManager, RpcError};

/// How much to ask a peer for in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    pub count: u64,
    pub blobs_sidecars_required: bool,
}

/// Size the next request so it covers `start_slot..=head_slot` within the
/// protocol limits.
///
/// When the end of the blob-capped range falls where sidecars must be
/// stored, the whole request shrinks to the sidecar limit so blocks and
/// sidecars are fetched over the same slots.
pub fn plan_round<B>(
    config: &ChainConfig,
    blobs_sidecar_manager: &B,
    start_slot: Slot,
    head_slot: Slot,
) -> RoundPlan
where
    B: BlobsSidecarManager + ?Sized,
{
    let diff = head_slot.distance_from(start_slot).saturating_add(1);
    let count = diff.min(config.max_request_blocks);

    let blobs_range = count.min(config.max_request_blobs_sidecars);
    let request_end_slot = Slot(start_slot.plus(blobs_range).0.saturating_sub(1));

    if blobs_sidecar_manager.is_storage_of_blobs_sidecar_required(request_end_slot) {
        RoundPlan {
            count: count.min(config.max_request_blobs_sidecars),
            blobs_sidecars_required: true,
        }
    } else {
        RoundPlan {
            count,
            blobs_sidecars_required: false,
        }
    }
}

/// Bounds a range response to the request that produced it.
///
/// Blocks must fall inside `[start_slot, start_slot + count)` with strictly
/// increasing slots. Sidecars only need to fall inside the range.
#[derive(Debug, Clone, Copy)]
pub struct ResponseRange {
    start_slot: Slot,
    end_slot: Slot,
    last_block_slot: Option<Slot>,
}

impl ResponseRange {
    pub fn new(start_slot: Slot, count: u64) -> Self {
        Self {
            start_slot,
            end_slot: start_slot.plus(count),
            last_block_slot: None,
        }
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.start_slot <= slot && slot < self.end_slot
    }

    pub fn record_block(&mut self, slot: Slot) -> Result<(), RpcError> {
        if !self.contains(slot) {
            return Err(self.out_of_range("block", slot));
        }

        if let Some(last) = self.last_block_slot.filter(|last| slot <= *last) {
            return Err(RpcError::InvalidResponse(format!(
                "block at slot {slot} does not follow block at slot {last}"
            )));
        }

        self.last_block_slot = Some(slot);
        Ok(())
    }

    pub fn check_blobs_sidecar(&self, slot: Slot) -> Result<(), RpcError> {
        if self.contains(slot) {
            Ok(())
        } else {
            Err(self.out_of_range("blobs sidecar", slot))
        }
    }

    /// Slot of the last block accepted so far.
    pub fn last_block_slot(&self) -> Option<Slot> {
        self.last_block_slot
    }

    fn out_of_range(&self, item: &str, slot: Slot) -> RpcError {
        RpcError::InvalidResponse(format!(
            "{item} at slot {slot} outside requested range [{}, {})",
            self.start_slot, self.end_slot
        ))
    }
}
