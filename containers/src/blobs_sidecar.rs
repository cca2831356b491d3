use crate::{Bytes32, Slot};
use serde::{Deserialize, Serialize};

/// Blob payload accompanying a block, transferred and stored separately
/// from the block body.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobsSidecar {
    pub beacon_block_root: Bytes32,
    pub beacon_block_slot: Slot,
    pub blobs: Vec<Vec<u8>>,
    pub kzg_aggregated_proof: Vec<u8>,
}

impl BlobsSidecar {
    pub fn for_block(beacon_block_slot: Slot, beacon_block_root: Bytes32) -> Self {
        Self {
            beacon_block_root,
            beacon_block_slot,
            ..Self::default()
        }
    }
}
