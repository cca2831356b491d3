use crate::{Bytes32, Slot, ValidatorIndex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: Bytes32,
    pub state_root: Bytes32,
    pub body_root: Bytes32,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignedBlock {
    pub message: Block,
    pub signature: Vec<u8>,
}

impl Block {
    /// Digest identifying this block.
    ///
    /// Commits to every header field, so two blocks share a root only if
    /// they are identical.
    pub fn root(&self) -> Bytes32 {
        let mut hasher = Sha256::new();
        hasher.update(self.slot.0.to_le_bytes());
        hasher.update(self.proposer_index.0.to_le_bytes());
        hasher.update(self.parent_root.0.as_bytes());
        hasher.update(self.state_root.0.as_bytes());
        hasher.update(self.body_root.0.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        Bytes32::from_slice(&digest)
    }
}

impl SignedBlock {
    pub fn slot(&self) -> Slot {
        self.message.slot
    }

    pub fn root(&self) -> Bytes32 {
        self.message.root()
    }

    pub fn parent_root(&self) -> Bytes32 {
        self.message.parent_root
    }
}
