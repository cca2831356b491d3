/// Round failure causes and their classification.
///
/// A round stops at its first failure. That single cause decides the
/// terminal result of the whole sync and whether the peer is ejected.
use chain::ChainConfig;
use containers::{Bytes32, Slot, Status};
use thiserror::Error;

use super::{
    result::PeerSyncResult,
    traits::{FailureReason, RpcError},
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to import block {root} at slot {slot}: {reason:?}")]
    FailedBlockImport {
        slot: Slot,
        root: Bytes32,
        reason: FailureReason,
    },
    #[error("peer sync was cancelled")]
    Cancelled,
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Classified round failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Block does not connect to our chain but sits in the peer's finalized
    /// range, most likely a fork we already pruned.
    BenignStaleForkImport,
    BadBlockFromPeer,
    GenericImportFailure,
    Cancelled,
    MalformedPeerResponse,
}

impl FailureClass {
    pub fn result(&self) -> PeerSyncResult {
        match self {
            FailureClass::BenignStaleForkImport | FailureClass::GenericImportFailure => {
                PeerSyncResult::ImportFailed
            }
            FailureClass::BadBlockFromPeer => PeerSyncResult::BadBlock,
            FailureClass::Cancelled => PeerSyncResult::Cancelled,
            FailureClass::MalformedPeerResponse => PeerSyncResult::InvalidResponse,
        }
    }

    pub fn disconnects_peer(&self) -> bool {
        match self {
            FailureClass::BadBlockFromPeer | FailureClass::MalformedPeerResponse => true,
            FailureClass::BenignStaleForkImport
            | FailureClass::GenericImportFailure
            | FailureClass::Cancelled => false,
        }
    }
}

/// Import failures that prove the peer served an invalid block.
pub fn is_bad_block_reason(reason: FailureReason) -> bool {
    match reason {
        FailureReason::FailedWeakSubjectivityChecks
        | FailureReason::FailedStateTransition
        | FailureReason::UnknownParent
        | FailureReason::FailedBlobsAvailabilityCheck => true,
        FailureReason::BlockIsFromFuture
        | FailureReason::DoesNotDescendFromLatestFinalized
        | FailureReason::DescendantOfInvalidBlock
        | FailureReason::FailedExecutionPayloadExecution
        | FailureReason::InternalError => false,
    }
}

/// Classify the failure of a round.
///
/// Transport failures, sidecar storage failures and anything else that
/// does not say something about the peer's data are returned as errors
/// for the caller to handle.
pub fn classify_failure(
    error: SyncError,
    peer_status: &Status,
    config: &ChainConfig,
) -> anyhow::Result<FailureClass> {
    match error {
        SyncError::FailedBlockImport { slot, reason, .. } => {
            let peer_finalized_slot =
                config.compute_start_slot_at_epoch(peer_status.finalized_epoch());

            if reason == FailureReason::UnknownParent && slot <= peer_finalized_slot {
                Ok(FailureClass::BenignStaleForkImport)
            } else if is_bad_block_reason(reason) {
                Ok(FailureClass::BadBlockFromPeer)
            } else {
                Ok(FailureClass::GenericImportFailure)
            }
        }
        SyncError::Cancelled => Ok(FailureClass::Cancelled),
        SyncError::Rpc(RpcError::InvalidResponse(_) | RpcError::ErrorResponse { .. }) => {
            Ok(FailureClass::MalformedPeerResponse)
        }
        SyncError::Rpc(RpcError::Transport(error)) => {
            Err(error.context("range request to peer failed"))
        }
        SyncError::Other(error) => Err(error.context("unhandled error while syncing")),
    }
}
