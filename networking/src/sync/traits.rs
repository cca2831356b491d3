/// Capabilities the peer sync depends on.
///
/// Transport, chain storage, block validation and sidecar storage live
/// outside this crate. The sync only talks to them through these traits,
/// which keeps it testable with in-memory mocks.
use anyhow::Result;
use async_trait::async_trait;
use containers::{BlobsSidecar, Bytes32, Epoch, SignedBlock, Slot, Status};
use futures::stream::BoxStream;
use libp2p_identity::PeerId;
use thiserror::Error;

use crate::types::GoodbyeReason;

/// Failure reported by a peer's range response.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The response violated the request: wrong slots, out of order,
    /// too many items, undecodable payload.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The peer answered with an error response code.
    #[error("peer returned error response {code}: {message}")]
    ErrorResponse { code: u8, message: String },
    /// The request could not be carried out at the transport level.
    #[error("transport failure: {0}")]
    Transport(#[source] anyhow::Error),
}

/// Items of a range response, in the order the peer sends them.
///
/// The request succeeded when the stream ends without yielding an error.
pub type ResponseStream<T> = BoxStream<'static, Result<T, RpcError>>;

/// A connected peer we can sync from.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn id(&self) -> PeerId;

    /// Latest chain status the peer advertised.
    fn status(&self) -> Status;

    fn request_blocks_by_range(&self, start_slot: Slot, count: u64) -> ResponseStream<SignedBlock>;

    fn request_blobs_sidecars_by_range(
        &self,
        start_slot: Slot,
        count: u64,
    ) -> ResponseStream<BlobsSidecar>;

    /// Send a goodbye and close the connection.
    ///
    /// The sync awaits this before returning its result, for at most
    /// `PeerSyncConfig::disconnect_timeout`.
    async fn disconnect(&self, reason: GoodbyeReason) -> Result<()>;
}

/// Read access to the local chain.
pub trait ChainState: Send + Sync {
    fn finalized_epoch(&self) -> Epoch;

    fn head_slot(&self) -> Slot;

    fn contains_block(&self, root: &Bytes32) -> bool;
}

/// Why a block could not be imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    UnknownParent,
    BlockIsFromFuture,
    DoesNotDescendFromLatestFinalized,
    FailedStateTransition,
    FailedWeakSubjectivityChecks,
    DescendantOfInvalidBlock,
    FailedExecutionPayloadExecution,
    FailedBlobsAvailabilityCheck,
    InternalError,
}

#[async_trait]
pub trait BlockImporter: Send + Sync {
    async fn import_block(&self, block: SignedBlock) -> Result<(), FailureReason>;
}

#[async_trait]
pub trait BlobsSidecarManager: Send + Sync {
    /// Whether a block at `slot` must come with its blobs sidecar.
    fn is_storage_of_blobs_sidecar_required(&self, slot: Slot) -> bool;

    /// Store a sidecar ahead of importing the block it belongs to.
    async fn store_unconfirmed_blobs_sidecar(&self, sidecar: BlobsSidecar) -> Result<()>;
}
