/// Forward sync from a single peer for the consensus client.
///
/// Given one peer, request consecutive slot ranges of blocks (and blobs
/// sidecars where the chain requires them) until the local chain reaches
/// the head the peer advertises. It includes:
///
/// - **Range Request**: Sizes each request within the protocol limits
/// - **Common Ancestor**: Skips history the local node already holds
/// - **Block Matcher**: Pairs blocks with sidecars arriving on separate streams
/// - **Error**: Classifies failures and decides whether to drop the peer
/// - **Peer Sync**: Drives the request/import rounds
///
/// ## Architecture
///
/// Transport, chain storage, block import and sidecar storage are reached
/// through the traits in [`traits`]. The sync itself holds no network or
/// storage resources.
///
/// ## Results
///
/// - **SUCCESSFUL_SYNC**: Caught up with the peer's advertised head
/// - **CANCELLED**: Stopped locally
/// - **IMPORT_FAILED / BAD_BLOCK**: A block could not be imported
/// - **INVALID_RESPONSE**: The peer broke the request/response protocol
/// - **EXCESSIVE_THROTTLING**: The peer returned too little, too often
/// - **FAULTY_ADVERTISEMENT**: The peer claimed finality it could not serve
pub mod block_matcher;
pub mod common_ancestor;
pub mod config;
pub mod error;
pub mod observer;
pub mod peer_sync;
pub mod range_request;
pub mod result;
pub mod traits;

pub use block_matcher::{BlockAndBlobsSidecarMatcher, MatchedBlock};
pub use common_ancestor::CommonAncestor;
pub use config::*;
pub use error::{FailureClass, SyncError, classify_failure};
pub use observer::{ImportOutcome, NoopObserver, SyncObserver};
pub use peer_sync::PeerSync;
pub use range_request::{ResponseRange, RoundPlan, plan_round};
pub use result::PeerSyncResult;
pub use traits::{
    BlobsSidecarManager, BlockImporter, ChainState, FailureReason, PeerConnection, ResponseStream,
    RpcError,
};

#[cfg(test)]
mod tests;
