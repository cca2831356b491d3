/// Forward sync against a single peer.
///
/// `PeerSync` walks the peer's chain from our first non-finalized slot up to
/// the head the peer advertises, one range request per round, importing
/// every block as it arrives.
///
/// ## Rounds
///
/// Each round:
/// 1. Checks for a stop request and whether the peer's head has been reached
/// 2. Plans how many slots to request and whether sidecars are needed
/// 3. Waits until `inter_round_pacing` has passed since the previous dispatch
/// 4. On the first round only, probes for a later common ancestor
/// 5. Requests blocks (and sidecars) and imports them in arrival order
/// 6. Checks whether the peer is throttling us
///
/// Rounds run strictly one after the other. The first failure ends the sync
/// and is classified into a `PeerSyncResult`.
use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use anyhow::Result;
use chain::ChainConfig;
use containers::{BlobsSidecar, SignedBlock, Slot, Status};
use futures::{
    Stream, StreamExt as _,
    stream::{self, BoxStream},
};
use tokio::time::Sleep;
use tracing::{debug, error, trace, warn};

use super::{
    block_matcher::{BlockAndBlobsSidecarMatcher, MatchedBlock},
    common_ancestor::CommonAncestor,
    config::PeerSyncConfig,
    error::{FailureClass, SyncError, classify_failure},
    observer::{ImportOutcome, NoopObserver, SyncObserver},
    range_request::{ResponseRange, RoundPlan, plan_round},
    result::PeerSyncResult,
    traits::{BlobsSidecarManager, BlockImporter, ChainState, PeerConnection, RpcError},
};
use crate::types::GoodbyeReason;

/// State of one `sync` call.
struct SyncSession {
    stopped: Arc<AtomicBool>,
    throttled_rounds: AtomicUsize,
    starting_slot: Slot,
}

impl SyncSession {
    fn new(stopped: Arc<AtomicBool>, starting_slot: Slot) -> Self {
        Self {
            stopped,
            throttled_rounds: AtomicUsize::new(0),
            starting_slot,
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn ensure_not_stopped(&self) -> Result<(), SyncError> {
        if self.is_stopped() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything the next round needs to know about the previous one.
struct RoundState {
    start_slot: Slot,
    /// Fires `inter_round_pacing` after the previous round was dispatched.
    ready_for_request: Option<Pin<Box<Sleep>>>,
    find_common_ancestor: bool,
}

impl RoundState {
    fn first(start_slot: Slot) -> Self {
        Self {
            start_slot,
            ready_for_request: None,
            find_common_ancestor: true,
        }
    }
}

enum RoundOutcome {
    Continue(RoundState),
    Finished(PeerSyncResult),
}

enum RangeItem {
    Block(SignedBlock),
    BlobsSidecar(BlobsSidecar),
}

pub struct PeerSync<C, I, B> {
    chain: Arc<C>,
    block_importer: Arc<I>,
    blobs_sidecar_manager: Arc<B>,
    observer: Arc<dyn SyncObserver>,
    chain_config: ChainConfig,
    config: PeerSyncConfig,
    stopped: Arc<AtomicBool>,
    starting_slot: AtomicU64,
}

impl<C, I, B> PeerSync<C, I, B>
where
    C: ChainState,
    I: BlockImporter,
    B: BlobsSidecarManager,
{
    pub fn new(
        chain: Arc<C>,
        block_importer: Arc<I>,
        blobs_sidecar_manager: Arc<B>,
        chain_config: ChainConfig,
        config: PeerSyncConfig,
    ) -> Self {
        Self {
            chain,
            block_importer,
            blobs_sidecar_manager,
            observer: Arc::new(NoopObserver),
            chain_config,
            config,
            stopped: Arc::new(AtomicBool::new(false)),
            starting_slot: AtomicU64::new(0),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Sync with `peer` until its advertised head is reached or the sync fails.
    ///
    /// Returns an error only for faults that say nothing about the peer,
    /// such as transport or sidecar storage failures.
    pub async fn sync<P: PeerConnection + ?Sized>(&self, peer: &P) -> Result<PeerSyncResult> {
        debug!(peer = %peer.id(), "Start syncing to peer");

        // Begin requesting blocks at our first non-finalized slot
        let finalized_epoch = self.chain.finalized_epoch();
        let first_non_final_slot = self.chain_config.first_non_finalized_slot(finalized_epoch);
        self.starting_slot.store(first_non_final_slot.0, Ordering::SeqCst);

        let session = SyncSession::new(self.stopped.clone(), first_non_final_slot);
        let result = self.execute_sync(peer, &session).await;

        match &result {
            Ok(result) => debug!(peer = %peer.id(), result = %result, "Finished syncing to peer"),
            Err(error) => debug!(peer = %peer.id(), error = %error, "Failed to sync with peer"),
        }

        result
    }

    /// Stop syncing. Requests already in flight are left to finish, but
    /// their results are discarded and no new request is sent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// First slot requested by the current or most recent sync.
    pub fn starting_slot(&self) -> Slot {
        Slot(self.starting_slot.load(Ordering::SeqCst))
    }

    async fn execute_sync<P: PeerConnection + ?Sized>(
        &self,
        peer: &P,
        session: &SyncSession,
    ) -> Result<PeerSyncResult> {
        let mut round = RoundState::first(session.starting_slot);

        loop {
            if session.is_stopped() {
                return Ok(PeerSyncResult::Cancelled);
            }

            let status = peer.status();

            if round.start_slot > status.head_slot {
                // We've synced the advertised head, nothing left to request
                return Ok(self.complete_sync_with_peer(peer, &status).await);
            }

            round = match self.execute_round(peer, session, &status, round).await {
                Ok(RoundOutcome::Continue(next)) => next,
                Ok(RoundOutcome::Finished(result)) => return Ok(result),
                Err(error) => {
                    return self
                        .handle_failed_request_to_peer(peer, &status, error)
                        .await;
                }
            };
        }
    }

    async fn execute_round<P: PeerConnection + ?Sized>(
        &self,
        peer: &P,
        session: &SyncSession,
        status: &Status,
        mut round: RoundState,
    ) -> Result<RoundOutcome, SyncError> {
        let start_slot = round.start_slot;
        let plan = plan_round(
            &self.chain_config,
            self.blobs_sidecar_manager.as_ref(),
            start_slot,
            status.head_slot,
        );

        if let Some(ready_for_request) = round.ready_for_request.take() {
            ready_for_request.await;
        }

        let request_start = if round.find_common_ancestor {
            let ancestor_slot = CommonAncestor::new(self.chain.as_ref(), &self.config)
                .find(peer, start_slot, status.head_slot)
                .await?;
            trace!(
                start_slot = ancestor_slot.0,
                instead_of = start_slot.0,
                "Start sync from common ancestor"
            );
            ancestor_slot
        } else {
            start_slot
        };

        session.ensure_not_stopped()?;

        debug!(
            peer = %peer.id(),
            count = plan.count,
            start_slot = request_start.0,
            "Request blocks"
        );

        let ready_for_next_request = Box::pin(tokio::time::sleep(self.config.inter_round_pacing));

        let last_block_slot = self
            .request_range(peer, session, request_start, plan)
            .await?;

        // An empty response means the whole requested range holds no blocks
        let actual_end_slot =
            last_block_slot.unwrap_or(Slot(request_start.plus(plan.count).0.saturating_sub(1)));
        let next_slot = actual_end_slot.plus(1);

        trace!(
            peer = %peer.id(),
            count = plan.count,
            next_slot = next_slot.0,
            "Completed range request"
        );

        let min_progress = self.config.min_slots_progress_per_round;

        if plan.count > min_progress && start_slot.plus(min_progress) > next_slot {
            let throttled_rounds = session.throttled_rounds.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(
                peer = %peer.id(),
                throttled_rounds,
                "Received excessively throttled response"
            );

            if throttled_rounds > self.config.max_throttled_rounds {
                debug!(
                    peer = %peer.id(),
                    "Rejecting peer as sync target because it excessively throttled returned blocks"
                );
                return Ok(RoundOutcome::Finished(PeerSyncResult::ExcessiveThrottling));
            }
        } else {
            session.throttled_rounds.store(0, Ordering::SeqCst);
        }

        Ok(RoundOutcome::Continue(RoundState {
            start_slot: next_slot,
            ready_for_request: Some(ready_for_next_request),
            find_common_ancestor: false,
        }))
    }

    /// Issue the round's requests and import everything they return.
    ///
    /// Returns the slot of the last block received, if any.
    async fn request_range<P: PeerConnection + ?Sized>(
        &self,
        peer: &P,
        session: &SyncSession,
        start_slot: Slot,
        plan: RoundPlan,
    ) -> Result<Option<Slot>, SyncError> {
        let blocks = peer
            .request_blocks_by_range(start_slot, plan.count)
            .map(|item| item.map(RangeItem::Block));

        let blobs_sidecars: BoxStream<'static, Result<RangeItem, RpcError>> =
            if plan.blobs_sidecars_required {
                debug!(
                    peer = %peer.id(),
                    count = plan.count,
                    start_slot = start_slot.0,
                    "Request blobs sidecars"
                );
                peer.request_blobs_sidecars_by_range(start_slot, plan.count)
                    .map(|item| item.map(RangeItem::BlobsSidecar))
                    .boxed()
            } else {
                stream::empty().boxed()
            };

        let mut responses = stream::select(blocks, blobs_sidecars);
        let mut matcher = BlockAndBlobsSidecarMatcher::new();

        let outcome = self
            .import_responses(session, &mut responses, &mut matcher, start_slot, plan)
            .await;

        matcher.clear();
        outcome
    }

    async fn import_responses<S>(
        &self,
        session: &SyncSession,
        responses: &mut S,
        matcher: &mut BlockAndBlobsSidecarMatcher,
        start_slot: Slot,
        plan: RoundPlan,
    ) -> Result<Option<Slot>, SyncError>
    where
        S: Stream<Item = Result<RangeItem, RpcError>> + Unpin + Send,
    {
        let mut range = ResponseRange::new(start_slot, plan.count);

        while let Some(item) = responses.next().await {
            match item? {
                RangeItem::Block(block) => {
                    range.record_block(block.slot())?;

                    if plan.blobs_sidecars_required {
                        if let Some(matched) = matcher.record_block(block) {
                            self.store_blobs_sidecar_and_import_block(session, matched).await?;
                        }
                    } else {
                        self.import_block(session, block).await?;
                    }
                }
                RangeItem::BlobsSidecar(blobs_sidecar) => {
                    range.check_blobs_sidecar(blobs_sidecar.beacon_block_slot)?;

                    if let Some(matched) = matcher.record_blobs_sidecar(blobs_sidecar) {
                        self.store_blobs_sidecar_and_import_block(session, matched).await?;
                    }
                }
            }
        }

        Ok(range.last_block_slot())
    }

    async fn store_blobs_sidecar_and_import_block(
        &self,
        session: &SyncSession,
        matched: MatchedBlock,
    ) -> Result<(), SyncError> {
        self.store_blobs_sidecar(session, matched.blobs_sidecar).await?;
        self.import_block(session, matched.block).await
    }

    async fn import_block(
        &self,
        session: &SyncSession,
        block: SignedBlock,
    ) -> Result<(), SyncError> {
        session.ensure_not_stopped()?;

        let slot = block.slot();
        let root = block.root();

        match self.block_importer.import_block(block).await {
            Ok(()) => {
                trace!(slot = slot.0, root = %root, "Block imported");
                self.observer.on_block_import(ImportOutcome::Imported);
                Ok(())
            }
            Err(reason) => {
                trace!(slot = slot.0, root = %root, reason = ?reason, "Block import failed");
                self.observer.on_block_import(ImportOutcome::Rejected);
                Err(SyncError::FailedBlockImport { slot, root, reason })
            }
        }
    }

    async fn store_blobs_sidecar(
        &self,
        session: &SyncSession,
        blobs_sidecar: BlobsSidecar,
    ) -> Result<(), SyncError> {
        session.ensure_not_stopped()?;

        let slot = blobs_sidecar.beacon_block_slot;
        let root = blobs_sidecar.beacon_block_root;

        match self
            .blobs_sidecar_manager
            .store_unconfirmed_blobs_sidecar(blobs_sidecar)
            .await
        {
            Ok(()) => {
                trace!(slot = slot.0, block_root = %root, "Blobs sidecar stored");
                self.observer.on_blobs_sidecar_import(ImportOutcome::Imported);
                Ok(())
            }
            Err(error) => {
                trace!(
                    slot = slot.0,
                    block_root = %root,
                    error = %error,
                    "Error while storing blobs sidecar"
                );
                self.observer.on_blobs_sidecar_import(ImportOutcome::Rejected);
                Err(error
                    .context(format!("failed to store blobs sidecar for slot {slot}"))
                    .into())
            }
        }
    }

    async fn complete_sync_with_peer<P: PeerConnection + ?Sized>(
        &self,
        peer: &P,
        status: &Status,
    ) -> PeerSyncResult {
        if self.chain.finalized_epoch() >= status.finalized_epoch() {
            return PeerSyncResult::SuccessfulSync;
        }

        debug!(
            peer = %peer.id(),
            finalized_epoch = status.finalized_epoch().0,
            "Disconnecting from peer due to inaccurate advertised finalized epoch"
        );
        self.disconnect_from_peer(peer).await;
        PeerSyncResult::FaultyAdvertisement
    }

    async fn handle_failed_request_to_peer<P: PeerConnection + ?Sized>(
        &self,
        peer: &P,
        status: &Status,
        error: SyncError,
    ) -> Result<PeerSyncResult> {
        let failed_import = match &error {
            SyncError::FailedBlockImport { slot, root, reason } => Some((*slot, *root, *reason)),
            _ => None,
        };

        let class = classify_failure(error, status, &self.chain_config)?;

        if let Some((slot, root, reason)) = failed_import {
            match class {
                FailureClass::BenignStaleForkImport => debug!(
                    peer = %peer.id(),
                    slot = slot.0,
                    root = %root,
                    reason = ?reason,
                    "Failed to import block from peer's finalized range, likely a pruned fork"
                ),
                _ => warn!(
                    peer = %peer.id(),
                    slot = slot.0,
                    root = %root,
                    reason = ?reason,
                    "Failed to import block from peer"
                ),
            }
        }

        if class.disconnects_peer() {
            debug!(peer = %peer.id(), failure = ?class, "Disconnecting from peer");
            self.disconnect_from_peer(peer).await;
        }

        Ok(class.result())
    }

    async fn disconnect_from_peer<P: PeerConnection + ?Sized>(&self, peer: &P) {
        let disconnect = peer.disconnect(GoodbyeReason::FaultOrError);

        match tokio::time::timeout(self.config.disconnect_timeout, disconnect).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => error!(
                peer = %peer.id(),
                error = ?error,
                "Failed to disconnect from peer, this is a bug"
            ),
            Err(_) => error!(
                peer = %peer.id(),
                timeout = ?self.config.disconnect_timeout,
                "Timed out disconnecting from peer"
            ),
        }
    }
}
