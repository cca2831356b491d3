use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chain::DEVNET_CONFIG;
use containers::{
    BlobsSidecar, Block, Bytes32, Checkpoint, Epoch, SignedBlock, Slot, Status, ValidatorIndex,
};
use futures::{StreamExt as _, stream};
use libp2p_identity::PeerId;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::sync::{
    BlobsSidecarManager, BlockImporter, ChainState, FailureReason, PeerConnection, PeerSync,
    PeerSyncConfig, ResponseStream, RpcError,
};
use crate::types::GoodbyeReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    SidecarStored(Slot),
    BlockImported(Slot),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn create_test_block(slot: u64, parent_root: Bytes32) -> SignedBlock {
    SignedBlock {
        message: Block {
            slot: Slot(slot),
            proposer_index: ValidatorIndex(slot % 64),
            parent_root,
            state_root: Bytes32::default(),
            body_root: Bytes32::default(),
        },
        signature: vec![],
    }
}

/// Blocks at every slot in `first..=last`, each the parent of the next.
pub fn create_chain(first: u64, last: u64) -> Vec<SignedBlock> {
    let mut parent_root = Bytes32::default();
    (first..=last)
        .map(|slot| {
            let block = create_test_block(slot, parent_root);
            parent_root = block.root();
            block
        })
        .collect()
}

pub fn sidecar_for(block: &SignedBlock) -> BlobsSidecar {
    BlobsSidecar::for_block(block.slot(), block.root())
}

pub fn peer_status(finalized_epoch: u64, head_slot: u64) -> Status {
    Status::new(
        Checkpoint::new(Epoch(finalized_epoch), Bytes32::default()),
        Bytes32::default(),
        Slot(head_slot),
    )
}

pub struct MockPeer {
    pub id: PeerId,
    pub status: Status,
    pub blocks: BTreeMap<Slot, SignedBlock>,
    /// Upper bound on blocks (and sidecars) returned per request.
    pub max_blocks_per_response: Option<u64>,
    /// Per-request block caps, consumed in order before falling back to
    /// `max_blocks_per_response`.
    pub response_caps: Mutex<VecDeque<u64>>,
    pub block_error: Option<fn() -> RpcError>,
    pub serve_sidecars_reversed: bool,
    pub omit_sidecar_at: Option<Slot>,
    /// Appended to every sidecar response, whatever the requested range.
    pub extra_sidecar: Option<BlobsSidecar>,
    pub response_delay: Duration,
    pub disconnect_delay: Duration,
    pub disconnect_fails: bool,
    pub block_requests: Mutex<Vec<(Slot, u64)>>,
    pub blobs_requests: Mutex<Vec<(Slot, u64)>>,
    pub disconnects: Mutex<Vec<GoodbyeReason>>,
}

impl MockPeer {
    pub fn new(status: Status, blocks: Vec<SignedBlock>) -> Self {
        Self {
            id: PeerId::random(),
            status,
            blocks: blocks.into_iter().map(|block| (block.slot(), block)).collect(),
            max_blocks_per_response: None,
            response_caps: Mutex::new(VecDeque::new()),
            block_error: None,
            serve_sidecars_reversed: false,
            omit_sidecar_at: None,
            extra_sidecar: None,
            response_delay: Duration::ZERO,
            disconnect_delay: Duration::ZERO,
            disconnect_fails: false,
            block_requests: Mutex::new(vec![]),
            blobs_requests: Mutex::new(vec![]),
            disconnects: Mutex::new(vec![]),
        }
    }

    /// A peer serving blocks at every slot from 1 to its head.
    pub fn with_full_chain(status: Status) -> Self {
        let head = status.head_slot.0;
        Self::new(status, create_chain(1, head))
    }

    pub fn block_request_count(&self) -> usize {
        self.block_requests.lock().len()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.lock().len()
    }

    fn blocks_in_range(&self, start_slot: Slot, count: u64, cap: Option<u64>) -> Vec<SignedBlock> {
        let limit = cap.unwrap_or(u64::MAX) as usize;
        self.blocks
            .range(start_slot..start_slot.plus(count))
            .map(|(_, block)| block.clone())
            .take(limit)
            .collect()
    }

    fn delayed<T: Send + 'static>(&self, items: Vec<Result<T, RpcError>>) -> ResponseStream<T> {
        let delay = self.response_delay;
        stream::once(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            stream::iter(items)
        })
        .flatten()
        .boxed()
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn request_blocks_by_range(&self, start_slot: Slot, count: u64) -> ResponseStream<SignedBlock> {
        self.block_requests.lock().push((start_slot, count));

        if let Some(error) = self.block_error {
            return self.delayed(vec![Err(error())]);
        }

        let cap = self
            .response_caps
            .lock()
            .pop_front()
            .or(self.max_blocks_per_response);

        let items = self
            .blocks_in_range(start_slot, count, cap)
            .into_iter()
            .map(Ok)
            .collect();
        self.delayed(items)
    }

    fn request_blobs_sidecars_by_range(
        &self,
        start_slot: Slot,
        count: u64,
    ) -> ResponseStream<BlobsSidecar> {
        self.blobs_requests.lock().push((start_slot, count));

        let mut sidecars: Vec<_> = self
            .blocks_in_range(start_slot, count, self.max_blocks_per_response)
            .iter()
            .filter(|block| Some(block.slot()) != self.omit_sidecar_at)
            .map(sidecar_for)
            .collect();

        if self.serve_sidecars_reversed {
            sidecars.reverse();
        }

        sidecars.extend(self.extra_sidecar.clone());

        self.delayed(sidecars.into_iter().map(Ok).collect())
    }

    async fn disconnect(&self, reason: GoodbyeReason) -> Result<()> {
        self.disconnects.lock().push(reason);
        if !self.disconnect_delay.is_zero() {
            tokio::time::sleep(self.disconnect_delay).await;
        }
        if self.disconnect_fails {
            bail!("connection already closed");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockChain {
    pub finalized_epoch: Epoch,
    pub head_slot: Slot,
    pub known_roots: HashSet<Bytes32>,
    pub contains_all: bool,
}

impl ChainState for MockChain {
    fn finalized_epoch(&self) -> Epoch {
        self.finalized_epoch
    }

    fn head_slot(&self) -> Slot {
        self.head_slot
    }

    fn contains_block(&self, root: &Bytes32) -> bool {
        self.contains_all || self.known_roots.contains(root)
    }
}

pub struct MockImporter {
    pub events: EventLog,
    pub failure: Option<(Slot, FailureReason)>,
    /// Signals the first notify after the first import, then waits on the second.
    pub pause_after_first_import: Option<(Arc<Notify>, Arc<Notify>)>,
    pub imported: Mutex<Vec<Slot>>,
}

#[async_trait]
impl BlockImporter for MockImporter {
    async fn import_block(&self, block: SignedBlock) -> Result<(), FailureReason> {
        let slot = block.slot();

        if let Some((failing_slot, reason)) = self.failure {
            if slot == failing_slot {
                return Err(reason);
            }
        }

        self.imported.lock().push(slot);
        self.events.lock().push(Event::BlockImported(slot));

        let imported_count = self.imported.lock().len();
        if let Some((reached, resume)) = &self.pause_after_first_import {
            if imported_count == 1 {
                reached.notify_one();
                resume.notified().await;
            }
        }

        Ok(())
    }
}

pub struct MockBlobsSidecarManager {
    pub events: EventLog,
    pub required_from: Option<Slot>,
    pub fail_store: bool,
    pub queried: Mutex<Vec<Slot>>,
    pub stored: Mutex<Vec<Slot>>,
}

impl MockBlobsSidecarManager {
    pub fn requiring_from(required_from: Option<Slot>) -> Self {
        Self {
            events: Arc::new(Mutex::new(vec![])),
            required_from,
            fail_store: false,
            queried: Mutex::new(vec![]),
            stored: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl BlobsSidecarManager for MockBlobsSidecarManager {
    fn is_storage_of_blobs_sidecar_required(&self, slot: Slot) -> bool {
        self.queried.lock().push(slot);
        self.required_from.is_some_and(|from| slot >= from)
    }

    async fn store_unconfirmed_blobs_sidecar(&self, sidecar: BlobsSidecar) -> Result<()> {
        if self.fail_store {
            bail!("blob storage unavailable");
        }
        self.stored.lock().push(sidecar.beacon_block_slot);
        self.events
            .lock()
            .push(Event::SidecarStored(sidecar.beacon_block_slot));
        Ok(())
    }
}

pub type TestPeerSync = PeerSync<MockChain, MockImporter, MockBlobsSidecarManager>;

pub struct TestContext {
    pub events: EventLog,
    pub importer: Arc<MockImporter>,
    pub blobs: Arc<MockBlobsSidecarManager>,
    pub sync: TestPeerSync,
}

impl TestContext {
    pub fn new(chain: MockChain) -> Self {
        Self::build(chain, |_| {}, |_| {})
    }

    pub fn build(
        chain: MockChain,
        configure_importer: impl FnOnce(&mut MockImporter),
        configure_blobs: impl FnOnce(&mut MockBlobsSidecarManager),
    ) -> Self {
        Self::build_with_config(
            chain,
            PeerSyncConfig::default().with_inter_round_pacing(Duration::ZERO),
            configure_importer,
            configure_blobs,
        )
    }

    pub fn build_with_config(
        chain: MockChain,
        config: PeerSyncConfig,
        configure_importer: impl FnOnce(&mut MockImporter),
        configure_blobs: impl FnOnce(&mut MockBlobsSidecarManager),
    ) -> Self {
        let events: EventLog = Arc::new(Mutex::new(vec![]));

        let mut importer = MockImporter {
            events: events.clone(),
            failure: None,
            pause_after_first_import: None,
            imported: Mutex::new(vec![]),
        };
        configure_importer(&mut importer);

        let mut blobs = MockBlobsSidecarManager {
            events: events.clone(),
            ..MockBlobsSidecarManager::requiring_from(None)
        };
        configure_blobs(&mut blobs);

        let importer = Arc::new(importer);
        let blobs = Arc::new(blobs);
        let sync = PeerSync::new(
            Arc::new(chain),
            importer.clone(),
            blobs.clone(),
            DEVNET_CONFIG,
            config,
        );

        Self {
            events,
            importer,
            blobs,
            sync,
        }
    }

    pub fn imported_slots(&self) -> Vec<u64> {
        self.importer.imported.lock().iter().map(|slot| slot.0).collect()
    }
}
