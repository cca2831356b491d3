use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chain::DEVNET_CONFIG;
use clap::Parser;
use containers::{Epoch, Slot};
use metrics::{Metrics, SharedMetrics};
use networking::sync::{ChainState as _, PeerSync, PeerSyncConfig};
use tracing::{info, warn};

mod simulation;

use simulation::{InMemoryBlobsSidecarStore, InMemoryChain, SimulatedPeer, build_chain};

/// Sync a local in-memory chain from a simulated peer.
#[derive(Parser, Debug)]
struct Args {
    /// Head slot advertised and served by the peer
    #[arg(long, default_value_t = 2048)]
    peer_head_slot: u64,

    /// Finalized epoch advertised by the peer
    #[arg(long, default_value_t = 0)]
    peer_finalized_epoch: u64,

    /// Finalized epoch of the local chain
    #[arg(long, default_value_t = 0)]
    local_finalized_epoch: u64,

    /// Highest slot of the peer's chain the local node already holds
    #[arg(long)]
    local_head_slot: Option<u64>,

    /// Largest number of blocks the peer returns per request
    #[arg(long)]
    max_blocks_per_response: Option<u64>,

    /// First slot whose block must come with a blobs sidecar
    #[arg(long)]
    first_blob_slot: Option<u64>,

    /// Minimum delay between two range requests, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pacing_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let chain_config = DEVNET_CONFIG;

    let blocks = build_chain(args.peer_head_slot);

    let local_finalized_epoch = Epoch(args.local_finalized_epoch);
    let local_head_slot = args.local_head_slot.unwrap_or(
        chain_config
            .compute_start_slot_at_epoch(local_finalized_epoch)
            .0,
    );
    let known_blocks = &blocks[..(local_head_slot.min(args.peer_head_slot) as usize)];
    let chain = Arc::new(InMemoryChain::new(local_finalized_epoch, known_blocks));

    let peer_finalized_epoch = Epoch(args.peer_finalized_epoch);
    let peer = SimulatedPeer::new(
        &blocks,
        peer_finalized_epoch,
        chain_config.compute_start_slot_at_epoch(peer_finalized_epoch),
        args.max_blocks_per_response,
    );

    let blobs_sidecar_store = Arc::new(InMemoryBlobsSidecarStore::new(
        args.first_blob_slot.map(Slot),
    ));
    let metrics: SharedMetrics = Arc::new(Metrics::new()?);

    let config =
        PeerSyncConfig::default().with_inter_round_pacing(Duration::from_millis(args.pacing_ms));
    let peer_sync = Arc::new(
        PeerSync::new(
            chain.clone(),
            chain.clone(),
            blobs_sidecar_store.clone(),
            chain_config,
            config,
        )
        .with_observer(metrics.clone()),
    );

    info!(
        peer_head_slot = args.peer_head_slot,
        local_head_slot, "Syncing from simulated peer"
    );

    let sync = peer_sync.sync(&peer);
    tokio::pin!(sync);

    let result = tokio::select! {
        result = &mut sync => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping sync");
            peer_sync.stop();
            sync.await?
        }
    };

    info!(
        result = %result,
        starting_slot = peer_sync.starting_slot().0,
        head_slot = chain.head_slot().0,
        blobs_sidecars = blobs_sidecar_store.stored_count(),
        disconnected = ?peer.disconnect_reason(),
        "Sync finished"
    );
    println!("{}", metrics.gather()?);

    Ok(())
}
