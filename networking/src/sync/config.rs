/// Peer sync configuration constants.
///
/// Tuning parameters for the round-based range sync against a single peer.
use std::time::Duration;

/// Minimum number of slots a round must advance for the peer not to count
/// as throttling. Some slots may be empty, so progress is measured in slots
/// rather than returned blocks.
pub const MIN_SLOTS_PROGRESS_PER_ROUND: u64 = 50;

/// Consecutive throttled rounds tolerated before giving up on the peer.
pub const MAX_THROTTLED_ROUNDS: usize = 10;

/// Minimum spacing between the dispatch of two consecutive rounds.
pub const INTER_ROUND_PACING: Duration = Duration::from_secs(3);

/// The ancestor probe only runs when both sides hold at least this many
/// slots past the sync start.
pub const OPTIMISTIC_HISTORY_LENGTH: u64 = 3000;

/// Number of blocks fetched by the ancestor probe.
pub const ANCESTOR_PROBE_BLOCK_COUNT: u64 = 20;

/// Upper bound on waiting for a peer to acknowledge a disconnect before the
/// sync result is returned anyway.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerSyncConfig {
    pub min_slots_progress_per_round: u64,
    pub max_throttled_rounds: usize,
    pub inter_round_pacing: Duration,
    pub optimistic_history_length: u64,
    pub ancestor_probe_block_count: u64,
    pub disconnect_timeout: Duration,
}

impl Default for PeerSyncConfig {
    fn default() -> Self {
        Self {
            min_slots_progress_per_round: MIN_SLOTS_PROGRESS_PER_ROUND,
            max_throttled_rounds: MAX_THROTTLED_ROUNDS,
            inter_round_pacing: INTER_ROUND_PACING,
            optimistic_history_length: OPTIMISTIC_HISTORY_LENGTH,
            ancestor_probe_block_count: ANCESTOR_PROBE_BLOCK_COUNT,
            disconnect_timeout: DISCONNECT_TIMEOUT,
        }
    }
}

impl PeerSyncConfig {
    pub fn with_inter_round_pacing(mut self, pacing: Duration) -> Self {
        self.inter_round_pacing = pacing;
        self
    }
}
