use std::fmt::{self, Display};

/// Terminal outcome of syncing with a single peer.
///
/// Exactly one is produced per `PeerSync::sync` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerSyncResult {
    /// Imported everything the peer advertised and its finality checks out.
    SuccessfulSync,
    /// The sync was stopped locally.
    Cancelled,
    /// A block failed to import for a reason that does not implicate the peer.
    ImportFailed,
    /// The peer served a block that cannot be valid. The peer is disconnected.
    BadBlock,
    /// The peer sent a malformed or error response. The peer is disconnected.
    InvalidResponse,
    /// The peer kept returning too few slots per round.
    ExcessiveThrottling,
    /// The peer advertised finality it could not back with blocks.
    /// The peer is disconnected.
    FaultyAdvertisement,
}

impl PeerSyncResult {
    pub fn name(&self) -> &'static str {
        match self {
            PeerSyncResult::SuccessfulSync => "SUCCESSFUL_SYNC",
            PeerSyncResult::Cancelled => "CANCELLED",
            PeerSyncResult::ImportFailed => "IMPORT_FAILED",
            PeerSyncResult::BadBlock => "BAD_BLOCK",
            PeerSyncResult::InvalidResponse => "INVALID_RESPONSE",
            PeerSyncResult::ExcessiveThrottling => "EXCESSIVE_THROTTLING",
            PeerSyncResult::FaultyAdvertisement => "FAULTY_ADVERTISEMENT",
        }
    }
}

impl Display for PeerSyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
