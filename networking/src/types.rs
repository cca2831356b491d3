use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Reason codes for the Goodbye request/response message.
///
/// Sent when gracefully disconnecting from a peer to indicate why
/// the connection is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum GoodbyeReason {
    /// Peer misbehaved: sent bad blocks, invalid responses or advertised
    /// a chain it cannot serve.
    FaultOrError = 3,
}

impl GoodbyeReason {
    /// Get the u64 code for this reason.
    pub fn code(&self) -> u64 {
        *self as u64
    }
}

impl Display for GoodbyeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GoodbyeReason::FaultOrError => "fault_or_error",
        };
        f.write_str(name)
    }
}
