pub mod blobs_sidecar;
pub mod block;
pub mod checkpoint;
pub mod slot;
pub mod status;
pub mod types;

pub use blobs_sidecar::BlobsSidecar;
pub use block::{Block, SignedBlock};
pub use checkpoint::Checkpoint;
pub use slot::{Epoch, Slot};
pub use status::Status;
pub use types::{Bytes32, ValidatorIndex};
