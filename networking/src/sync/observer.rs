/// Import outcome reporting.
///
/// Observers only count; they never influence the sync.
use metrics::{Metrics, RESULT_IMPORTED, RESULT_REJECTED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported,
    Rejected,
}

impl ImportOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ImportOutcome::Imported => RESULT_IMPORTED,
            ImportOutcome::Rejected => RESULT_REJECTED,
        }
    }
}

pub trait SyncObserver: Send + Sync {
    fn on_block_import(&self, outcome: ImportOutcome);

    fn on_blobs_sidecar_import(&self, outcome: ImportOutcome);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_block_import(&self, _outcome: ImportOutcome) {}

    fn on_blobs_sidecar_import(&self, _outcome: ImportOutcome) {}
}

impl SyncObserver for Metrics {
    fn on_block_import(&self, outcome: ImportOutcome) {
        self.inc_block_import(outcome.label());
    }

    fn on_blobs_sidecar_import(&self, outcome: ImportOutcome) {
        self.inc_blobs_sidecar_import(outcome.label());
    }
}
