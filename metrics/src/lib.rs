use anyhow::Result;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub const RESULT_IMPORTED: &str = "imported";
pub const RESULT_REJECTED: &str = "rejected";

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    // Sync
    block_imports: IntCounterVec,
    blobs_sidecar_imports: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let block_imports = IntCounterVec::new(
            Opts::new("beacon_block_import_total", "The number of block imports performed"),
            &["result"],
        )?;
        registry.register(Box::new(block_imports.clone()))?;

        let blobs_sidecar_imports = IntCounterVec::new(
            Opts::new(
                "beacon_blobs_sidecar_import_total",
                "The number of blobs sidecar imports performed",
            ),
            &["result"],
        )?;
        registry.register(Box::new(blobs_sidecar_imports.clone()))?;

        Ok(Self {
            registry,
            block_imports,
            blobs_sidecar_imports,
        })
    }

    pub fn gather(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn inc_block_import(&self, result: &str) {
        self.block_imports.with_label_values(&[result]).inc();
    }

    pub fn inc_blobs_sidecar_import(&self, result: &str) {
        self.blobs_sidecar_imports.with_label_values(&[result]).inc();
    }

    pub fn block_import_count(&self, result: &str) -> u64 {
        self.block_imports.with_label_values(&[result]).get()
    }

    pub fn blobs_sidecar_import_count(&self, result: &str) -> u64 {
        self.blobs_sidecar_imports.with_label_values(&[result]).get()
    }
}

pub type SharedMetrics = Arc<Metrics>;
