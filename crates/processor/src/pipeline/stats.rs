//! Pipeline run statistics

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Counters for one pipeline, shared by every stage it builds
pub type SharedStats = Arc<RwLock<PipelineStats>>;

/// Statistics for a pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events received from the decoder
    pub events_in: u64,

    /// Finalized events emitted
    pub events_out: u64,

    /// Partitions opened by the splitter
    pub partitions_opened: u64,

    /// Temp-basal stop events synthesized
    pub temp_stops_synthesized: u64,

    /// Zero-duration temp basals dropped with no active temp
    pub orphan_stops_dropped: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zeroed, shareable instance
    pub fn shared() -> SharedStats {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn inc_events_in(&mut self) {
        self.events_in += 1;
    }

    pub fn inc_events_out(&mut self) {
        self.events_out += 1;
    }

    pub fn inc_partitions_opened(&mut self) {
        self.partitions_opened += 1;
    }

    pub fn inc_temp_stops_synthesized(&mut self) {
        self.temp_stops_synthesized += 1;
    }

    pub fn inc_orphan_stops_dropped(&mut self) {
        self.orphan_stops_dropped += 1;
    }

    /// Events that went in but did not come out
    ///
    /// Dropped orphan stops and replaced stop signals account for this.
    pub fn events_absorbed(&self) -> u64 {
        self.events_in.saturating_sub(self.events_out)
    }
}
