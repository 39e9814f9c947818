use std::fmt;
use std::time::Duration;

// =============================================================================
// REBUILD STRATEGY
// =============================================================================

/// How a full index rebuild walks the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStrategy {
    /// Deserialize every block from the start (or resume point) onwards.
    ForwardReplay,
    /// Walk trailing offsets backwards through a memory-mapped log.
    BackwardExtraction,
}

impl RebuildStrategy {
    /// Strategy compiled into this build (feature `backward-index`).
    pub const fn configured() -> Self {
        if cfg!(feature = "backward-index") {
            RebuildStrategy::BackwardExtraction
        } else {
            RebuildStrategy::ForwardReplay
        }
    }
}

impl fmt::Display for RebuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildStrategy::ForwardReplay => write!(f, "forward replay"),
            RebuildStrategy::BackwardExtraction => write!(f, "backward extraction"),
        }
    }
}

// =============================================================================
// REBUILD REPORT
// =============================================================================

/// Outcome of one index reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Strategy that built the position index.
    pub strategy: RebuildStrategy,
    /// Whether existing index prefixes were kept.
    pub resumed: bool,
    /// Log offset the pass started reading at.
    pub start_position: u64,
    /// Blocks written to the indexes by this pass.
    pub blocks_indexed: u64,
    /// Number of the last block written, 0 if none.
    pub last_block_num: u32,
    /// Log offset of the last block written.
    pub last_position: u64,
    /// Stopped early on request; indexes are a valid prefix.
    pub interrupted: bool,
    /// Wall time of the pass in milliseconds.
    pub duration_ms: u64,
}

impl RebuildReport {
    /// Empty report for a pass starting at `start_position`.
    pub fn new(strategy: RebuildStrategy, resumed: bool, start_position: u64) -> Self {
        Self {
            strategy,
            resumed,
            start_position,
            blocks_indexed: 0,
            last_block_num: 0,
            last_position: 0,
            interrupted: false,
            duration_ms: 0,
        }
    }

    /// Record one indexed block.
    pub fn add_block(&mut self, block_num: u32, position: u64) {
        self.blocks_indexed += 1;
        self.last_block_num = block_num;
        self.last_position = position;
    }

    /// Record the elapsed time.
    pub fn finish(&mut self, elapsed: Duration) {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Whether the indexes now cover the whole log.
    pub fn is_complete(&self) -> bool {
        !self.interrupted
    }
}
