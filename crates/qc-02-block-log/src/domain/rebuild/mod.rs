//! # Index Reconstruction
//!
//! Strategies that rebuild the block log indexes from the log itself.
//!
//! - `forward` - Deserialize blocks in order; resumable and interruptible
//! - `backward` - Walk trailing offsets of a memory-mapped log; full
//!   position-index rebuilds only
//!
//! The strategy used for full rebuilds is chosen at build time through the
//! `backward-index` feature, see `RebuildStrategy::configured`.

mod backward;
mod forward;
mod report;

#[cfg(test)]
mod tests;

pub use backward::backward_extract;
pub use forward::{forward_replay, resume_point, ReplaySource, ResumePoint};
pub use report::{RebuildReport, RebuildStrategy};
