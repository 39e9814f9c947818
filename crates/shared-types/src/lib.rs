//! # Shared Types Crate
//!
//! Chain entities shared between the consensus pipeline and the block log.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the block shape the log persists is defined
//!   here, not in the storage crate.
//! - **Derived Identity**: a block's number and id are computed from its
//!   header, never stored alongside it.

pub mod entities;

pub use entities::*;
