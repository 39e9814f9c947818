//! # Domain Layer
//!
//! Policy of the block log: configuration, errors, cancellation and the
//! index reconstruction strategies.
//!
//! ## Modules
//!
//! - `config` - `BlockLogConfig` and derived file paths
//! - `errors` - `StorageError` and the crate `Result`
//! - `interrupt` - Cooperative cancellation of long-running rebuilds
//! - `rebuild` - Forward replay and backward extraction

pub mod config;
pub mod errors;
pub mod interrupt;
pub mod rebuild;
