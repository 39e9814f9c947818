//! # Ports Layer
//!
//! Defines the port traits for the Block Log subsystem.
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (read/append API exposed to chain and RPC layers)
//! - `outbound.rs` - Driven ports (block serialization supplied by the chain layer)

pub mod inbound;
pub mod outbound;
