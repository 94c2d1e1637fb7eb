//! # prism_core
//!
//! Core domain logic for Prism.
//!
//! - [`store`]: document-store abstraction with live subscriptions.
//! - [`session`]: QR handoff and shared-link session protocol.
//! - [`storage`]: primary blob storage for vault files.
//! - [`vault`]: vault access control and storage failover.

pub mod models;
pub mod session;
pub mod storage;
pub mod store;
pub mod vault;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
