//! Domain models.
//!
//! These are the document shapes stored in the document store. Field names are
//! camelCase on the wire.

pub mod session;
pub mod vault;
