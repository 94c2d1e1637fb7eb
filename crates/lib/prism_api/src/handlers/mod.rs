//! Request handlers.

pub mod health;
pub mod share;
pub mod vault;
