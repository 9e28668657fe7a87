//! Completion provider abstraction.

pub mod box_provider;
pub mod client;
pub mod provider;
