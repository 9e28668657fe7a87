//! Shared domain types for the identity coach engine.
//!
//! Everything here is plain data: no I/O, no async. The core and
//! infrastructure crates build on these types.

pub mod action;
pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod llm;
pub mod record;
pub mod state;
