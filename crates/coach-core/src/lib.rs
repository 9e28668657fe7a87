//! Business logic and repository trait definitions for the coach engine.
//!
//! This crate defines the "ports" (repository and completion provider
//! traits) that the infrastructure layer implements. It depends only on
//! `coach-types`, never on `coach-infra` or any database/IO crate.

pub mod action;
pub mod context;
pub mod llm;
pub mod prompt;
pub mod repository;
pub mod service;
pub mod state_machine;

#[cfg(test)]
pub(crate) mod testing;
