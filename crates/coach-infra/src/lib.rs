//! Infrastructure layer for the coach engine.
//!
//! Contains implementations of the ports defined in `coach-core`: the SQLite
//! repository, the OpenAI-compatible completion provider, and loading of
//! `config.toml` from the data directory.

pub mod config;
pub mod factory;
pub mod llm;
pub mod sqlite;
