use thiserror::Error;

use crate::state::{CoachingState, TransitionCondition};

/// Errors from repository operations (used by trait definitions in coach-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unknown field '{field}' for {kind} records")]
    UnknownField { kind: String, field: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors from the transition table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("transition {from} -> {to} references unregistered condition '{condition}'")]
    UnknownCondition {
        from: CoachingState,
        to: CoachingState,
        condition: TransitionCondition,
    },

    #[error("cannot move from {from} to {to}: {reason}")]
    InvalidManualTransition {
        from: CoachingState,
        to: CoachingState,
        reason: String,
    },
}

/// Errors from loading or rendering prompt templates.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("no template for state '{state}' at {path}")]
    TemplateNotFound { state: CoachingState, path: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed template metadata for '{state}': {reason}")]
    InvalidMetadata { state: CoachingState, reason: String },

    #[error("malformed template for '{state}': {reason}")]
    InvalidTemplate { state: CoachingState, reason: String },

    #[error("missing required context keys for '{state}': {}", keys.join(", "))]
    MissingContextKeys {
        state: CoachingState,
        keys: Vec<String>,
    },
}
