//! Storage-facing record projections.
//!
//! Records are immutable values. Backends store them whole and replace them
//! whole; a partial update produces a new record via [`Record::apply_update`].
//! Enum fields are written as their scalar wire value and parsed back on read.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::ChatMessage;
use crate::error::RepositoryError;
use crate::identity::IdentityCategory;
use crate::state::CoachingState;

/// Exact-match filters: scalar column name to expected value.
pub type Filters = BTreeMap<String, String>;

/// Partial update: non-key field name to new value.
pub type UpdateValues = serde_json::Map<String, serde_json::Value>;

/// The four record families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    State,
    Context,
    Identity,
    User,
}

impl RecordKind {
    /// Scalar columns usable in `get_all` filters.
    pub fn filterable_fields(self) -> &'static [&'static str] {
        match self {
            RecordKind::State => &["user_id", "session_id", "state"],
            RecordKind::Context => &["user_id", "session_id"],
            RecordKind::Identity => &["id", "user_id", "name", "category"],
            RecordKind::User => &["id"],
        }
    }

    /// Non-key columns accepted by `update`.
    pub fn updatable_fields(self) -> &'static [&'static str] {
        match self {
            RecordKind::State => &["state"],
            RecordKind::Context => &["messages", "user_data"],
            RecordKind::Identity => &["name", "category", "description"],
            RecordKind::User => &["data"],
        }
    }

    /// Fail with `UnknownField` unless every filter names a scalar column.
    pub fn check_filters(self, filters: &Filters) -> Result<(), RepositoryError> {
        match filters
            .keys()
            .find(|f| !self.filterable_fields().contains(&f.as_str()))
        {
            Some(field) => Err(RepositoryError::UnknownField {
                kind: self.to_string(),
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::State => write!(f, "state"),
            RecordKind::Context => write!(f, "context"),
            RecordKind::Identity => write!(f, "identity"),
            RecordKind::User => write!(f, "user"),
        }
    }
}

/// Composite primary key. The variant carries the record kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    State { user_id: String, session_id: String },
    Context { user_id: String, session_id: String },
    Identity { user_id: String, id: Uuid },
    User { id: String },
}

impl RecordKey {
    pub fn state(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        RecordKey::State {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    pub fn context(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        RecordKey::Context {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    pub fn identity(user_id: impl Into<String>, id: Uuid) -> Self {
        RecordKey::Identity {
            user_id: user_id.into(),
            id,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        RecordKey::User { id: id.into() }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            RecordKey::State { .. } => RecordKind::State,
            RecordKey::Context { .. } => RecordKind::Context,
            RecordKey::Identity { .. } => RecordKind::Identity,
            RecordKey::User { .. } => RecordKind::User,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::State {
                user_id,
                session_id,
            }
            | RecordKey::Context {
                user_id,
                session_id,
            } => write!(f, "{}:{user_id}:{session_id}", self.kind()),
            RecordKey::Identity { user_id, id } => write!(f, "identity:{user_id}:{id}"),
            RecordKey::User { id } => write!(f, "user:{id}"),
        }
    }
}

/// Workflow position of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub user_id: String,
    pub session_id: String,
    pub state: CoachingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversation history plus serialized session data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub user_id: String,
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    /// JSON object with `consolidated_summary`, `user_profile` and `metadata`.
    pub user_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An identity persisted independently of any session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub category: IdentityCategory,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Free-form user facts, shared across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        state: CoachingState,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            state,
            created_at: now,
            updated_at: now,
        }
    }
}

impl IdentityRecord {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        category: IdentityCategory,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            name: name.into(),
            category,
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Any persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    State(StateRecord),
    Context(ContextRecord),
    Identity(IdentityRecord),
    User(UserRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::State(_) => RecordKind::State,
            Record::Context(_) => RecordKind::Context,
            Record::Identity(_) => RecordKind::Identity,
            Record::User(_) => RecordKind::User,
        }
    }

    pub fn key(&self) -> RecordKey {
        match self {
            Record::State(r) => RecordKey::state(&r.user_id, &r.session_id),
            Record::Context(r) => RecordKey::context(&r.user_id, &r.session_id),
            Record::Identity(r) => RecordKey::identity(&r.user_id, r.id),
            Record::User(r) => RecordKey::user(&r.id),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::State(r) => r.created_at,
            Record::Context(r) => r.created_at,
            Record::Identity(r) => r.created_at,
            Record::User(r) => r.created_at,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Record::State(r) => r.updated_at,
            Record::Context(r) => r.updated_at,
            Record::Identity(r) => r.updated_at,
            Record::User(r) => r.updated_at,
        }
    }

    /// Same record with the given timestamps.
    pub fn with_timestamps(self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        match self {
            Record::State(r) => Record::State(StateRecord {
                created_at,
                updated_at,
                ..r
            }),
            Record::Context(r) => Record::Context(ContextRecord {
                created_at,
                updated_at,
                ..r
            }),
            Record::Identity(r) => Record::Identity(IdentityRecord {
                created_at,
                updated_at,
                ..r
            }),
            Record::User(r) => Record::User(UserRecord {
                created_at,
                updated_at,
                ..r
            }),
        }
    }

    /// Scalar value of a filterable column, as stored.
    pub fn field(&self, name: &str) -> Result<String, RepositoryError> {
        let value = match (self, name) {
            (Record::State(r), "user_id") => r.user_id.clone(),
            (Record::State(r), "session_id") => r.session_id.clone(),
            (Record::State(r), "state") => r.state.to_string(),
            (Record::Context(r), "user_id") => r.user_id.clone(),
            (Record::Context(r), "session_id") => r.session_id.clone(),
            (Record::Identity(r), "id") => r.id.to_string(),
            (Record::Identity(r), "user_id") => r.user_id.clone(),
            (Record::Identity(r), "name") => r.name.clone(),
            (Record::Identity(r), "category") => r.category.to_string(),
            (Record::User(r), "id") => r.id.clone(),
            (record, field) => {
                return Err(RepositoryError::UnknownField {
                    kind: record.kind().to_string(),
                    field: field.to_string(),
                });
            }
        };
        Ok(value)
    }

    /// True when every filter matches exactly.
    pub fn matches(&self, filters: &Filters) -> Result<bool, RepositoryError> {
        for (field, expected) in filters {
            if self.field(field)? != *expected {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// New record with the named non-key fields replaced.
    ///
    /// Timestamps are left as-is; the repository refreshes `updated_at`.
    pub fn apply_update(&self, values: &UpdateValues) -> Result<Record, RepositoryError> {
        let kind = self.kind();
        if let Some(field) = values
            .keys()
            .find(|f| !kind.updatable_fields().contains(&f.as_str()))
        {
            return Err(RepositoryError::UnknownField {
                kind: kind.to_string(),
                field: field.clone(),
            });
        }

        let mut json = serde_json::to_value(self)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        if let serde_json::Value::Object(map) = &mut json {
            for (field, value) in values {
                map.insert(field.clone(), value.clone());
            }
        }
        serde_json::from_value(json).map_err(|e| RepositoryError::Serialization(e.to_string()))
    }
}
