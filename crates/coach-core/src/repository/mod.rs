//! Repository trait definition (port).
//!
//! One generic, key-addressed contract covers all four record kinds. The
//! infrastructure layer (coach-infra) supplies the SQL backend; the
//! in-memory backend lives here so the engine can run without storage.
//! Both must behave identically.

pub mod in_memory;

use coach_types::error::RepositoryError;
use coach_types::record::{
    ContextRecord, Filters, IdentityRecord, Record, RecordKey, RecordKind, StateRecord,
    UpdateValues, UserRecord,
};

/// Repository for all coach records.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
/// The first five methods are the storage contract; the rest are typed
/// conveniences built on top of them.
pub trait Repository: Send + Sync {
    /// Fetch a record by primary key.
    fn get(
        &self,
        key: &RecordKey,
    ) -> impl std::future::Future<Output = Result<Option<Record>, RepositoryError>> + Send;

    /// All records of a kind whose scalar columns equal every filter value.
    ///
    /// Filters naming a non-scalar or unknown column fail with
    /// `RepositoryError::UnknownField`.
    fn get_all(
        &self,
        kind: RecordKind,
        filters: &Filters,
    ) -> impl std::future::Future<Output = Result<Vec<Record>, RepositoryError>> + Send;

    /// Upsert by primary key. Keeps the stored `created_at` on overwrite and
    /// always refreshes `updated_at`. Returns the record as stored.
    fn save(
        &self,
        record: Record,
    ) -> impl std::future::Future<Output = Result<Record, RepositoryError>> + Send;

    /// Remove a record. Returns whether anything was deleted.
    fn delete(
        &self,
        key: &RecordKey,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Replace named non-key fields. `NotFound` when the key is absent.
    fn update(
        &self,
        key: &RecordKey,
        values: &UpdateValues,
    ) -> impl std::future::Future<Output = Result<Record, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Typed conveniences
    // -----------------------------------------------------------------------

    fn get_state(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<StateRecord>, RepositoryError>> + Send
    {
        async move {
            match self.get(&RecordKey::state(user_id, session_id)).await? {
                Some(Record::State(r)) => Ok(Some(r)),
                Some(other) => Err(kind_mismatch(RecordKind::State, &other)),
                None => Ok(None),
            }
        }
    }

    fn save_state(
        &self,
        record: StateRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        async move { self.save(Record::State(record)).await.map(|_| ()) }
    }

    fn get_context(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ContextRecord>, RepositoryError>> + Send
    {
        async move {
            match self.get(&RecordKey::context(user_id, session_id)).await? {
                Some(Record::Context(r)) => Ok(Some(r)),
                Some(other) => Err(kind_mismatch(RecordKind::Context, &other)),
                None => Ok(None),
            }
        }
    }

    fn save_context(
        &self,
        record: ContextRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        async move { self.save(Record::Context(record)).await.map(|_| ()) }
    }

    fn save_identity(
        &self,
        record: IdentityRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        async move { self.save(Record::Identity(record)).await.map(|_| ()) }
    }

    /// Identities persisted for a user, oldest first.
    fn list_identities(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<IdentityRecord>, RepositoryError>> + Send
    {
        async move {
            let mut filters = Filters::new();
            filters.insert("user_id".to_string(), user_id.to_string());
            let mut identities: Vec<IdentityRecord> = self
                .get_all(RecordKind::Identity, &filters)
                .await?
                .into_iter()
                .filter_map(|r| match r {
                    Record::Identity(i) => Some(i),
                    _ => None,
                })
                .collect();
            identities.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(identities)
        }
    }

    fn get_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserRecord>, RepositoryError>> + Send
    {
        async move {
            match self.get(&RecordKey::user(user_id)).await? {
                Some(Record::User(r)) => Ok(Some(r)),
                Some(other) => Err(kind_mismatch(RecordKind::User, &other)),
                None => Ok(None),
            }
        }
    }

    fn save_user(
        &self,
        record: UserRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        async move { self.save(Record::User(record)).await.map(|_| ()) }
    }

    /// Set one key in a user's data, creating the user record if absent.
    fn update_user_data(
        &self,
        user_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        async move {
            let mut user = self
                .get_user(user_id)
                .await?
                .unwrap_or_else(|| UserRecord::new(user_id));
            user.data.insert(key.to_string(), value);
            self.save_user(user).await
        }
    }

    /// Session ids with a state record for this user, sorted.
    fn sessions_for_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send {
        async move {
            let mut filters = Filters::new();
            filters.insert("user_id".to_string(), user_id.to_string());
            let mut sessions: Vec<String> = self
                .get_all(RecordKind::State, &filters)
                .await?
                .into_iter()
                .filter_map(|r| match r {
                    Record::State(s) => Some(s.session_id),
                    _ => None,
                })
                .collect();
            sessions.sort();
            Ok(sessions)
        }
    }
}

fn kind_mismatch(expected: RecordKind, got: &Record) -> RepositoryError {
    RepositoryError::Query(format!(
        "expected {expected} record, backend returned {}",
        got.kind()
    ))
}
