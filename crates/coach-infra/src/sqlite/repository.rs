//! SQLite implementation of the coach `Repository`.
//!
//! One table per record kind. Scalar columns are plain text so filters are
//! exact string comparisons, matching the in-memory backend. Structured
//! values (messages, user data) are stored as JSON text.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use coach_core::repository::Repository;
use coach_types::error::RepositoryError;
use coach_types::record::{
    ContextRecord, Filters, IdentityRecord, Record, RecordKey, RecordKind, StateRecord,
    UpdateValues, UserRecord,
};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `Repository`.
pub struct SqliteRepository {
    pool: DatabasePool,
}

impl SqliteRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Table layout
// ---------------------------------------------------------------------------

fn table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::State => "states",
        RecordKind::Context => "contexts",
        RecordKind::Identity => "identities",
        RecordKind::User => "users",
    }
}

/// Primary key order, which is also the listing order.
fn key_columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::State | RecordKind::Context => &["user_id", "session_id"],
        RecordKind::Identity => &["user_id", "id"],
        RecordKind::User => &["id"],
    }
}

fn key_values(key: &RecordKey) -> Vec<String> {
    match key {
        RecordKey::State {
            user_id,
            session_id,
        }
        | RecordKey::Context {
            user_id,
            session_id,
        } => vec![user_id.clone(), session_id.clone()],
        RecordKey::Identity { user_id, id } => vec![user_id.clone(), id.to_string()],
        RecordKey::User { id } => vec![id.clone()],
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str, column: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(s)
        .map_err(|e| RepositoryError::Serialization(format!("invalid JSON in {column}: {e}")))
}

fn get_str(row: &SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get(column).map_err(query_err)
}

fn record_from_row(kind: RecordKind, row: &SqliteRow) -> Result<Record, RepositoryError> {
    let created_at = parse_datetime(&get_str(row, "created_at")?)?;
    let updated_at = parse_datetime(&get_str(row, "updated_at")?)?;

    let record = match kind {
        RecordKind::State => Record::State(StateRecord {
            user_id: get_str(row, "user_id")?,
            session_id: get_str(row, "session_id")?,
            state: get_str(row, "state")?
                .parse()
                .map_err(|e| RepositoryError::Query(format!("invalid state: {e}")))?,
            created_at,
            updated_at,
        }),
        RecordKind::Context => Record::Context(ContextRecord {
            user_id: get_str(row, "user_id")?,
            session_id: get_str(row, "session_id")?,
            messages: from_json(&get_str(row, "messages")?, "messages")?,
            user_data: from_json(&get_str(row, "user_data")?, "user_data")?,
            created_at,
            updated_at,
        }),
        RecordKind::Identity => Record::Identity(IdentityRecord {
            id: Uuid::parse_str(&get_str(row, "id")?)
                .map_err(|e| RepositoryError::Query(format!("invalid identity id: {e}")))?,
            user_id: get_str(row, "user_id")?,
            name: get_str(row, "name")?,
            category: get_str(row, "category")?
                .parse()
                .map_err(|e| RepositoryError::Query(format!("invalid category: {e}")))?,
            description: get_str(row, "description")?,
            created_at,
            updated_at,
        }),
        RecordKind::User => Record::User(UserRecord {
            id: get_str(row, "id")?,
            data: from_json(&get_str(row, "data")?, "data")?,
            created_at,
            updated_at,
        }),
    };
    Ok(record)
}

async fn fetch(
    conn: &mut SqliteConnection,
    key: &RecordKey,
) -> Result<Option<Record>, RepositoryError> {
    let kind = key.kind();
    let predicate = key_columns(kind)
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!("SELECT * FROM {} WHERE {predicate}", table(kind));

    let mut query = sqlx::query(&sql);
    for value in key_values(key) {
        query = query.bind(value);
    }
    let row = query.fetch_optional(&mut *conn).await.map_err(query_err)?;
    row.map(|row| record_from_row(kind, &row)).transpose()
}

/// Insert or overwrite. Returns the `created_at` the row ends up with.
async fn upsert(
    conn: &mut SqliteConnection,
    record: &Record,
    now: &str,
) -> Result<String, RepositoryError> {
    let row = match record {
        Record::State(r) => sqlx::query(
            r#"INSERT INTO states (user_id, session_id, state, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (user_id, session_id) DO UPDATE SET
                   state = excluded.state, updated_at = excluded.updated_at
               RETURNING created_at"#,
        )
        .bind(&r.user_id)
        .bind(&r.session_id)
        .bind(r.state.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await,

        Record::Context(r) => sqlx::query(
            r#"INSERT INTO contexts (user_id, session_id, messages, user_data, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (user_id, session_id) DO UPDATE SET
                   messages = excluded.messages, user_data = excluded.user_data,
                   updated_at = excluded.updated_at
               RETURNING created_at"#,
        )
        .bind(&r.user_id)
        .bind(&r.session_id)
        .bind(to_json(&r.messages)?)
        .bind(to_json(&r.user_data)?)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await,

        Record::Identity(r) => sqlx::query(
            r#"INSERT INTO identities (id, user_id, name, category, description, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (user_id, id) DO UPDATE SET
                   name = excluded.name,
                   category = excluded.category, description = excluded.description,
                   updated_at = excluded.updated_at
               RETURNING created_at"#,
        )
        .bind(r.id.to_string())
        .bind(&r.user_id)
        .bind(&r.name)
        .bind(r.category.as_str())
        .bind(&r.description)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await,

        Record::User(r) => sqlx::query(
            r#"INSERT INTO users (id, data, created_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (id) DO UPDATE SET
                   data = excluded.data, updated_at = excluded.updated_at
               RETURNING created_at"#,
        )
        .bind(&r.id)
        .bind(to_json(&r.data)?)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await,
    }
    .map_err(query_err)?;

    get_str(&row, "created_at")
}

// ---------------------------------------------------------------------------
// Repository implementation
// ---------------------------------------------------------------------------

impl Repository for SqliteRepository {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, RepositoryError> {
        let mut conn = self.pool.reader.acquire().await.map_err(query_err)?;
        fetch(&mut conn, key).await
    }

    async fn get_all(
        &self,
        kind: RecordKind,
        filters: &Filters,
    ) -> Result<Vec<Record>, RepositoryError> {
        // Column names are interpolated only after being checked against the
        // kind's filterable fields.
        kind.check_filters(filters)?;

        let mut sql = format!("SELECT * FROM {}", table(kind));
        if !filters.is_empty() {
            let predicate = filters
                .keys()
                .map(|c| format!("{c} = ?"))
                .collect::<Vec<_>>()
                .join(" AND ");
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&key_columns(kind).join(", "));

        let mut query = sqlx::query(&sql);
        for value in filters.values() {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter().map(|row| record_from_row(kind, row)).collect()
    }

    async fn save(&self, record: Record) -> Result<Record, RepositoryError> {
        let now = Utc::now();
        let mut conn = self.pool.writer.acquire().await.map_err(query_err)?;
        let created_at = upsert(&mut conn, &record, &format_datetime(&now)).await?;
        Ok(record.with_timestamps(parse_datetime(&created_at)?, now))
    }

    async fn delete(&self, key: &RecordKey) -> Result<bool, RepositoryError> {
        let kind = key.kind();
        let predicate = key_columns(kind)
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("DELETE FROM {} WHERE {predicate}", table(kind));

        let mut query = sqlx::query(&sql);
        for value in key_values(key) {
            query = query.bind(value);
        }
        let result = query
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update(
        &self,
        key: &RecordKey,
        values: &UpdateValues,
    ) -> Result<Record, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let current = fetch(&mut tx, key).await?.ok_or(RepositoryError::NotFound)?;
        let updated = current.apply_update(values)?;
        let now = Utc::now();
        let created_at = upsert(&mut tx, &updated, &format_datetime(&now)).await?;

        tx.commit().await.map_err(query_err)?;
        Ok(updated.with_timestamps(parse_datetime(&created_at)?, now))
    }
}
