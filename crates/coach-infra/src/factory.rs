//! Backend selection.
//!
//! `Repository` uses RPITIT and is not object safe, so the configured backend
//! is wrapped in an enum that forwards every call.

use std::path::Path;

use coach_core::repository::Repository;
use coach_core::repository::in_memory::InMemoryRepository;
use coach_types::config::{CoachConfig, StorageBackend};
use coach_types::error::RepositoryError;
use coach_types::record::{Filters, Record, RecordKey, RecordKind, UpdateValues};

use crate::sqlite::pool::{DatabasePool, default_database_url};
use crate::sqlite::repository::SqliteRepository;

pub enum AnyRepository {
    InMemory(InMemoryRepository),
    Sqlite(SqliteRepository),
}

impl AnyRepository {
    pub fn backend(&self) -> StorageBackend {
        match self {
            AnyRepository::InMemory(_) => StorageBackend::InMemory,
            AnyRepository::Sqlite(_) => StorageBackend::Sql,
        }
    }
}

/// Build the repository named by `config.storage`.
///
/// The SQL backend uses `storage.database_url` or `{data_dir}/coach.db`.
#[tracing::instrument(skip(config), fields(backend = ?config.storage.backend))]
pub async fn build_repository(
    config: &CoachConfig,
    data_dir: &Path,
) -> Result<AnyRepository, RepositoryError> {
    match config.storage.backend {
        StorageBackend::InMemory => {
            tracing::debug!("using in-memory repository");
            Ok(AnyRepository::InMemory(InMemoryRepository::new()))
        }
        StorageBackend::Sql => {
            let url = match &config.storage.database_url {
                Some(url) => url.clone(),
                None => {
                    tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
                        RepositoryError::Query(format!(
                            "cannot create {}: {e}",
                            data_dir.display()
                        ))
                    })?;
                    default_database_url(data_dir)
                }
            };
            let pool = DatabasePool::new(&url).await.map_err(|e| {
                tracing::error!(%url, error = %e, "failed to open database");
                RepositoryError::Connection
            })?;
            Ok(AnyRepository::Sqlite(SqliteRepository::new(pool)))
        }
    }
}

impl Repository for AnyRepository {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, RepositoryError> {
        match self {
            AnyRepository::InMemory(r) => r.get(key).await,
            AnyRepository::Sqlite(r) => r.get(key).await,
        }
    }

    async fn get_all(
        &self,
        kind: RecordKind,
        filters: &Filters,
    ) -> Result<Vec<Record>, RepositoryError> {
        match self {
            AnyRepository::InMemory(r) => r.get_all(kind, filters).await,
            AnyRepository::Sqlite(r) => r.get_all(kind, filters).await,
        }
    }

    async fn save(&self, record: Record) -> Result<Record, RepositoryError> {
        match self {
            AnyRepository::InMemory(r) => r.save(record).await,
            AnyRepository::Sqlite(r) => r.save(record).await,
        }
    }

    async fn delete(&self, key: &RecordKey) -> Result<bool, RepositoryError> {
        match self {
            AnyRepository::InMemory(r) => r.delete(key).await,
            AnyRepository::Sqlite(r) => r.delete(key).await,
        }
    }

    async fn update(
        &self,
        key: &RecordKey,
        values: &UpdateValues,
    ) -> Result<Record, RepositoryError> {
        match self {
            AnyRepository::InMemory(r) => r.update(key, values).await,
            AnyRepository::Sqlite(r) => r.update(key, values).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_is_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let repo = build_repository(&CoachConfig::default(), dir.path())
            .await
            .unwrap();
        assert_eq!(repo.backend(), StorageBackend::InMemory);
    }

    #[tokio::test]
    async fn test_sql_backend_creates_database_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let mut config = CoachConfig::default();
        config.storage.backend = StorageBackend::Sql;

        let repo = build_repository(&config, &data_dir).await.unwrap();
        assert_eq!(repo.backend(), StorageBackend::Sql);
        assert!(data_dir.join("coach.db").exists());
    }
}
