//! In-memory repository backed by a concurrent map.
//!
//! Records are stored as immutable values keyed by their composite primary
//! key. Every write replaces the whole value at its key.

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use coach_types::error::RepositoryError;
use coach_types::record::{Filters, Record, RecordKey, RecordKind, UpdateValues};

use super::Repository;

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: DashMap<RecordKey, Record>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Repository for InMemoryRepository {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, RepositoryError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn get_all(
        &self,
        kind: RecordKind,
        filters: &Filters,
    ) -> Result<Vec<Record>, RepositoryError> {
        kind.check_filters(filters)?;

        let mut matched = Vec::new();
        for entry in self.records.iter() {
            if entry.key().kind() != kind {
                continue;
            }
            if entry.value().matches(filters)? {
                matched.push(entry.value().clone());
            }
        }
        matched.sort_by_key(|r| r.key());
        Ok(matched)
    }

    async fn save(&self, record: Record) -> Result<Record, RepositoryError> {
        let now = Utc::now();
        let key = record.key();
        let stored = match self.records.entry(key) {
            Entry::Occupied(mut entry) => {
                let created_at = entry.get().created_at();
                let stored = record.with_timestamps(created_at, now);
                entry.insert(stored.clone());
                stored
            }
            Entry::Vacant(entry) => {
                let stored = record.with_timestamps(now, now);
                entry.insert(stored.clone());
                stored
            }
        };
        Ok(stored)
    }

    async fn delete(&self, key: &RecordKey) -> Result<bool, RepositoryError> {
        Ok(self.records.remove(key).is_some())
    }

    async fn update(
        &self,
        key: &RecordKey,
        values: &UpdateValues,
    ) -> Result<Record, RepositoryError> {
        let mut entry = self
            .records
            .get_mut(key)
            .ok_or(RepositoryError::NotFound)?;
        let updated = entry.value().apply_update(values)?;
        let created_at = entry.value().created_at();
        let updated = updated.with_timestamps(created_at, Utc::now());
        *entry.value_mut() = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_types::identity::IdentityCategory;
    use coach_types::record::{IdentityRecord, StateRecord};
    use coach_types::state::CoachingState;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_get_state() {
        let repo = InMemoryRepository::new();
        repo.save_state(StateRecord::new("u1", "s1", CoachingState::ActionPlanning))
            .await
            .unwrap();

        let state = repo.get_state("u1", "s1").await.unwrap().unwrap();
        assert_eq!(state.state, CoachingState::ActionPlanning);
        assert!(repo.get_state("u1", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_preserves_created_at_and_refreshes_updated_at() {
        let repo = InMemoryRepository::new();
        let first = repo
            .save(Record::State(StateRecord::new("u1", "s1", CoachingState::Introduction)))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = repo
            .save(Record::State(StateRecord::new(
                "u1",
                "s1",
                CoachingState::IdentityBrainstorming,
            )))
            .await
            .unwrap();

        assert_eq!(first.created_at(), second.created_at());
        assert!(second.updated_at() > first.updated_at());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_get_all_filters_by_kind_and_field() {
        let repo = InMemoryRepository::new();
        repo.save_state(StateRecord::new("u1", "s1", CoachingState::Introduction))
            .await
            .unwrap();
        repo.save_state(StateRecord::new("u1", "s2", CoachingState::ActionPlanning))
            .await
            .unwrap();
        repo.save_state(StateRecord::new("u2", "s1", CoachingState::ActionPlanning))
            .await
            .unwrap();
        repo.save_identity(IdentityRecord::new(
            "u1",
            "Builder",
            IdentityCategory::DoerOfThings,
            "I am a builder",
        ))
        .await
        .unwrap();

        let mut filters = Filters::new();
        filters.insert("state".to_string(), "action_planning".to_string());
        let planning = repo.get_all(RecordKind::State, &filters).await.unwrap();
        assert_eq!(planning.len(), 2);

        assert_eq!(repo.sessions_for_user("u1").await.unwrap(), vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_get_all_unknown_field_is_error() {
        let repo = InMemoryRepository::new();
        let mut filters = Filters::new();
        filters.insert("messages".to_string(), "[]".to_string());
        let err = repo
            .get_all(RecordKind::Context, &filters)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownField { .. }));
    }

    #[tokio::test]
    async fn test_update_missing_key_is_not_found() {
        let repo = InMemoryRepository::new();
        let mut values = UpdateValues::new();
        values.insert("state".to_string(), json!("accountability"));
        let err = repo
            .update(&RecordKey::state("u1", "s1"), &values)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_update_replaces_value() {
        let repo = InMemoryRepository::new();
        let identity = IdentityRecord::new(
            "u1",
            "Builder",
            IdentityCategory::DoerOfThings,
            "I am a builder",
        );
        let key = RecordKey::identity("u1", identity.id);
        repo.save_identity(identity).await.unwrap();

        let mut values = UpdateValues::new();
        values.insert("description".to_string(), json!("I am a master builder"));
        repo.update(&key, &values).await.unwrap();

        let ids = repo.list_identities("u1").await.unwrap();
        assert_eq!(ids[0].description, "I am a master builder");
    }

    #[tokio::test]
    async fn test_update_user_data_creates_user() {
        let repo = InMemoryRepository::new();
        repo.update_user_data("u1", "name", json!("Ada"))
            .await
            .unwrap();
        repo.update_user_data("u1", "city", json!("Paris"))
            .await
            .unwrap();

        let user = repo.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.data["name"], "Ada");
        assert_eq!(user.data["city"], "Paris");
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryRepository::new();
        repo.save_state(StateRecord::new("u1", "s1", CoachingState::Introduction))
            .await
            .unwrap();
        assert!(repo.delete(&RecordKey::state("u1", "s1")).await.unwrap());
        assert!(!repo.delete(&RecordKey::state("u1", "s1")).await.unwrap());
        assert!(repo.is_empty());
    }
}
