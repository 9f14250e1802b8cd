use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use rinkside_auth::{ProfilePatch, ProfileRecord, ProfileStore, StoreError};
use rinkside_core::UserId;

/// In-memory profile table for tests/dev.
///
/// Keyed by user id, like the hosted table. [`Self::set_available`] can take
/// the store "offline" so callers see `StoreError::Unavailable`.
#[derive(Debug)]
pub struct InMemoryProfileStore {
    rows: RwLock<HashMap<UserId, ProfileRecord>>,
    outage: RwLock<Option<String>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            outage: RwLock::new(None),
        }
    }

    /// Insert or replace a row without any checks.
    pub fn seed(&self, record: ProfileRecord) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(record.id, record);
        }
    }

    /// Current row for `id`, read synchronously.
    pub fn get(&self, id: UserId) -> Option<ProfileRecord> {
        let rows = self.rows.read().ok()?;
        rows.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Toggle a simulated outage.
    pub fn set_available(&self, available: bool) {
        if let Ok(mut outage) = self.outage.write() {
            *outage = (!available).then(|| "simulated outage".to_string());
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let outage = self
            .outage
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        match outage.as_ref() {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_key(&self, id: UserId) -> Result<Option<ProfileRecord>, StoreError> {
        self.check_available()?;
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        Ok(rows.get(&id).cloned())
    }

    async fn insert(&self, record: ProfileRecord) -> Result<(), StoreError> {
        self.check_available()?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        if rows.contains_key(&record.id) {
            return Err(StoreError::Conflict(record.id.to_string()));
        }
        tracing::debug!(user_id = %record.id, role = %record.role, "profile row inserted");
        rows.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, id: UserId, patch: &ProfilePatch) -> Result<ProfileRecord, StoreError> {
        self.check_available()?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        let row = rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        let mut updated = row.clone();
        updated.apply_patch(patch, Utc::now())?;
        *row = updated.clone();

        tracing::debug!(user_id = %id, complete = updated.is_complete(), "profile row updated");
        Ok(updated)
    }
}
