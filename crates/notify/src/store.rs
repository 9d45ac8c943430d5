//! Keyed store for notifier settings, scoped by organization.
//!
//! Notifiers only read from the store at build time; see
//! [`crate::loader::NotifierLoader`].

use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::settings::NotifierSettings;

/// Organization that owns notifier records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    pub id: i64,
    /// Unique display name, used for lookups.
    pub name: String,
}

/// A persisted notifier settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSetting {
    pub id: i64,
    pub org_id: i64,
    /// Disabled records are never built into notifiers.
    pub enabled: bool,
    /// Starts at 1, incremented by every successful update.
    pub version: i64,
    pub settings: NotifierSettings,
}

/// Replace a record's settings, guarded by optimistic versioning.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSettingCmd {
    pub id: i64,
    pub org_id: i64,
    pub enabled: bool,
    /// Version the caller last read.
    pub version: i64,
    pub settings: NotifierSettings,
}

/// Keyed CRUD access to notifier settings.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch record `id` within `org_id`. `Ok(None)` when absent.
    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<StoredSetting>, StoreError>;

    /// Returns the updated record with its new version.
    ///
    /// # Errors
    ///
    /// `NotFound` if the record does not exist; `VersionConflict` if
    /// `cmd.version` is not the stored version.
    async fn update(&self, cmd: UpdateSettingCmd) -> Result<StoredSetting, StoreError>;

    /// Find an organization by exact name.
    async fn get_org_by_name(&self, name: &str) -> Result<Option<Org>, StoreError>;
}

/// In-memory store, for single-process hosts and tests.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    orgs: RwLock<Vec<Org>>,
    records: RwLock<HashMap<(i64, i64), StoredSetting>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an organization.
    pub async fn add_org(&self, org: Org) {
        self.orgs.write().await.push(org);
    }

    /// Insert a record as version 1, replacing any record with the same key.
    pub async fn insert(&self, org_id: i64, id: i64, enabled: bool, settings: NotifierSettings) {
        let record = StoredSetting {
            id,
            org_id,
            enabled,
            version: 1,
            settings,
        };
        self.records.write().await.insert((org_id, id), record);
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_by_id(&self, org_id: i64, id: i64) -> Result<Option<StoredSetting>, StoreError> {
        Ok(self.records.read().await.get(&(org_id, id)).cloned())
    }

    async fn update(&self, cmd: UpdateSettingCmd) -> Result<StoredSetting, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&(cmd.org_id, cmd.id))
            .ok_or(StoreError::NotFound(cmd.id))?;

        if record.version != cmd.version {
            return Err(StoreError::VersionConflict {
                id: cmd.id,
                expected: cmd.version,
                found: record.version,
            });
        }

        record.enabled = cmd.enabled;
        record.settings = cmd.settings;
        record.version += 1;

        tracing::debug!(
            id = cmd.id,
            org_id = cmd.org_id,
            version = record.version,
            "setting updated"
        );
        Ok(record.clone())
    }

    async fn get_org_by_name(&self, name: &str) -> Result<Option<Org>, StoreError> {
        Ok(self
            .orgs
            .read()
            .await
            .iter()
            .find(|o| o.name == name)
            .cloned())
    }
}
