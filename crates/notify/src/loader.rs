//! Builds notifiers from records held in a [`SettingsStore`].

use std::sync::Arc;

use crate::error::LoadError;
use crate::notifier::ChannelNotifier;
use crate::registry::Registry;
use crate::secrets::SecretResolver;
use crate::store::SettingsStore;

pub struct NotifierLoader {
    store: Arc<dyn SettingsStore>,
    registry: Arc<Registry>,
    resolver: SecretResolver,
}

impl NotifierLoader {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        registry: Arc<Registry>,
        resolver: SecretResolver,
    ) -> Self {
        Self {
            store,
            registry,
            resolver,
        }
    }

    /// Look up notifier `id` within the named organization and build it.
    ///
    /// Disabled records are refused rather than built.
    pub async fn load(&self, org_name: &str, id: i64) -> Result<ChannelNotifier, LoadError> {
        let org = self
            .store
            .get_org_by_name(org_name)
            .await?
            .ok_or_else(|| LoadError::OrgNotFound(org_name.to_string()))?;

        let record = self
            .store
            .get_by_id(org.id, id)
            .await?
            .ok_or(LoadError::NotFound(id))?;

        if !record.enabled {
            return Err(LoadError::Disabled(id));
        }

        let notifier = self.registry.build_from(&record.settings, &self.resolver)?;
        tracing::info!(
            org = %org.name,
            id,
            version = record.version,
            kind = %record.settings.kind,
            "Loaded notifier"
        );
        Ok(notifier)
    }
}

impl std::fmt::Debug for NotifierLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierLoader")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
