use std::sync::OnceLock;

use shuttle_runtime::SecretStore;

use crate::config::{self, AppConfig};
use crate::error::{BotError, BotResult};
use crate::services::ServiceRegistry;
use crate::storage::StorageManager;

static APP_STATE: OnceLock<AppState> = OnceLock::new();

#[derive(Clone)]
pub struct AppState {
    pub services: ServiceRegistry,
}

impl AppState {
    pub async fn init(secret_store: &SecretStore) -> BotResult<()> {
        let config = config::build_config(secret_store)?;
        AppConfig::set_global(config)?;

        let config = AppConfig::get()?;

        let redis_url = config.dialogue.use_redis.then(|| config.dialogue.redis_url.as_str());
        StorageManager::init(&config.storage.turso_url, &config.storage.turso_token, redis_url).await?;

        let storage = StorageManager::get()?;
        let services = ServiceRegistry::new(config, storage.turso().clone());

        APP_STATE
            .set(AppState { services })
            .map_err(|_| BotError::AppStateError("Failed to set global app state".to_string()))
    }

    pub fn get() -> BotResult<&'static AppState> {
        APP_STATE
            .get()
            .ok_or_else(|| BotError::AppStateError("App state not initialized".to_string()))
    }
}

#[cfg(test)]
impl AppState {
    /// Test instances run against a local database file and never touch the
    /// global Turso/Redis clients.
    pub async fn init_test() -> BotResult<()> {
        if APP_STATE.get().is_some() {
            return Ok(());
        }

        let config = AppConfig::new_test_config();
        let _ = AppConfig::set_global(config);

        let turso = crate::utils::test::test_turso().await;
        let services = ServiceRegistry::new(AppConfig::get()?, turso);

        let _ = APP_STATE.set(AppState { services });

        Ok(())
    }
}
