use libsql::errors::Error as TursoError;
use libsql::{Builder, Connection, Database};
use std::sync::{Arc, OnceLock};

use super::StorageError;

pub static TURSO_CLIENT: OnceLock<TursoClient> = OnceLock::new();

#[derive(Clone)]
pub struct TursoClient {
    inner: Arc<Database>,
}

impl TursoClient {
    pub async fn init(url: &str, token: &str) -> Result<(), StorageError> {
        if TURSO_CLIENT.get().is_some() {
            info!("TursoClient already initialized");
            return Ok(());
        }

        info!("Initializing TursoClient...");
        let db = Arc::new(
            Builder::new_remote(url.to_string(), token.to_string())
                .build()
                .await?,
        );

        let client = Self { inner: db };
        super::schema::init_schema(&client).await?;

        info!("TursoClient initialized");
        TURSO_CLIENT.set(client).map_err(|_| {
            StorageError::Turso(TursoError::ConnectionFailed(
                "Failed to set global Turso client".to_string(),
            ))
        })?;

        Ok(())
    }

    /// Standalone client over a local database file. Used by tests, which
    /// must not touch the global instance.
    pub async fn new_local(path: &str) -> Result<Self, StorageError> {
        let db = Arc::new(Builder::new_local(path).build().await?);
        let client = Self { inner: db };
        super::schema::init_schema(&client).await?;
        Ok(client)
    }

    pub fn get() -> Result<&'static TursoClient, StorageError> {
        TURSO_CLIENT.get().ok_or_else(|| {
            StorageError::Turso(TursoError::ConnectionFailed("Turso client not initialized".to_string()))
        })
    }

    pub async fn get_connection(&self) -> Result<Connection, StorageError> {
        let conn = self.inner.connect()?;
        Ok(conn)
    }
}
