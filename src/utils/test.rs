use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Mutex;

use crate::storage::TursoClient;

/// Handler-level tests share global state (config, app state), so they run
/// one at a time.
pub static TEST_MUTEX: Mutex<()> = Mutex::const_new(());

static DB_SEQ: AtomicU32 = AtomicU32::new(0);

/// Fresh local database file per call; each test gets its own schema.
pub async fn test_turso() -> TursoClient {
    let seq = DB_SEQ.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("eduhelper-test-{}-{seq}.db", std::process::id()));

    TursoClient::new_local(path.to_str().expect("temp path is valid utf-8"))
        .await
        .expect("local test database")
}
