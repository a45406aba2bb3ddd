mod error;
mod redis;
mod schema;
mod turso;

pub use error::StorageError;
pub use redis::RedisClient;
pub use turso::TursoClient;

use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Clone)]
pub struct StorageManager {
    turso: TursoClient,
}

impl StorageManager {
    pub async fn init(turso_url: &str, turso_token: &str, redis_url: Option<&str>) -> Result<(), StorageError> {
        TursoClient::init(turso_url, turso_token).await?;

        if let Some(url) = redis_url {
            RedisClient::init(url).await?;
        }

        Ok(())
    }

    pub fn get() -> Result<Self, StorageError> {
        let turso = TursoClient::get()?.clone();

        Ok(Self { turso })
    }

    pub fn turso(&self) -> &TursoClient {
        &self.turso
    }
}

/// Timestamps are stored as second-precision RFC 3339 UTC strings
/// ("2026-02-01T10:30:00Z"). The fixed width keeps lexicographic string
/// comparison in SQL consistent with chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::MalformedRow(format!("bad timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_roundtrip_and_ordering() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        let a = format_timestamp(earlier);
        let b = format_timestamp(later);

        assert!(a < b);
        assert_eq!(parse_timestamp(&a).unwrap(), earlier);
        assert_eq!(parse_timestamp(&b).unwrap(), later);
    }
}
