mod yookassa;

pub use yookassa::{CreatedPayment, WebhookNotification, WebhookPayment, YookassaClient};

use chrono::{DateTime, Duration, Utc};
use libsql::{params, Connection};
use rust_i18n::t;

use crate::config::PackagesConfig;
use crate::error::BotResult;
use crate::storage::{format_timestamp, parse_timestamp, StorageError, TursoClient};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unknown package: {0}")]
    UnknownPackage(String),
    #[error("Payment not found")]
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProvider {
    Stars,
    Yookassa,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stars => "stars",
            PaymentProvider::Yookassa => "yookassa",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    fn parse(raw: &str) -> Self {
        match raw {
            "succeeded" => PaymentStatus::Succeeded,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    Fifty,
    Hundred,
    Subscription,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Fifty => "requests_50",
            PackageType::Hundred => "requests_100",
            PackageType::Subscription => "subscription",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PaymentError> {
        match raw {
            "requests_50" => Ok(PackageType::Fifty),
            "requests_100" => Ok(PackageType::Hundred),
            "subscription" => Ok(PackageType::Subscription),
            other => Err(PaymentError::UnknownPackage(other.to_string())),
        }
    }
}

/// Catalog item, derived from configuration and never persisted.
#[derive(Debug, Clone)]
pub struct Package {
    pub package_type: PackageType,
    pub requests: u32,
    pub price_stars: u32,
    /// Kopecks, as YooKassa wants them.
    pub price_rub: u64,
}

impl Package {
    pub fn name(&self) -> String {
        match self.package_type {
            PackageType::Fifty => t!("packages.fifty").to_string(),
            PackageType::Hundred => t!("packages.hundred").to_string(),
            PackageType::Subscription => t!("packages.subscription").to_string(),
        }
    }

    pub fn is_subscription(&self) -> bool {
        self.package_type == PackageType::Subscription
    }

    pub fn price_rub_display(&self) -> String {
        format!("{:.0}", self.price_rub as f64 / 100.0)
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: i64,
    pub user_id: i64,
    pub amount: u64,
    pub currency: String,
    pub provider: String,
    pub status: PaymentStatus,
    pub package_type: PackageType,
    pub requests_amount: u32,
    pub provider_payment_id: Option<String>,
}

/// What a successful finalize did, so the caller can word the confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    AlreadyProcessed,
    CreditsGranted { telegram_id: u64, requests: u32 },
    SubscriptionExtended { telegram_id: u64, until: DateTime<Utc> },
}

#[derive(Clone)]
pub struct PaymentService {
    turso: TursoClient,
    packages: PackagesConfig,
}

impl PaymentService {
    pub fn new(turso: TursoClient, packages: PackagesConfig) -> Self {
        Self { turso, packages }
    }

    pub fn packages(&self) -> Vec<Package> {
        vec![
            Package {
                package_type: PackageType::Fifty,
                requests: 50,
                price_stars: self.packages.fifty_stars,
                price_rub: self.packages.fifty_rub,
            },
            Package {
                package_type: PackageType::Hundred,
                requests: 100,
                price_stars: self.packages.hundred_stars,
                price_rub: self.packages.hundred_rub,
            },
            Package {
                package_type: PackageType::Subscription,
                requests: 0,
                price_stars: self.packages.subscription_stars,
                price_rub: self.packages.subscription_rub,
            },
        ]
    }

    pub fn package_by_type(&self, package_type: PackageType) -> Package {
        self.packages()
            .into_iter()
            .find(|p| p.package_type == package_type)
            .expect("catalog covers every package type")
    }

    /// Creates a pending payment row for a checkout.
    pub async fn create_payment(
        &self,
        telegram_id: u64,
        package_type: PackageType,
        provider: PaymentProvider,
    ) -> BotResult<PaymentRecord> {
        let conn = self.turso.get_connection().await?;
        let user_id = self.user_id(&conn, telegram_id).await?;

        let package = self.package_by_type(package_type);
        let (amount, currency) = match provider {
            PaymentProvider::Stars => (package.price_stars as u64, "XTR"),
            PaymentProvider::Yookassa => (package.price_rub, "RUB"),
        };

        let mut rows = conn
            .query(
                "INSERT INTO payments (user_id, amount, currency, provider, status, package_type, requests_amount) \
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6) RETURNING id",
                params![
                    user_id,
                    amount as i64,
                    currency,
                    provider.as_str(),
                    package_type.as_str(),
                    package.requests as i64
                ],
            )
            .await
            .map_err(StorageError::from)?;

        let id = match rows.next().await.map_err(StorageError::from)? {
            Some(row) => row.get::<i64>(0).map_err(StorageError::from)?,
            None => return Err(StorageError::MalformedRow("INSERT did not return an id".to_string()).into()),
        };

        Ok(PaymentRecord {
            id,
            user_id,
            amount,
            currency: currency.to_string(),
            provider: provider.as_str().to_string(),
            status: PaymentStatus::Pending,
            package_type,
            requests_amount: package.requests,
            provider_payment_id: None,
        })
    }

    pub async fn attach_provider_payment_id(&self, payment_id: i64, provider_payment_id: &str) -> BotResult<()> {
        let conn = self.turso.get_connection().await?;
        conn.execute(
            "UPDATE payments SET provider_payment_id = ?2 WHERE id = ?1",
            params![payment_id, provider_payment_id],
        )
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    pub async fn get_payment(&self, payment_id: i64) -> BotResult<Option<PaymentRecord>> {
        let conn = self.turso.get_connection().await?;
        self.load_payment(&conn, "id = ?1", params![payment_id]).await
    }

    pub async fn find_by_provider_id(&self, provider_payment_id: &str) -> BotResult<Option<PaymentRecord>> {
        let conn = self.turso.get_connection().await?;
        self.load_payment(&conn, "provider_payment_id = ?1", params![provider_payment_id])
            .await
    }

    /// Finalizes a payment exactly once. The `status = 'pending'` guard in
    /// the UPDATE makes duplicate deliveries (webhook retries, the
    /// client-side callback racing the webhook) a clean no-op.
    pub async fn finalize_success(&self, payment_id: i64, telegram_charge_id: Option<&str>) -> BotResult<FinalizeOutcome> {
        self.finalize_success_at(payment_id, telegram_charge_id, Utc::now()).await
    }

    pub async fn finalize_success_at(
        &self,
        payment_id: i64,
        telegram_charge_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> BotResult<FinalizeOutcome> {
        let conn = self.turso.get_connection().await?;

        let Some(payment) = self.load_payment(&conn, "id = ?1", params![payment_id]).await? else {
            return Err(PaymentError::NotFound.into());
        };

        let tx = conn.transaction().await.map_err(StorageError::from)?;

        let claimed = tx
            .execute(
                "UPDATE payments SET status = 'succeeded', telegram_charge_id = COALESCE(?2, telegram_charge_id) \
                 WHERE id = ?1 AND status = 'pending'",
                params![payment_id, telegram_charge_id],
            )
            .await
            .map_err(StorageError::from)?;

        if claimed == 0 {
            // Terminal already; whoever got here first did the granting.
            return Ok(FinalizeOutcome::AlreadyProcessed);
        }

        let telegram_id = self.telegram_id(&tx, payment.user_id).await?;

        let outcome = if payment.package_type == PackageType::Subscription {
            let until = self.extend_subscription(&tx, payment.user_id, payment.id, now).await?;
            FinalizeOutcome::SubscriptionExtended { telegram_id, until }
        } else {
            tx.execute(
                "UPDATE users SET bonus_requests = bonus_requests + ?2 WHERE id = ?1",
                params![payment.user_id, payment.requests_amount as i64],
            )
            .await
            .map_err(StorageError::from)?;
            FinalizeOutcome::CreditsGranted {
                telegram_id,
                requests: payment.requests_amount,
            }
        };

        tx.commit().await.map_err(StorageError::from)?;

        Ok(outcome)
    }

    pub async fn finalize_failure(&self, payment_id: i64) -> BotResult<bool> {
        let conn = self.turso.get_connection().await?;
        let changed = conn
            .execute(
                "UPDATE payments SET status = 'failed' WHERE id = ?1 AND status = 'pending'",
                params![payment_id],
            )
            .await
            .map_err(StorageError::from)?;
        Ok(changed > 0)
    }

    /// Maintenance pass: marks subscriptions past their expiry inactive.
    /// Entitlement never trusts `is_active` alone, so this is bookkeeping,
    /// not a correctness requirement.
    pub async fn sweep_expired_subscriptions(&self) -> BotResult<u64> {
        let conn = self.turso.get_connection().await?;
        let swept = conn
            .execute(
                "UPDATE subscriptions SET is_active = 0 WHERE is_active = 1 AND expires_at <= ?1",
                params![format_timestamp(Utc::now())],
            )
            .await
            .map_err(StorageError::from)?;
        Ok(swept)
    }

    async fn extend_subscription(
        &self,
        conn: &Connection,
        user_id: i64,
        payment_id: i64,
        now: DateTime<Utc>,
    ) -> BotResult<DateTime<Utc>> {
        let mut rows = conn
            .query(
                "SELECT id, expires_at FROM subscriptions \
                 WHERE user_id = ?1 AND is_active = 1 AND expires_at > ?2 \
                 ORDER BY expires_at DESC LIMIT 1",
                params![user_id, format_timestamp(now)],
            )
            .await
            .map_err(StorageError::from)?;

        let days = Duration::days(self.packages.subscription_days);

        if let Some(row) = rows.next().await.map_err(StorageError::from)? {
            let subscription_id = row.get::<i64>(0).map_err(StorageError::from)?;
            let expires_at = parse_timestamp(&row.get::<String>(1).map_err(StorageError::from)?)?;
            let until = expires_at + days;

            conn.execute(
                "UPDATE subscriptions SET expires_at = ?2 WHERE id = ?1",
                params![subscription_id, format_timestamp(until)],
            )
            .await
            .map_err(StorageError::from)?;

            Ok(until)
        } else {
            let until = now + days;
            conn.execute(
                "INSERT INTO subscriptions (user_id, payment_id, is_active, expires_at) VALUES (?1, ?2, 1, ?3)",
                params![user_id, payment_id, format_timestamp(until)],
            )
            .await
            .map_err(StorageError::from)?;

            Ok(until)
        }
    }

    async fn user_id(&self, conn: &Connection, telegram_id: u64) -> BotResult<i64> {
        let mut rows = conn
            .query(
                "SELECT id FROM users WHERE telegram_id = ?1 LIMIT 1",
                params![telegram_id as i64],
            )
            .await
            .map_err(StorageError::from)?;

        match rows.next().await.map_err(StorageError::from)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(StorageError::from)?),
            None => Err(anyhow::anyhow!("No account for telegram id {telegram_id}").into()),
        }
    }

    async fn telegram_id(&self, conn: &Connection, user_id: i64) -> BotResult<u64> {
        let mut rows = conn
            .query("SELECT telegram_id FROM users WHERE id = ?1 LIMIT 1", params![user_id])
            .await
            .map_err(StorageError::from)?;

        match rows.next().await.map_err(StorageError::from)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(StorageError::from)? as u64),
            None => Err(anyhow::anyhow!("No account row {user_id}").into()),
        }
    }

    async fn load_payment(
        &self,
        conn: &Connection,
        predicate: &str,
        predicate_params: impl libsql::params::IntoParams,
    ) -> BotResult<Option<PaymentRecord>> {
        let sql = format!(
            "SELECT id, user_id, amount, currency, provider, status, package_type, requests_amount, \
             provider_payment_id FROM payments WHERE {predicate} LIMIT 1"
        );

        let mut rows = conn.query(&sql, predicate_params).await.map_err(StorageError::from)?;

        let Some(row) = rows.next().await.map_err(StorageError::from)? else {
            return Ok(None);
        };

        let status = PaymentStatus::parse(&row.get::<String>(5).map_err(StorageError::from)?);
        let package_type = PackageType::parse(&row.get::<String>(6).map_err(StorageError::from)?)?;

        Ok(Some(PaymentRecord {
            id: row.get::<i64>(0).map_err(StorageError::from)?,
            user_id: row.get::<i64>(1).map_err(StorageError::from)?,
            amount: row.get::<i64>(2).map_err(StorageError::from)? as u64,
            currency: row.get::<String>(3).map_err(StorageError::from)?,
            provider: row.get::<String>(4).map_err(StorageError::from)?,
            status,
            package_type,
            requests_amount: row.get::<i64>(7).map_err(StorageError::from)? as u32,
            provider_payment_id: row.get::<Option<String>>(8).map_err(StorageError::from)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::user::UserService;
    use crate::utils::test::test_turso;
    use chrono::TimeZone;

    async fn test_services() -> (PaymentService, UserService) {
        let config = AppConfig::new_test_config();
        let turso = test_turso().await;
        (
            PaymentService::new(turso.clone(), config.packages),
            UserService::new(turso, config.quota),
        )
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn catalog_matches_configuration() {
        let (payments, _) = test_services().await;
        let packages = payments.packages();

        assert_eq!(packages.len(), 3);
        assert_eq!(packages[0].requests, 50);
        assert_eq!(packages[0].price_stars, 75);
        assert_eq!(packages[1].requests, 100);
        assert_eq!(packages[2].requests, 0, "subscription grants no discrete credits");
        assert!(packages[2].is_subscription());
        assert_eq!(packages[0].price_rub_display(), "149");
    }

    #[tokio::test]
    async fn finalize_grants_credits_exactly_once() {
        let (payments, users) = test_services().await;
        users.ensure_account(100, None, "Mallory", None).await.unwrap();

        let payment = payments
            .create_payment(100, PackageType::Fifty, PaymentProvider::Stars)
            .await
            .unwrap();
        assert_eq!(payment.amount, 75);
        assert_eq!(payment.currency, "XTR");

        let outcome = payments.finalize_success(payment.id, Some("charge-1")).await.unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::CreditsGranted {
                telegram_id: 100,
                requests: 50
            }
        );

        // Duplicate delivery is a no-op, not an error.
        let outcome = payments.finalize_success(payment.id, Some("charge-1")).await.unwrap();
        assert_eq!(outcome, FinalizeOutcome::AlreadyProcessed);

        let account = users.get_account(100).await.unwrap().unwrap();
        assert_eq!(account.bonus_requests, 50);
    }

    #[tokio::test]
    async fn subscription_purchase_creates_then_extends() {
        let (payments, users) = test_services().await;
        users.ensure_account(101, None, "Nina", None).await.unwrap();
        let now = at(2026, 2, 10);

        let first = payments
            .create_payment(101, PackageType::Subscription, PaymentProvider::Yookassa)
            .await
            .unwrap();
        let outcome = payments.finalize_success_at(first.id, None, now).await.unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::SubscriptionExtended {
                telegram_id: 101,
                until: now + Duration::days(30)
            }
        );

        // Renewal while still active extends the existing row.
        let second = payments
            .create_payment(101, PackageType::Subscription, PaymentProvider::Yookassa)
            .await
            .unwrap();
        let outcome = payments
            .finalize_success_at(second.id, None, now + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::SubscriptionExtended {
                telegram_id: 101,
                until: now + Duration::days(60)
            }
        );
    }

    #[tokio::test]
    async fn failed_payment_is_terminal() {
        let (payments, users) = test_services().await;
        users.ensure_account(102, None, "Oscar", None).await.unwrap();

        let payment = payments
            .create_payment(102, PackageType::Hundred, PaymentProvider::Yookassa)
            .await
            .unwrap();

        assert!(payments.finalize_failure(payment.id).await.unwrap());

        // A success notification arriving after the failure must not grant.
        let outcome = payments.finalize_success(payment.id, None).await.unwrap();
        assert_eq!(outcome, FinalizeOutcome::AlreadyProcessed);

        let account = users.get_account(102).await.unwrap().unwrap();
        assert_eq!(account.bonus_requests, 0);
    }

    #[tokio::test]
    async fn lookup_by_provider_id() {
        let (payments, users) = test_services().await;
        users.ensure_account(103, None, "Pat", None).await.unwrap();

        let payment = payments
            .create_payment(103, PackageType::Fifty, PaymentProvider::Yookassa)
            .await
            .unwrap();
        payments
            .attach_provider_payment_id(payment.id, "yk-abc-123")
            .await
            .unwrap();

        let found = payments.find_by_provider_id("yk-abc-123").await.unwrap().unwrap();
        assert_eq!(found.id, payment.id);
        assert_eq!(found.status, PaymentStatus::Pending);
        assert!(payments.find_by_provider_id("yk-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_deactivates_expired_rows() {
        let (payments, users) = test_services().await;
        users.ensure_account(104, None, "Quinn", None).await.unwrap();

        let payment = payments
            .create_payment(104, PackageType::Subscription, PaymentProvider::Stars)
            .await
            .unwrap();
        // Expired long ago.
        payments
            .finalize_success_at(payment.id, None, at(2020, 1, 1))
            .await
            .unwrap();

        let swept = payments.sweep_expired_subscriptions().await.unwrap();
        assert_eq!(swept, 1);
        assert_eq!(payments.sweep_expired_subscriptions().await.unwrap(), 0);
    }
}
