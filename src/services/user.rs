use chrono::{DateTime, NaiveDate, Utc};
use libsql::{params, Connection};

use crate::config::QuotaConfig;
use crate::error::{BotResult};
use crate::services::task::{NewTaskRecord, QuotaSource};
use crate::storage::{format_timestamp, parse_timestamp, StorageError, TursoClient};

#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: i64,
    pub telegram_id: u64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub daily_requests: u32,
    pub bonus_requests: u32,
    pub custom_daily_limit: Option<u32>,
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub is_banned: bool,
    pub onboarding_completed: bool,
    pub last_request_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    Allowed(QuotaSource),
    Blocked(BlockReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockReason {
    UnknownUser,
    Banned,
    DailyLimitReached { used: u32, limit: u32 },
}

#[derive(Debug, Clone)]
pub struct UserStats {
    pub daily_used: u32,
    pub daily_limit: u32,
    pub bonus_requests: u32,
    pub total_requests: u64,
    pub total_tokens: u64,
    pub favorite_subject: Option<String>,
    pub subscription_until: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct UserService {
    turso: TursoClient,
    quota: QuotaConfig,
}

impl UserService {
    pub fn new(turso: TursoClient, quota: QuotaConfig) -> Self {
        Self { turso, quota }
    }

    /// Upsert by telegram id, refreshing display fields on every interaction.
    /// Returns true when the account was just created.
    pub async fn ensure_account(
        &self,
        telegram_id: u64,
        username: Option<&str>,
        first_name: &str,
        last_name: Option<&str>,
    ) -> BotResult<bool> {
        let conn = self.turso.get_connection().await?;
        let created = self.load(&conn, telegram_id).await?.is_none();

        conn.execute(
            "INSERT INTO users (telegram_id, username, first_name, last_name) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(telegram_id) DO UPDATE SET \
             username = excluded.username, first_name = excluded.first_name, last_name = excluded.last_name",
            params![telegram_id as i64, username, first_name, last_name],
        )
        .await
        .map_err(StorageError::from)?;

        Ok(created)
    }

    pub async fn get_account(&self, telegram_id: u64) -> BotResult<Option<UserAccount>> {
        let conn = self.turso.get_connection().await?;
        self.load(&conn, telegram_id).await
    }

    /// Entitlement check, §"who pays for this run". Fixed priority:
    /// subscription, then bonus credits, then the daily allowance. Apart
    /// from the daily reset nothing is written — consumption is committed
    /// only by [`commit_usage`] after the pipeline succeeds.
    pub async fn check_access(&self, telegram_id: u64) -> BotResult<AccessDecision> {
        self.check_access_at(telegram_id, Utc::now()).await
    }

    pub async fn check_access_at(&self, telegram_id: u64, now: DateTime<Utc>) -> BotResult<AccessDecision> {
        let conn = self.turso.get_connection().await?;

        let Some(mut account) = self.load(&conn, telegram_id).await? else {
            return Ok(AccessDecision::Blocked(BlockReason::UnknownUser));
        };

        if account.is_banned {
            return Ok(AccessDecision::Blocked(BlockReason::Banned));
        }

        self.apply_daily_reset(&conn, &mut account, now).await?;

        if self.has_active_subscription(&conn, account.id, now).await? {
            return Ok(AccessDecision::Allowed(QuotaSource::Subscription));
        }

        if account.bonus_requests > 0 {
            return Ok(AccessDecision::Allowed(QuotaSource::Bonus));
        }

        let limit = account.custom_daily_limit.unwrap_or(self.quota.daily_limit);
        if account.daily_requests < limit {
            Ok(AccessDecision::Allowed(QuotaSource::Daily))
        } else {
            Ok(AccessDecision::Blocked(BlockReason::DailyLimitReached {
                used: account.daily_requests,
                limit,
            }))
        }
    }

    /// The ledger. One transaction: consume the quota source, bump lifetime
    /// counters, persist the task record. Nothing here runs unless the
    /// pipeline completed, so a failed AI call never charges anyone.
    pub async fn commit_usage(
        &self,
        telegram_id: u64,
        quota_source: QuotaSource,
        record: &NewTaskRecord,
    ) -> BotResult<i64> {
        self.commit_usage_at(telegram_id, quota_source, record, Utc::now()).await
    }

    pub async fn commit_usage_at(
        &self,
        telegram_id: u64,
        quota_source: QuotaSource,
        record: &NewTaskRecord,
        now: DateTime<Utc>,
    ) -> BotResult<i64> {
        let conn = self.turso.get_connection().await?;

        let Some(account) = self.load(&conn, telegram_id).await? else {
            return Err(anyhow::anyhow!("Cannot commit usage for unknown user {telegram_id}").into());
        };

        let tx = conn.transaction().await.map_err(StorageError::from)?;

        match quota_source {
            QuotaSource::Bonus => {
                // Floor at zero: a concurrent commit may have spent the last
                // credit already, in which case this run rides for free
                // rather than driving the counter negative.
                let changed = tx
                    .execute(
                        "UPDATE users SET bonus_requests = bonus_requests - 1 WHERE id = ?1 AND bonus_requests > 0",
                        params![account.id],
                    )
                    .await
                    .map_err(StorageError::from)?;
                if changed == 0 {
                    warn!("Bonus credit for user {telegram_id} raced to zero, skipping decrement");
                }
            }
            QuotaSource::Daily => {
                tx.execute(
                    "UPDATE users SET daily_requests = daily_requests + 1 WHERE id = ?1",
                    params![account.id],
                )
                .await
                .map_err(StorageError::from)?;
            }
            QuotaSource::Subscription => {}
        }

        tx.execute(
            "UPDATE users SET \
             total_requests = total_requests + 1, \
             total_tokens = total_tokens + ?2, \
             total_cost_usd = total_cost_usd + ?3, \
             last_request_at = ?4 \
             WHERE id = ?1",
            params![
                account.id,
                record.total_all_tokens as i64,
                record.cost_usd,
                format_timestamp(now)
            ],
        )
        .await
        .map_err(StorageError::from)?;

        let mut rows = tx
            .query(
                "INSERT INTO tasks (user_id, question, answer, detected_subject, model_used, \
                 prompt_tokens, completion_tokens, total_tokens, response_time_ms, \
                 total_prompt_tokens, total_completion_tokens, total_all_tokens, cost_usd, \
                 had_image, had_voice, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16) \
                 RETURNING id",
                params![
                    account.id,
                    record.question.as_str(),
                    record.answer.as_str(),
                    record.detected_subject.clone(),
                    record.model_used.as_str(),
                    record.prompt_tokens as i64,
                    record.completion_tokens as i64,
                    record.total_tokens as i64,
                    record.response_time_ms as i64,
                    record.total_prompt_tokens as i64,
                    record.total_completion_tokens as i64,
                    record.total_all_tokens as i64,
                    record.cost_usd,
                    account_flag(record.had_image),
                    account_flag(record.had_voice),
                    format_timestamp(now)
                ],
            )
            .await
            .map_err(StorageError::from)?;

        let task_id = match rows.next().await.map_err(StorageError::from)? {
            Some(row) => row.get::<i64>(0).map_err(StorageError::from)?,
            None => return Err(StorageError::MalformedRow("INSERT did not return an id".to_string()).into()),
        };

        tx.commit().await.map_err(StorageError::from)?;

        Ok(task_id)
    }

    /// Profile numbers. Applies the daily reset first so the display never
    /// shows yesterday's counter.
    pub async fn stats(&self, telegram_id: u64) -> BotResult<Option<UserStats>> {
        self.stats_at(telegram_id, Utc::now()).await
    }

    pub async fn stats_at(&self, telegram_id: u64, now: DateTime<Utc>) -> BotResult<Option<UserStats>> {
        let conn = self.turso.get_connection().await?;

        let Some(mut account) = self.load(&conn, telegram_id).await? else {
            return Ok(None);
        };

        self.apply_daily_reset(&conn, &mut account, now).await?;

        let favorite_subject = self.favorite_subject(&conn, account.id).await?;
        let subscription_until = self.subscription_until(&conn, account.id, now).await?;

        Ok(Some(UserStats {
            daily_used: account.daily_requests,
            daily_limit: account.custom_daily_limit.unwrap_or(self.quota.daily_limit),
            bonus_requests: account.bonus_requests,
            total_requests: account.total_requests,
            total_tokens: account.total_tokens,
            favorite_subject,
            subscription_until,
        }))
    }

    pub async fn set_banned(&self, telegram_id: u64, banned: bool) -> BotResult<bool> {
        let conn = self.turso.get_connection().await?;
        let changed = conn
            .execute(
                "UPDATE users SET is_banned = ?2 WHERE telegram_id = ?1",
                params![telegram_id as i64, account_flag(banned)],
            )
            .await
            .map_err(StorageError::from)?;
        Ok(changed > 0)
    }

    pub async fn set_custom_limit(&self, telegram_id: u64, limit: Option<u32>) -> BotResult<bool> {
        let conn = self.turso.get_connection().await?;
        let changed = conn
            .execute(
                "UPDATE users SET custom_daily_limit = ?2 WHERE telegram_id = ?1",
                params![telegram_id as i64, limit.map(|l| l as i64)],
            )
            .await
            .map_err(StorageError::from)?;
        Ok(changed > 0)
    }

    pub async fn complete_onboarding(&self, telegram_id: u64) -> BotResult<()> {
        let conn = self.turso.get_connection().await?;
        conn.execute(
            "UPDATE users SET onboarding_completed = 1 WHERE telegram_id = ?1",
            params![telegram_id as i64],
        )
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn load(&self, conn: &Connection, telegram_id: u64) -> BotResult<Option<UserAccount>> {
        let mut rows = conn
            .query(
                "SELECT id, telegram_id, username, first_name, last_name, daily_requests, \
                 bonus_requests, custom_daily_limit, total_requests, total_tokens, total_cost_usd, \
                 is_banned, onboarding_completed, last_request_at \
                 FROM users WHERE telegram_id = ?1 LIMIT 1",
                params![telegram_id as i64],
            )
            .await
            .map_err(StorageError::from)?;

        let Some(row) = rows.next().await.map_err(StorageError::from)? else {
            return Ok(None);
        };

        let last_request_at = match row.get::<Option<String>>(13).map_err(StorageError::from)? {
            Some(raw) => Some(parse_timestamp(&raw)?),
            None => None,
        };

        Ok(Some(UserAccount {
            id: row.get::<i64>(0).map_err(StorageError::from)?,
            telegram_id: row.get::<i64>(1).map_err(StorageError::from)? as u64,
            username: row.get::<Option<String>>(2).map_err(StorageError::from)?,
            first_name: row.get::<Option<String>>(3).map_err(StorageError::from)?,
            last_name: row.get::<Option<String>>(4).map_err(StorageError::from)?,
            daily_requests: row.get::<i64>(5).map_err(StorageError::from)? as u32,
            bonus_requests: row.get::<i64>(6).map_err(StorageError::from)? as u32,
            custom_daily_limit: row
                .get::<Option<i64>>(7)
                .map_err(StorageError::from)?
                .map(|l| l as u32),
            total_requests: row.get::<i64>(8).map_err(StorageError::from)? as u64,
            total_tokens: row.get::<i64>(9).map_err(StorageError::from)? as u64,
            total_cost_usd: row.get::<f64>(10).map_err(StorageError::from)?,
            is_banned: row.get::<i64>(11).map_err(StorageError::from)? != 0,
            onboarding_completed: row.get::<i64>(12).map_err(StorageError::from)? != 0,
            last_request_at,
        }))
    }

    /// Zero the daily counter the first time the account is touched on a new
    /// local calendar day. Must run before the counter is read.
    async fn apply_daily_reset(
        &self,
        conn: &Connection,
        account: &mut UserAccount,
        now: DateTime<Utc>,
    ) -> BotResult<()> {
        let Some(last_request_at) = account.last_request_at else {
            return Ok(());
        };

        if self.local_day(last_request_at) < self.local_day(now) {
            conn.execute(
                "UPDATE users SET daily_requests = 0 WHERE id = ?1",
                params![account.id],
            )
            .await
            .map_err(StorageError::from)?;
            account.daily_requests = 0;
        }

        Ok(())
    }

    async fn has_active_subscription(
        &self,
        conn: &Connection,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> BotResult<bool> {
        let mut rows = conn
            .query(
                "SELECT id FROM subscriptions WHERE user_id = ?1 AND is_active = 1 AND expires_at > ?2 LIMIT 1",
                params![user_id, format_timestamp(now)],
            )
            .await
            .map_err(StorageError::from)?;

        Ok(rows.next().await.map_err(StorageError::from)?.is_some())
    }

    async fn subscription_until(
        &self,
        conn: &Connection,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> BotResult<Option<DateTime<Utc>>> {
        let mut rows = conn
            .query(
                "SELECT expires_at FROM subscriptions \
                 WHERE user_id = ?1 AND is_active = 1 AND expires_at > ?2 \
                 ORDER BY expires_at DESC LIMIT 1",
                params![user_id, format_timestamp(now)],
            )
            .await
            .map_err(StorageError::from)?;

        match rows.next().await.map_err(StorageError::from)? {
            Some(row) => {
                let raw = row.get::<String>(0).map_err(StorageError::from)?;
                Ok(Some(parse_timestamp(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn favorite_subject(&self, conn: &Connection, user_id: i64) -> BotResult<Option<String>> {
        let mut rows = conn
            .query(
                "SELECT detected_subject FROM tasks \
                 WHERE user_id = ?1 AND detected_subject IS NOT NULL \
                 GROUP BY detected_subject ORDER BY COUNT(id) DESC LIMIT 1",
                params![user_id],
            )
            .await
            .map_err(StorageError::from)?;

        match rows.next().await.map_err(StorageError::from)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(StorageError::from)?)),
            None => Ok(None),
        }
    }

    fn local_day(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.quota.reset_offset).date_naive()
    }
}

fn account_flag(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::utils::test::test_turso;
    use chrono::TimeZone;

    pub(crate) async fn test_service() -> UserService {
        let config = AppConfig::new_test_config();
        UserService::new(test_turso().await, config.quota)
    }

    fn record(tokens: u64, cost: f64) -> NewTaskRecord {
        NewTaskRecord {
            question: "2 + 2?".to_string(),
            answer: "4".to_string(),
            detected_subject: Some("математика".to_string()),
            model_used: "test-model".to_string(),
            prompt_tokens: tokens / 2,
            completion_tokens: tokens / 2,
            total_tokens: tokens,
            response_time_ms: 1200,
            total_prompt_tokens: tokens / 2,
            total_completion_tokens: tokens / 2,
            total_all_tokens: tokens,
            cost_usd: cost,
            had_image: false,
            had_voice: false,
        }
    }

    async fn seed_subscription(service: &UserService, telegram_id: u64, expires_at: DateTime<Utc>) {
        let conn = service.turso.get_connection().await.unwrap();
        let account = service.load(&conn, telegram_id).await.unwrap().unwrap();
        conn.execute(
            "INSERT INTO subscriptions (user_id, is_active, expires_at) VALUES (?1, 1, ?2)",
            params![account.id, format_timestamp(expires_at)],
        )
        .await
        .unwrap();
    }

    async fn set_counters(service: &UserService, telegram_id: u64, daily: u32, bonus: u32, last: Option<DateTime<Utc>>) {
        let conn = service.turso.get_connection().await.unwrap();
        conn.execute(
            "UPDATE users SET daily_requests = ?2, bonus_requests = ?3, last_request_at = ?4 WHERE telegram_id = ?1",
            params![telegram_id as i64, daily as i64, bonus as i64, last.map(format_timestamp)],
        )
        .await
        .unwrap();
    }

    fn noon_msk(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        // 12:00 Moscow == 09:00 UTC
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn unknown_user_is_blocked() {
        let service = test_service().await;
        let decision = service.check_access(999).await.unwrap();
        assert_eq!(decision, AccessDecision::Blocked(BlockReason::UnknownUser));
    }

    #[tokio::test]
    async fn banned_user_is_blocked_before_quota_checks() {
        let service = test_service().await;
        service.ensure_account(1, Some("alice"), "Alice", None).await.unwrap();
        service.set_banned(1, true).await.unwrap();
        seed_subscription(&service, 1, Utc::now() + chrono::Duration::days(30)).await;

        let decision = service.check_access(1).await.unwrap();
        assert_eq!(decision, AccessDecision::Blocked(BlockReason::Banned));
    }

    #[tokio::test]
    async fn subscription_wins_over_bonus_and_daily() {
        let service = test_service().await;
        service.ensure_account(2, None, "Bob", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 2, 20, 5, Some(now)).await;
        seed_subscription(&service, 2, now + chrono::Duration::days(10)).await;

        let decision = service.check_access_at(2, now).await.unwrap();
        assert_eq!(decision, AccessDecision::Allowed(QuotaSource::Subscription));
    }

    #[tokio::test]
    async fn expired_subscription_is_filtered_at_read_time() {
        let service = test_service().await;
        service.ensure_account(3, None, "Carol", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 3, 0, 3, Some(now)).await;
        seed_subscription(&service, 3, now - chrono::Duration::days(1)).await;

        let decision = service.check_access_at(3, now).await.unwrap();
        assert_eq!(decision, AccessDecision::Allowed(QuotaSource::Bonus));
    }

    #[tokio::test]
    async fn daily_allowance_is_the_last_resort() {
        let service = test_service().await;
        service.ensure_account(4, None, "Dave", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 4, 5, 0, Some(now)).await;

        let decision = service.check_access_at(4, now).await.unwrap();
        assert_eq!(decision, AccessDecision::Allowed(QuotaSource::Daily));
    }

    #[tokio::test]
    async fn daily_counter_resets_on_new_moscow_day() {
        let service = test_service().await;
        service.ensure_account(5, None, "Eve", None).await.unwrap();
        // Limit fully used yesterday (Moscow time).
        set_counters(&service, 5, 20, 0, Some(noon_msk(2026, 2, 9))).await;

        let decision = service.check_access_at(5, noon_msk(2026, 2, 10)).await.unwrap();
        assert_eq!(decision, AccessDecision::Allowed(QuotaSource::Daily));

        let account = service.get_account(5).await.unwrap().unwrap();
        assert_eq!(account.daily_requests, 0);
    }

    #[tokio::test]
    async fn same_day_does_not_reset() {
        let service = test_service().await;
        service.ensure_account(6, None, "Finn", None).await.unwrap();
        // 23:30 and 23:50 Moscow on the same day.
        let earlier = Utc.with_ymd_and_hms(2026, 2, 9, 20, 30, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 2, 9, 20, 50, 0).unwrap();
        set_counters(&service, 6, 20, 0, Some(earlier)).await;

        let decision = service.check_access_at(6, later).await.unwrap();
        assert_eq!(
            decision,
            AccessDecision::Blocked(BlockReason::DailyLimitReached { used: 20, limit: 20 })
        );
    }

    #[tokio::test]
    async fn custom_limit_overrides_the_default() {
        let service = test_service().await;
        service.ensure_account(7, None, "Grace", None).await.unwrap();
        service.set_custom_limit(7, Some(3)).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 7, 3, 0, Some(now)).await;

        let decision = service.check_access_at(7, now).await.unwrap();
        assert_eq!(
            decision,
            AccessDecision::Blocked(BlockReason::DailyLimitReached { used: 3, limit: 3 })
        );
    }

    #[tokio::test]
    async fn entitlement_check_consumes_nothing() {
        let service = test_service().await;
        service.ensure_account(13, None, "Mara", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 13, 5, 2, Some(now)).await;

        // An aborted pipeline run never reaches the ledger, so however many
        // times access is checked, the counters stay put.
        for _ in 0..3 {
            let decision = service.check_access_at(13, now).await.unwrap();
            assert_eq!(decision, AccessDecision::Allowed(QuotaSource::Bonus));
        }

        let account = service.get_account(13).await.unwrap().unwrap();
        assert_eq!(account.daily_requests, 5);
        assert_eq!(account.bonus_requests, 2);
        assert_eq!(account.total_requests, 0);
    }

    #[tokio::test]
    async fn commit_with_daily_source_increments_counters() {
        let service = test_service().await;
        service.ensure_account(8, None, "Heidi", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 8, 19, 0, Some(now)).await;

        let decision = service.check_access_at(8, now).await.unwrap();
        assert_eq!(decision, AccessDecision::Allowed(QuotaSource::Daily));

        service
            .commit_usage_at(8, QuotaSource::Daily, &record(430, 0.002), now)
            .await
            .unwrap();

        let account = service.get_account(8).await.unwrap().unwrap();
        assert_eq!(account.daily_requests, 20);
        assert_eq!(account.total_requests, 1);
        assert_eq!(account.total_tokens, 430);
        assert!((account.total_cost_usd - 0.002).abs() < 1e-12);

        // Next question the same day is denied with the limit surfaced.
        let decision = service.check_access_at(8, now).await.unwrap();
        assert_eq!(
            decision,
            AccessDecision::Blocked(BlockReason::DailyLimitReached { used: 20, limit: 20 })
        );
    }

    #[tokio::test]
    async fn commit_with_subscription_leaves_bonus_untouched() {
        let service = test_service().await;
        service.ensure_account(9, None, "Ivan", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 9, 0, 5, Some(now)).await;
        seed_subscription(&service, 9, now + chrono::Duration::days(5)).await;

        let decision = service.check_access_at(9, now).await.unwrap();
        assert_eq!(decision, AccessDecision::Allowed(QuotaSource::Subscription));

        service
            .commit_usage_at(9, QuotaSource::Subscription, &record(100, 0.001), now)
            .await
            .unwrap();

        let account = service.get_account(9).await.unwrap().unwrap();
        assert_eq!(account.bonus_requests, 5);
        assert_eq!(account.daily_requests, 0);
        assert_eq!(account.total_requests, 1);
    }

    #[tokio::test]
    async fn bonus_commit_never_goes_negative() {
        let service = test_service().await;
        service.ensure_account(10, None, "Judy", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 10, 0, 1, Some(now)).await;

        service
            .commit_usage_at(10, QuotaSource::Bonus, &record(100, 0.001), now)
            .await
            .unwrap();
        // Simulates the losing side of a race: the credit is already gone.
        service
            .commit_usage_at(10, QuotaSource::Bonus, &record(100, 0.001), now)
            .await
            .unwrap();

        let account = service.get_account(10).await.unwrap().unwrap();
        assert_eq!(account.bonus_requests, 0);
        assert_eq!(account.total_requests, 2);
    }

    #[tokio::test]
    async fn commit_persists_the_task_record() {
        let service = test_service().await;
        service.ensure_account(11, None, "Kara", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        set_counters(&service, 11, 0, 0, Some(now)).await;

        let task_id = service
            .commit_usage_at(11, QuotaSource::Daily, &record(430, 0.002), now)
            .await
            .unwrap();
        assert!(task_id > 0);

        let stats = service.stats_at(11, now).await.unwrap().unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.favorite_subject.as_deref(), Some("математика"));
    }

    #[tokio::test]
    async fn stats_report_subscription_expiry() {
        let service = test_service().await;
        service.ensure_account(12, None, "Liam", None).await.unwrap();
        let now = noon_msk(2026, 2, 10);
        let until = now + chrono::Duration::days(30);
        seed_subscription(&service, 12, until).await;

        let stats = service.stats_at(12, now).await.unwrap().unwrap();
        assert_eq!(stats.subscription_until, Some(until));
        assert_eq!(stats.daily_limit, 20);
    }
}
