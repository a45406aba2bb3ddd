pub mod http;
pub mod keyboard;
pub mod prompts;
pub mod text;

#[cfg(test)]
pub mod test;

use chrono::{DateTime, Utc};
use teloxide::types::UserId;

use crate::config::AppConfig;
use crate::error::BotResult;

pub fn is_admin(user_id: UserId) -> BotResult<bool> {
    Ok(AppConfig::get()?.telegram.admin_user_id == user_id)
}

/// Dates shown to users are rendered in the daily-reset timezone.
pub fn format_local_date(ts: DateTime<Utc>) -> String {
    match AppConfig::get() {
        Ok(config) => ts.with_timezone(&config.quota.reset_offset).format("%d.%m.%Y").to_string(),
        Err(_) => ts.format("%d.%m.%Y").to_string(),
    }
}
