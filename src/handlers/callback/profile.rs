use rust_i18n::t;
use teloxide::payloads::{EditMessageTextSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{ChatId, MaybeInaccessibleMessage, MessageId};

use crate::error::HandlerResult;
use crate::handlers::RequestContext;
use crate::state::AppState;
use crate::utils::{self, keyboard};

/// Profile card: daily counter (reset applied), bonus balance, subscription
/// expiry and lifetime totals. Reused by the /profile command (sends a new
/// message) and the profile callbacks (edit in place).
pub async fn send_profile(bot: &Bot, chat_id: ChatId, edit: Option<MessageId>, telegram_id: u64) -> HandlerResult<()> {
    let services = &AppState::get()?.services;

    let Some(stats) = services.user.stats(telegram_id).await? else {
        bot.send_message(chat_id, t!("messages.access.unknown_user")).await?;
        return Ok(());
    };

    let mut lines = vec![
        t!("messages.profile.title").to_string(),
        String::new(),
        t!("messages.profile.daily", used = stats.daily_used, limit = stats.daily_limit).to_string(),
        t!("messages.profile.bonus", count = stats.bonus_requests).to_string(),
    ];

    if let Some(until) = stats.subscription_until {
        lines.push(t!("messages.profile.subscription", until = utils::format_local_date(until)).to_string());
    }

    lines.push(
        t!(
            "messages.profile.totals",
            requests = stats.total_requests,
            tokens = stats.total_tokens
        )
        .to_string(),
    );

    if let Some(subject) = stats.favorite_subject {
        lines.push(t!("messages.profile.favorite_subject", subject = subject).to_string());
    }

    let text = lines.join("\n");
    let markup = keyboard::get_profile_keyboard();

    match edit {
        Some(message_id) => {
            bot.edit_message_text(chat_id, message_id, text).reply_markup(markup).await?;
        }
        None => {
            bot.send_message(chat_id, text).reply_markup(markup).await?;
        }
    }

    Ok(())
}

pub(super) async fn handle_profile_menu(
    bot: &Bot,
    message: &MaybeInaccessibleMessage,
    ctx: &RequestContext,
) -> HandlerResult<()> {
    info!("handle_callback_profile_menu");

    send_profile(bot, message.chat().id, Some(message.id()), ctx.telegram_user_id.0).await
}
