use rust_i18n::t;
use teloxide::{
    dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler},
    dptree,
    prelude::*,
    types::Message,
    Bot,
};

use crate::commands::{AdminCommand, Command};
use crate::error::{BotError, HandlerResult};
use crate::handlers::callback::profile::send_profile;
use crate::handlers::RequestContext;
use crate::services::dialogue::{DialogueState, TaskDialogue};
use crate::state::AppState;
use crate::utils::keyboard;

pub fn get_command_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|ctx: RequestContext| ctx.is_admin)
                .filter_command::<AdminCommand>()
                .endpoint(handle_admin_command),
        )
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
}

async fn handle_command(
    bot: Bot,
    dialogue: TaskDialogue,
    msg: Message,
    cmd: Command,
    ctx: RequestContext,
) -> HandlerResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg, ctx).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Profile => {
            send_profile(&bot, msg.chat.id, None, ctx.telegram_user_id.0).await?;
            Ok(())
        }
        Command::Cancel => handle_cancel(bot, dialogue, msg).await,
    }
}

async fn handle_start(bot: Bot, msg: Message, ctx: RequestContext) -> HandlerResult<()> {
    let services = &AppState::get()?.services;

    let onboarded = services
        .user
        .get_account(ctx.telegram_user_id.0)
        .await?
        .map(|account| account.onboarding_completed)
        .unwrap_or(false);

    let welcome_text = if onboarded {
        t!("messages.start.welcome_back", name = ctx.telegram_user_name)
    } else {
        services.user.complete_onboarding(ctx.telegram_user_id.0).await?;
        t!("messages.start.welcome", name = ctx.telegram_user_name)
    };

    bot.send_message(msg.chat.id, welcome_text)
        .reply_markup(keyboard::get_main_menu_keyboard())
        .await?;

    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult<()> {
    bot.send_message(msg.chat.id, t!("messages.help"))
        .reply_markup(keyboard::get_main_menu_keyboard())
        .await?;

    Ok(())
}

/// Explicit cancel from any state: in-flight context is discarded wholesale.
async fn handle_cancel(bot: Bot, dialogue: TaskDialogue, msg: Message) -> HandlerResult<()> {
    let state = dialogue
        .get()
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

    let text = match state {
        None | Some(DialogueState::Idle) => t!("messages.task.nothing_to_cancel"),
        Some(_) => {
            dialogue
                .update(DialogueState::Idle)
                .await
                .map_err(|e| BotError::DialogueStateError(e.to_string()))?;
            t!("messages.task.cancelled")
        }
    };

    bot.send_message(msg.chat.id, text)
        .reply_markup(keyboard::get_main_menu_keyboard())
        .await?;

    Ok(())
}

async fn handle_admin_command(bot: Bot, msg: Message, cmd: AdminCommand) -> HandlerResult<()> {
    let services = &AppState::get()?.services;

    let text = match cmd {
        AdminCommand::Ban { telegram_id } => {
            if services.user.set_banned(telegram_id, true).await? {
                t!("messages.admin.banned", id = telegram_id)
            } else {
                t!("messages.admin.user_not_found", id = telegram_id)
            }
        }
        AdminCommand::Unban { telegram_id } => {
            if services.user.set_banned(telegram_id, false).await? {
                t!("messages.admin.unbanned", id = telegram_id)
            } else {
                t!("messages.admin.user_not_found", id = telegram_id)
            }
        }
        AdminCommand::SetLimit { telegram_id, limit } => {
            let new_limit = (limit > 0).then_some(limit);
            if services.user.set_custom_limit(telegram_id, new_limit).await? {
                match new_limit {
                    Some(limit) => t!("messages.admin.limit_set", id = telegram_id, limit = limit),
                    None => t!("messages.admin.limit_cleared", id = telegram_id),
                }
            } else {
                t!("messages.admin.user_not_found", id = telegram_id)
            }
        }
        AdminCommand::Sweep => {
            let swept = services.payment.sweep_expired_subscriptions().await?;
            t!("messages.admin.swept", count = swept)
        }
    };

    bot.send_message(msg.chat.id, text).await?;

    Ok(())
}
