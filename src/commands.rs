use teloxide::{
    macros::BotCommands,
    payloads::SetMyCommandsSetters,
    prelude::Requester,
    types::{BotCommandScope, ChatId, Recipient, UserId},
    utils::command::BotCommands as _,
    Bot,
};

use crate::error::HandlerResult;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "Начать работу с ботом")]
    Start,
    #[command(description = "Показать справку")]
    Help,
    #[command(description = "Профиль и лимиты")]
    Profile,
    #[command(description = "Отменить текущий запрос")]
    Cancel,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды администратора:", parse_with = "split")]
pub enum AdminCommand {
    #[command(description = "Заблокировать пользователя: /ban <id>")]
    Ban { telegram_id: u64 },
    #[command(description = "Разблокировать пользователя: /unban <id>")]
    Unban { telegram_id: u64 },
    #[command(description = "Дневной лимит (0 — сбросить): /setlimit <id> <n>")]
    SetLimit { telegram_id: u64, limit: u32 },
    #[command(description = "Деактивировать истёкшие подписки")]
    Sweep,
}

pub async fn setup_user_commands(bot: &Bot) -> HandlerResult<()> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

/// Admin commands are only visible in the admin's own chat.
pub async fn setup_admin_commands(bot: &Bot, admin_user_id: UserId) -> HandlerResult<()> {
    let mut commands = Command::bot_commands();
    commands.extend(AdminCommand::bot_commands());

    bot.set_my_commands(commands)
        .scope(BotCommandScope::Chat {
            chat_id: Recipient::Id(ChatId(admin_user_id.0 as i64)),
        })
        .await?;

    Ok(())
}
