use rust_i18n::t;
use teloxide::payloads::EditMessageTextSetters;
use teloxide::prelude::*;
use teloxide::types::MaybeInaccessibleMessage;

use crate::error::HandlerResult;
use crate::handlers::RequestContext;
use crate::utils::keyboard;

pub(super) async fn handle_help_menu(bot: &Bot, message: &MaybeInaccessibleMessage) -> HandlerResult<()> {
    info!("handle_callback_help_menu");

    bot.edit_message_text(message.chat().id, message.id(), t!("messages.help"))
        .reply_markup(keyboard::get_back_to_menu_keyboard())
        .await?;

    Ok(())
}

pub(super) async fn handle_main_menu(
    bot: &Bot,
    message: &MaybeInaccessibleMessage,
    ctx: &RequestContext,
) -> HandlerResult<()> {
    info!("handle_callback_main_menu");

    bot.edit_message_text(
        message.chat().id,
        message.id(),
        t!("messages.start.welcome_back", name = ctx.telegram_user_name),
    )
    .reply_markup(keyboard::get_main_menu_keyboard())
    .await?;

    Ok(())
}
