mod interview;
mod navigation;
mod payment;
pub(crate) mod profile;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use crate::error::HandlerResult;
use crate::handlers::RequestContext;
use crate::services::dialogue::TaskDialogue;

pub fn get_callback_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    Update::filter_callback_query().endpoint(handle_callback)
}

async fn handle_callback(bot: Bot, dialogue: TaskDialogue, q: CallbackQuery, ctx: RequestContext) -> HandlerResult<()> {
    let (Some(data), Some(message)) = (q.data.clone(), q.message.clone()) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    // Stop the button spinner before any long stage runs.
    bot.answer_callback_query(q.id).await?;

    match data.as_str() {
        "interview_skip" => interview::handle_skip(&bot, &dialogue, &message, &ctx).await?,
        "interview_cancel" | "plan_cancel" => interview::handle_cancel(&bot, &dialogue, &message).await?,
        "plan_confirm" => interview::handle_plan_confirm(&bot, &dialogue, &message, &ctx).await?,
        "plan_modify" => interview::handle_plan_modify(&bot, &dialogue, &message).await?,

        "profile_menu" | "back_to_profile" => profile::handle_profile_menu(&bot, &message, &ctx).await?,
        "help_menu" => navigation::handle_help_menu(&bot, &message).await?,
        "main_menu" => navigation::handle_main_menu(&bot, &message, &ctx).await?,

        "buy_requests" => payment::handle_buy_requests(&bot, &message).await?,
        data if data.starts_with("interview_opt_") => {
            interview::handle_option(&bot, &dialogue, &message, &ctx, data).await?
        }
        data if data.starts_with("package:") => payment::handle_package_selected(&bot, &message, data).await?,
        data if data.starts_with("pay:") => payment::handle_payment_method(&bot, &message, &ctx, data).await?,

        other => warn!("Unknown callback data: {other}"),
    }

    Ok(())
}
