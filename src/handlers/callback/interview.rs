use rust_i18n::t;
use teloxide::payloads::EditMessageTextSetters;
use teloxide::prelude::*;
use teloxide::types::MaybeInaccessibleMessage;

use crate::error::{BotError, HandlerResult};
use crate::handlers::message::{interview, question};
use crate::handlers::RequestContext;
use crate::services::dialogue::{DialogueState, TaskDialogue};
use crate::state::AppState;
use crate::utils::keyboard;

/// A tapped multiple-choice option. The callback data carries only the
/// index; the option text lives in the session, so a stale button from an
/// earlier run cannot inject an answer.
pub(super) async fn handle_option(
    bot: &Bot,
    dialogue: &TaskDialogue,
    message: &MaybeInaccessibleMessage,
    ctx: &RequestContext,
    data: &str,
) -> HandlerResult<()> {
    info!("handle_callback_interview_option");

    let Some(index) = data.strip_prefix("interview_opt_").and_then(|raw| raw.parse::<usize>().ok()) else {
        return Ok(());
    };

    let Some(DialogueState::AwaitingInterviewAnswer { mut session }) = get_state(dialogue).await? else {
        return Ok(());
    };

    let Some(answer) = session
        .interview_options
        .as_ref()
        .and_then(|options| options.get(index))
        .cloned()
    else {
        return Ok(());
    };

    let services = &AppState::get()?.services;
    let Some(_slot) = services.guard.try_begin(ctx.telegram_user_id.0) else {
        bot.send_message(message.chat().id, t!("messages.question.busy")).await?;
        return Ok(());
    };

    session.record_interview_answer(&answer);

    interview::run_plan_stage(bot, dialogue, message.chat().id, session).await
}

/// "Skip and solve now", available while the interview question or the plan
/// confirmation is pending.
pub(super) async fn handle_skip(
    bot: &Bot,
    dialogue: &TaskDialogue,
    message: &MaybeInaccessibleMessage,
    ctx: &RequestContext,
) -> HandlerResult<()> {
    info!("handle_callback_interview_skip");

    let mut session = match get_state(dialogue).await? {
        Some(DialogueState::AwaitingInterviewAnswer { session })
        | Some(DialogueState::AwaitingPlanConfirmation { session }) => session,
        _ => return Ok(()),
    };

    let services = &AppState::get()?.services;
    let Some(_slot) = services.guard.try_begin(ctx.telegram_user_id.0) else {
        bot.send_message(message.chat().id, t!("messages.question.busy")).await?;
        return Ok(());
    };

    session.skip_plan = true;

    bot.send_message(message.chat().id, t!("messages.task.skipping")).await?;

    question::run_solve_stage(bot, dialogue, message.chat().id, session).await
}

pub(super) async fn handle_plan_confirm(
    bot: &Bot,
    dialogue: &TaskDialogue,
    message: &MaybeInaccessibleMessage,
    ctx: &RequestContext,
) -> HandlerResult<()> {
    info!("handle_callback_plan_confirm");

    let Some(DialogueState::AwaitingPlanConfirmation { session }) = get_state(dialogue).await? else {
        return Ok(());
    };

    let services = &AppState::get()?.services;
    let Some(_slot) = services.guard.try_begin(ctx.telegram_user_id.0) else {
        bot.send_message(message.chat().id, t!("messages.question.busy")).await?;
        return Ok(());
    };

    question::run_solve_stage(bot, dialogue, message.chat().id, session).await
}

pub(super) async fn handle_plan_modify(
    bot: &Bot,
    dialogue: &TaskDialogue,
    message: &MaybeInaccessibleMessage,
) -> HandlerResult<()> {
    info!("handle_callback_plan_modify");

    let Some(DialogueState::AwaitingPlanConfirmation { session }) = get_state(dialogue).await? else {
        return Ok(());
    };

    dialogue
        .update(DialogueState::AwaitingPlanModification { session })
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

    bot.send_message(message.chat().id, t!("messages.task.modify_prompt")).await?;

    Ok(())
}

/// Cancel from any pipeline state discards the session wholesale.
pub(super) async fn handle_cancel(
    bot: &Bot,
    dialogue: &TaskDialogue,
    message: &MaybeInaccessibleMessage,
) -> HandlerResult<()> {
    info!("handle_callback_cancel");

    dialogue
        .update(DialogueState::Idle)
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

    bot.edit_message_text(message.chat().id, message.id(), t!("messages.task.cancelled"))
        .reply_markup(keyboard::get_main_menu_keyboard())
        .await?;

    Ok(())
}

async fn get_state(dialogue: &TaskDialogue) -> HandlerResult<Option<DialogueState>> {
    dialogue
        .get()
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()).into())
}
