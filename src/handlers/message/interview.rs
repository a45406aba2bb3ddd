use std::time::Duration;

use rust_i18n::t;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, Message};

use crate::config::AppConfig;
use crate::error::{BotError, HandlerResult};
use crate::handlers::message::question;
use crate::handlers::RequestContext;
use crate::services::dialogue::{timeout_should_abort, DialogueState, TaskDialogue};
use crate::services::task::TaskSession;
use crate::state::AppState;
use crate::utils::{keyboard, prompts};

pub(crate) async fn handle_interview_answer(
    bot: Bot,
    dialogue: TaskDialogue,
    msg: Message,
    mut session: TaskSession,
    ctx: RequestContext,
) -> HandlerResult<()> {
    info!("handle_interview_answer");

    let Some(answer) = msg.text() else {
        bot.send_message(msg.chat.id, t!("messages.task.answer_in_text")).await?;
        return Ok(());
    };

    let services = &AppState::get()?.services;
    let Some(_slot) = services.guard.try_begin(ctx.telegram_user_id.0) else {
        bot.send_message(msg.chat.id, t!("messages.question.busy")).await?;
        return Ok(());
    };

    session.record_interview_answer(answer);

    run_plan_stage(&bot, &dialogue, msg.chat.id, session).await
}

pub(crate) async fn handle_plan_modification(
    bot: Bot,
    dialogue: TaskDialogue,
    msg: Message,
    mut session: TaskSession,
    ctx: RequestContext,
) -> HandlerResult<()> {
    info!("handle_plan_modification");

    let Some(request) = msg.text() else {
        bot.send_message(msg.chat.id, t!("messages.task.answer_in_text")).await?;
        return Ok(());
    };

    let services = &AppState::get()?.services;
    let Some(_slot) = services.guard.try_begin(ctx.telegram_user_id.0) else {
        bot.send_message(msg.chat.id, t!("messages.question.busy")).await?;
        return Ok(());
    };

    session.record_plan_modification(request);

    run_plan_stage(&bot, &dialogue, msg.chat.id, session).await
}

/// Second stage: a numbered plan from the accumulated exchange, shown for
/// confirmation. Re-run in full on every modification request; each run bumps
/// `plan_round` and arms a fresh confirmation timeout.
pub(crate) async fn run_plan_stage(
    bot: &Bot,
    dialogue: &TaskDialogue,
    chat_id: ChatId,
    mut session: TaskSession,
) -> HandlerResult<()> {
    let services = &AppState::get()?.services;

    bot.send_chat_action(chat_id, ChatAction::Typing).await?;

    let mut context = session.plan_context();
    let question = match context.pop() {
        Some(message) => message.content,
        None => session.question.clone(),
    };

    let completion = match services
        .assistant
        .ask(prompts::PLAN_PROMPT, &question, &context, session.image_base64.as_deref())
        .await
    {
        Ok(completion) => completion,
        Err(e) => {
            error!("Plan stage failed: {:?}", e);
            question::reset_with_unavailable(bot, dialogue, chat_id).await?;
            return Ok(());
        }
    };

    session.record_stage(&completion);
    session.plan = Some(completion.text.clone());
    session.plan_round += 1;
    let armed_round = session.plan_round;

    dialogue
        .update(DialogueState::AwaitingPlanConfirmation { session })
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

    bot.send_message(chat_id, format!("{}\n\n{}", completion.text, t!("messages.task.confirm_plan")))
        .reply_markup(keyboard::get_plan_keyboard())
        .await?;

    arm_plan_timeout(bot.clone(), dialogue.clone(), chat_id, armed_round);

    Ok(())
}

/// One-shot confirmation timer. It re-checks the dialogue before acting, so
/// a timer that fires after the state moved on (confirm, cancel, a newer
/// plan round) does nothing.
fn arm_plan_timeout(bot: Bot, dialogue: TaskDialogue, chat_id: ChatId, armed_round: u32) {
    let timeout_secs = AppConfig::get().map(|c| c.pipeline.plan_timeout_secs).unwrap_or(300);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;

        let state = match dialogue.get().await {
            Ok(state) => state,
            Err(e) => {
                error!("Plan timeout could not read dialogue state: {:?}", e);
                return;
            }
        };

        if !timeout_should_abort(state.as_ref(), armed_round) {
            return;
        }

        if let Err(e) = dialogue.update(DialogueState::Idle).await {
            error!("Plan timeout could not reset dialogue: {:?}", e);
            return;
        }

        info!("Plan confirmation timed out for chat {chat_id}");

        if let Err(e) = bot
            .send_message(chat_id, t!("messages.task.plan_timeout"))
            .reply_markup(keyboard::get_main_menu_keyboard())
            .await
        {
            warn!("Failed to notify chat {chat_id} about the plan timeout: {:?}", e);
        }
    });
}
