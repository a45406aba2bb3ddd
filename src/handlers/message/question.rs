use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rust_i18n::t;
use teloxide::net::Download;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, Message, ParseMode};

use crate::config::AppConfig;
use crate::error::{BotError, HandlerResult};
use crate::handlers::RequestContext;
use crate::services::dialogue::{DialogueState, TaskDialogue};
use crate::services::task::{calculate_cost, NewTaskRecord, QuotaSource, TaskSession};
use crate::services::user::{AccessDecision, BlockReason};
use crate::state::AppState;
use crate::utils::{keyboard, prompts, text};

/// Entry point of the pipeline: a question arriving in the idle state.
/// Entitlement is checked before anything else runs; nothing is consumed
/// here — the ledger commits only after a successful solve.
pub(crate) async fn handle_new_question(
    bot: Bot,
    dialogue: TaskDialogue,
    msg: Message,
    ctx: RequestContext,
) -> HandlerResult<()> {
    info!("handle_new_question");

    let state = AppState::get()?;
    let config = AppConfig::get()?;

    let Some(_slot) = state.services.guard.try_begin(ctx.telegram_user_id.0) else {
        bot.send_message(msg.chat.id, t!("messages.question.busy")).await?;
        return Ok(());
    };

    let quota_source = match state.services.user.check_access(ctx.telegram_user_id.0).await? {
        AccessDecision::Allowed(source) => source,
        AccessDecision::Blocked(reason) => {
            let text = match reason {
                BlockReason::UnknownUser => t!("messages.access.unknown_user"),
                BlockReason::Banned => t!("messages.access.banned"),
                BlockReason::DailyLimitReached { used, limit } => {
                    t!("messages.access.daily_limit", used = used, limit = limit)
                }
            };

            bot.send_message(msg.chat.id, text)
                .reply_markup(keyboard::get_back_to_menu_keyboard())
                .await?;

            return Ok(());
        }
    };

    let Some(session) = build_session(&bot, &msg, ctx.telegram_user_id.0, quota_source).await? else {
        return Ok(());
    };

    // Moderation and the length cap run before any tokens are spent.
    if !state.services.moderation.check_content(&session.question).is_allowed {
        info!("Question from {} blocked by moderation", ctx.telegram_user_id);
        bot.send_message(msg.chat.id, t!("messages.moderation.blocked")).await?;
        return Ok(());
    }

    let length = session.question.chars().count();
    if length > config.pipeline.max_question_chars {
        bot.send_message(
            msg.chat.id,
            t!(
                "messages.question.too_long",
                limit = config.pipeline.max_question_chars,
                length = length
            ),
        )
        .await?;
        return Ok(());
    }

    run_interview_stage(&bot, &dialogue, msg.chat.id, session).await
}

/// Turns the incoming message into a task session: plain text as-is, photos
/// downloaded and attached as base64, voice transcribed first. Returns `None`
/// when the user was already answered (bad voice input).
async fn build_session(
    bot: &Bot,
    msg: &Message,
    telegram_user_id: u64,
    quota_source: QuotaSource,
) -> HandlerResult<Option<TaskSession>> {
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        let question = msg
            .caption()
            .map(str::to_string)
            .unwrap_or_else(|| t!("messages.question.photo_default").to_string());

        let file = bot.get_file(photo.file.id.clone()).await?;
        let image = download_to_base64(bot, &file.path).await?;

        return Ok(Some(
            TaskSession::new(telegram_user_id, question, quota_source).with_image(image),
        ));
    }

    if let Some(voice) = msg.voice() {
        bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

        let file = bot.get_file(voice.file.id.clone()).await?;
        let audio = download_to_base64(bot, &file.path).await?;

        let services = &AppState::get()?.services;
        let transcription = match services.assistant.transcribe(&audio).await {
            Ok(transcription) => transcription,
            Err(e) => {
                warn!("Voice transcription failed for {telegram_user_id}: {:?}", e);
                bot.send_message(msg.chat.id, t!("messages.question.voice_failed")).await?;
                return Ok(None);
            }
        };

        let question = transcription.text.trim().to_string();
        if question.is_empty() {
            bot.send_message(msg.chat.id, t!("messages.question.voice_failed")).await?;
            return Ok(None);
        }

        let mut session = TaskSession::new(telegram_user_id, question, quota_source);
        session.record_transcription(&transcription);

        return Ok(Some(session));
    }

    let Some(question) = msg.text() else {
        return Ok(None);
    };

    Ok(Some(TaskSession::new(telegram_user_id, question, quota_source)))
}

async fn download_to_base64(bot: &Bot, path: &str) -> HandlerResult<String> {
    let mut buffer = Vec::new();
    bot.download_file(path, &mut buffer).await?;
    Ok(BASE64.encode(&buffer))
}

/// First stage. The model either asks one clarifying question (optionally
/// with selectable options) or emits the skip marker, in which case the
/// pipeline jumps straight to solving.
async fn run_interview_stage(
    bot: &Bot,
    dialogue: &TaskDialogue,
    chat_id: ChatId,
    mut session: TaskSession,
) -> HandlerResult<()> {
    let services = &AppState::get()?.services;

    bot.send_chat_action(chat_id, ChatAction::Typing).await?;

    let completion = match services
        .assistant
        .ask(
            prompts::INTERVIEW_PROMPT,
            &session.question,
            &[],
            session.image_base64.as_deref(),
        )
        .await
    {
        Ok(completion) => completion,
        Err(e) => {
            error!("Interview stage failed: {:?}", e);
            reset_with_unavailable(bot, dialogue, chat_id).await?;
            return Ok(());
        }
    };

    session.record_stage(&completion);

    if text::should_skip_interview(&completion.text) {
        bot.send_message(chat_id, t!("messages.task.skipping")).await?;
        session.skip_plan = true;
        return run_solve_stage(bot, dialogue, chat_id, session).await;
    }

    let (question, options) = text::extract_interview_options(&completion.text);

    let markup = match options.as_deref() {
        Some(options) => keyboard::get_interview_options_keyboard(options),
        None => keyboard::get_interview_keyboard(),
    };

    session.interview_question = Some(question.clone());
    session.interview_options = options;

    dialogue
        .update(DialogueState::AwaitingInterviewAnswer { session })
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

    bot.send_message(chat_id, question).reply_markup(markup).await?;

    Ok(())
}

/// Terminal stage. Only a fully successful solve reaches the ledger; any
/// failure before the commit leaves every counter untouched.
pub(crate) async fn run_solve_stage(
    bot: &Bot,
    dialogue: &TaskDialogue,
    chat_id: ChatId,
    mut session: TaskSession,
) -> HandlerResult<()> {
    let state = AppState::get()?;
    let config = AppConfig::get()?;

    dialogue
        .update(DialogueState::Solving)
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

    bot.send_chat_action(chat_id, ChatAction::Typing).await?;
    bot.send_message(chat_id, t!("messages.task.solving")).await?;

    let mut context = session.solve_context();
    let question = match context.pop() {
        Some(message) => message.content,
        None => session.question.clone(),
    };

    let completion = match state
        .services
        .assistant
        .ask(prompts::SOLVE_PROMPT, &question, &context, session.image_base64.as_deref())
        .await
    {
        Ok(completion) => completion,
        Err(e) => {
            error!("Solve stage failed: {:?}", e);

            dialogue
                .update(DialogueState::Idle)
                .await
                .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

            bot.send_message(chat_id, t!("messages.task.unavailable_not_charged"))
                .reply_markup(keyboard::get_main_menu_keyboard())
                .await?;

            return Ok(());
        }
    };

    session.record_stage(&completion);

    let detected_subject = text::extract_subject(&completion.text);
    let answer = text::remove_subject_tag(&completion.text);

    let cost_usd = calculate_cost(
        session.prompt_tokens,
        session.completion_tokens,
        session.transcription_cost_usd,
        &config.pricing,
    );

    let record = NewTaskRecord {
        question: session.question.clone(),
        answer: answer.clone(),
        detected_subject,
        model_used: completion.model.clone(),
        prompt_tokens: completion.prompt_tokens as u64,
        completion_tokens: completion.completion_tokens as u64,
        total_tokens: completion.total_tokens as u64,
        response_time_ms: completion.response_time_ms,
        total_prompt_tokens: session.total_prompt_tokens(),
        total_completion_tokens: session.total_completion_tokens(),
        total_all_tokens: session.total_tokens(),
        cost_usd,
        had_image: session.had_image,
        had_voice: session.had_voice,
    };

    if let Err(e) = state
        .services
        .user
        .commit_usage(session.telegram_user_id, session.quota_source, &record)
        .await
    {
        dialogue.update(DialogueState::Idle).await.ok();
        return Err(e.into());
    }

    dialogue
        .update(DialogueState::Idle)
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

    send_answer(bot, chat_id, &answer).await?;

    Ok(())
}

pub(crate) async fn reset_with_unavailable(bot: &Bot, dialogue: &TaskDialogue, chat_id: ChatId) -> HandlerResult<()> {
    dialogue
        .update(DialogueState::Idle)
        .await
        .map_err(|e| BotError::DialogueStateError(e.to_string()))?;

    bot.send_message(chat_id, t!("messages.task.unavailable"))
        .reply_markup(keyboard::get_main_menu_keyboard())
        .await?;

    Ok(())
}

/// Long answers are chunked to the Telegram limit. Model output is not
/// guaranteed to be valid markdown; a chunk Telegram rejects is resent plain.
async fn send_answer(bot: &Bot, chat_id: ChatId, answer: &str) -> HandlerResult<()> {
    let chunks = text::split_message(answer, text::TELEGRAM_MESSAGE_LIMIT);
    let last = chunks.len().saturating_sub(1);

    for (idx, chunk) in chunks.iter().enumerate() {
        let mut request = bot.send_message(chat_id, chunk.clone()).parse_mode(ParseMode::Markdown);
        if idx == last {
            request = request.reply_markup(keyboard::get_main_menu_keyboard());
        }

        if request.await.is_err() {
            let mut plain = bot.send_message(chat_id, chunk.clone());
            if idx == last {
                plain = plain.reply_markup(keyboard::get_main_menu_keyboard());
            }
            plain.await?;
        }
    }

    Ok(())
}

pub(super) async fn handle_message_awaiting_plan(bot: Bot, msg: Message) -> HandlerResult<()> {
    bot.send_message(msg.chat.id, t!("messages.task.awaiting_plan")).await?;
    Ok(())
}

pub(super) async fn handle_message_while_solving(bot: Bot, msg: Message) -> HandlerResult<()> {
    bot.send_message(msg.chat.id, t!("messages.task.still_solving")).await?;
    Ok(())
}
