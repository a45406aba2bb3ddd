pub(crate) mod interview;
pub(crate) mod payment;
pub(crate) mod question;

use rust_i18n::t;
use teloxide::{
    dispatching::{UpdateFilterExt, UpdateHandler},
    dptree::{self, case},
    prelude::*,
    types::Message,
};

use crate::error::HandlerResult;
use crate::services::dialogue::DialogueState;
use crate::utils::keyboard;

pub fn get_message_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    Update::filter_message()
        .branch(
            dptree::filter(|msg: Message| msg.successful_payment().is_some())
                .endpoint(payment::handle_successful_payment),
        )
        .branch(case![DialogueState::AwaitingInterviewAnswer { session }].endpoint(interview::handle_interview_answer))
        .branch(case![DialogueState::AwaitingPlanModification { session }].endpoint(interview::handle_plan_modification))
        .branch(case![DialogueState::AwaitingPlanConfirmation { session }].endpoint(question::handle_message_awaiting_plan))
        .branch(case![DialogueState::Solving].endpoint(question::handle_message_while_solving))
        .branch(dptree::filter(is_question_message).endpoint(question::handle_new_question))
}

fn is_question_message(msg: Message) -> bool {
    if msg.photo().is_some() || msg.voice().is_some() {
        return true;
    }

    msg.text().map(|text| !text.starts_with('/')).unwrap_or(false)
}

pub async fn handle_message_unknown(bot: Bot, msg: Message) -> HandlerResult<()> {
    bot.send_message(msg.chat.id, t!("messages.unknown_command"))
        .reply_markup(keyboard::get_main_menu_keyboard())
        .await?;

    Ok(())
}
