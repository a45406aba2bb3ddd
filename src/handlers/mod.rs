mod callback;
mod command;
mod message;

use teloxide::{
    dispatching::{
        dialogue::{self, ErasedStorage},
        UpdateFilterExt, UpdateHandler,
    },
    dptree,
    types::{Update, UserId},
};

use crate::services::{dialogue::DialogueState, middleware::extract_user};
use crate::state::AppState;
use crate::utils;

#[derive(Clone, Debug)]
pub struct RequestContext {
    pub telegram_user_id: UserId,
    pub telegram_user_name: String,
    pub is_admin: bool,
}

pub fn get_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        // Pre-checkout queries carry no chat, so they bypass the dialogue layer.
        .branch(Update::filter_pre_checkout_query().endpoint(message::payment::handle_pre_checkout))
        .branch(
            dialogue::enter::<Update, ErasedStorage<DialogueState>, DialogueState, _>()
                .filter_map_async(|update: Update| async move {
                    let state = match AppState::get() {
                        Ok(state) => state,
                        Err(e) => {
                            error!("Failed to get AppState: {:?}", e);
                            return None;
                        }
                    };

                    let user = extract_user(&update)?;

                    // Display fields are refreshed on every interaction.
                    if let Err(e) = state
                        .services
                        .user
                        .ensure_account(
                            user.id.0,
                            user.username.as_deref(),
                            &user.first_name,
                            user.last_name.as_deref(),
                        )
                        .await
                    {
                        error!("Failed to refresh account for {}: {:?}", user.id, e);
                    }

                    Some(RequestContext {
                        telegram_user_id: user.id,
                        telegram_user_name: user.first_name.clone(),
                        is_admin: utils::is_admin(user.id).unwrap_or(false),
                    })
                })
                .branch(command::get_command_handler())
                .branch(message::get_message_handler())
                .branch(callback::get_callback_handler())
                .branch(Update::filter_message().endpoint(message::handle_message_unknown)),
        )
}
