use std::net::SocketAddr;
use std::time::Duration;

use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::Bot;

use crate::commands;
use crate::config::AppConfig;
use crate::error::HandlerResult;
use crate::handlers::get_handler;
use crate::services::dialogue::DialogueService;
use crate::state::AppState;
use crate::webhook;

pub struct BotService {
    pub bot: Bot,
}

impl BotService {
    /// Runs the dispatcher and the payment webhook server until shutdown.
    pub async fn start(&self, addr: SocketAddr) -> HandlerResult<()> {
        info!("Testing connection to Telegram API...");
        match self.bot.get_me().await {
            Ok(_) => info!("Successfully connected to Telegram API"),
            Err(e) => {
                error!("Failed to connect to Telegram API: {:?}", e);
                return Err(anyhow::anyhow!("Failed to connect to Telegram API: {e}").into());
            }
        }

        let config = AppConfig::get()?;

        let storage = DialogueService::get_dialogue_storage(&config.dialogue).await?;
        if let Err(e) = DialogueService::clear_dialogue_storage(&config.dialogue).await {
            warn!("Failed to clear stale dialogue states: {:?}", e);
        }

        commands::setup_user_commands(&self.bot).await?;
        commands::setup_admin_commands(&self.bot, config.telegram.admin_user_id).await?;

        start_webhook_server(self.bot.clone(), addr);
        start_subscription_sweep(config.background.subscription_sweep_interval_secs);

        let handler = get_handler();

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![storage])
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

fn start_webhook_server(bot: Bot, addr: SocketAddr) {
    tokio::spawn(async move {
        info!("Starting webhook server on {addr}");

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind webhook server on {addr}: {e}");
                return;
            }
        };

        if let Err(e) = axum::serve(listener, webhook::router(bot)).await {
            error!("Webhook server terminated: {e}");
        }
    });
}

/// Periodically marks expired subscription rows inactive. Entitlement filters
/// by expiry at read time, so this is bookkeeping rather than enforcement.
fn start_subscription_sweep(interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.tick().await;

        loop {
            interval.tick().await;

            let state = match AppState::get() {
                Ok(state) => state,
                Err(e) => {
                    error!("Subscription sweep skipped: {:?}", e);
                    continue;
                }
            };

            match state.services.payment.sweep_expired_subscriptions().await {
                Ok(0) => {}
                Ok(swept) => info!("Deactivated {swept} expired subscriptions"),
                Err(e) => error!("Subscription sweep failed: {:?}", e),
            }
        }
    });
}
