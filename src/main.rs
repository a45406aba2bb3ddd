use bot::BotService;
use state::AppState;
use teloxide::Bot;
use utils::http;

extern crate pretty_env_logger;
#[macro_use]
extern crate log;

mod bot;
mod commands;
mod config;
mod error;
mod handlers;
mod services;
mod state;
mod storage;
mod utils;
mod webhook;

#[cfg(test)]
mod tests;

rust_i18n::i18n!("locales", fallback = "en");

#[shuttle_runtime::main]
async fn shuttle_main(
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> Result<BotService, shuttle_runtime::Error> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = pretty_env_logger::try_init_timed();

    info!("Starting EduHelper...");

    rust_i18n::set_locale("ru");

    AppState::init(&secrets).await?;

    let config = config::AppConfig::get()?;

    let client = http::create_telegram_client();
    let bot_service = BotService {
        bot: Bot::with_client(config.telegram.token.clone(), client),
    };

    info!("Bot instance created");

    Ok(bot_service)
}

#[shuttle_runtime::async_trait]
impl shuttle_runtime::Service for BotService {
    async fn bind(self, addr: std::net::SocketAddr) -> Result<(), shuttle_runtime::Error> {
        self.start(addr)
            .await
            .map_err(|e| shuttle_runtime::Error::Custom(anyhow::anyhow!("Bot terminated: {e}")))?;

        Ok(())
    }
}
