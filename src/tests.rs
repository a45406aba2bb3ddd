use teloxide::dptree;
use teloxide_tests::mock_bot::DistributionKey;
use teloxide_tests::{MockBot, MockMessageText};

use crate::config::AppConfig;
use crate::handlers::get_handler;
use crate::services::dialogue::DialogueService;
use crate::state::AppState;
use crate::utils::test::TEST_MUTEX;

type TestBot = MockBot<Box<dyn std::error::Error + Send + Sync + 'static>, DistributionKey>;

async fn setup_bot(text: &str) -> TestBot {
    rust_i18n::set_locale("ru");

    AppState::init_test().await.expect("test app state");

    let config = AppConfig::get().expect("test config");
    let storage = DialogueService::get_dialogue_storage(&config.dialogue)
        .await
        .expect("in-memory dialogue storage");

    let mut bot = MockBot::new(MockMessageText::new().text(text), get_handler());
    bot.dependencies(dptree::deps![storage]);

    bot
}

#[tokio::test]
async fn start_greets_the_user() {
    let _lock = TEST_MUTEX.lock().await;
    let mut bot = setup_bot("/start").await;

    bot.dispatch().await;

    let responses = bot.get_responses();
    let message = responses.sent_messages.last().expect("no messages sent");

    assert!(message.text().unwrap_or_default().starts_with("👋"));
}

#[tokio::test]
async fn help_lists_the_commands() {
    let _lock = TEST_MUTEX.lock().await;
    let mut bot = setup_bot("/help").await;

    bot.dispatch().await;

    let responses = bot.get_responses();
    let message = responses.sent_messages.last().expect("no messages sent");

    assert!(message.text().unwrap_or_default().contains("/profile"));
}

#[tokio::test]
async fn cancel_without_an_active_task() {
    let _lock = TEST_MUTEX.lock().await;
    let mut bot = setup_bot("/cancel").await;

    bot.dispatch().await;

    let responses = bot.get_responses();
    let message = responses.sent_messages.last().expect("no messages sent");

    assert!(message.text().unwrap_or_default().contains("нет активного запроса"));
}
