use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client,
};
use std::time::Duration;

pub fn create_telegram_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent("TelegramBot/1.0")
        .build()
        .expect("Failed to build Telegram client")
}

pub fn create_assistant_client(api_key: &str, timeout: Duration) -> Client {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}")).expect("API key is a valid header value"),
    );
    headers.insert("HTTP-Referer", HeaderValue::from_static("https://eduhelper.bot"));
    headers.insert("X-Title", HeaderValue::from_static("EduHelper Bot"));

    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .default_headers(headers)
        .build()
        .expect("Failed to build assistant client")
}

pub fn create_payment_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build payment client")
}
