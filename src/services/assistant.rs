use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config::{AssistantConfig, PricingConfig};
use crate::services::task::{ChatMessage, Role};
use crate::utils::http;

const BASE_URL: &str = "https://openrouter.ai/api/v1";
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API returned status {0}")]
    Status(StatusCode),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Retry attempts exhausted")]
    RetriesExhausted,
}

/// One model round-trip, with the usage numbers the ledger needs.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub response_time_ms: u64,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Clone)]
pub struct AssistantService {
    client: Client,
    config: AssistantConfig,
    pricing: PricingConfig,
}

impl AssistantService {
    pub fn new(config: AssistantConfig, pricing: PricingConfig) -> Self {
        let client = http::create_assistant_client(&config.api_key, Duration::from_secs(config.timeout_secs));
        Self {
            client,
            config,
            pricing,
        }
    }

    /// One pipeline stage: system prompt + prior context + the user prompt,
    /// with an optional image attached to the final message. Retries are
    /// handled here; callers treat any error as a single opaque failure.
    pub async fn ask(
        &self,
        system_prompt: &str,
        question: &str,
        context: &[ChatMessage],
        image_base64: Option<&str>,
    ) -> Result<Completion, AssistantError> {
        let mut messages = vec![json!({ "role": "system", "content": system_prompt })];

        for message in context {
            messages.push(json!({ "role": role_name(message.role), "content": message.content }));
        }

        messages.push(user_message(question, image_base64, None));

        let payload = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        self.completion_with_retry(&self.config.model, payload).await
    }

    /// Voice transcription through the audio-capable model. The cost comes
    /// from separately configured per-token prices, so a free tier simply
    /// reports zero.
    pub async fn transcribe(&self, voice_base64: &str) -> Result<Transcription, AssistantError> {
        let messages = vec![
            json!({
                "role": "system",
                "content": "Расшифруй голосовое сообщение дословно. В ответе только текст сообщения.",
            }),
            user_message("Расшифруй это голосовое сообщение.", None, Some(voice_base64)),
        ];

        let payload = json!({
            "model": self.config.transcription_model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": 0.0,
        });

        let completion = self
            .completion_with_retry(&self.config.transcription_model, payload)
            .await?;

        let cost_usd = completion.prompt_tokens as f64 * self.pricing.transcription_input_price
            + completion.completion_tokens as f64 * self.pricing.transcription_output_price;

        Ok(Transcription {
            text: completion.text,
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
            cost_usd,
        })
    }

    async fn completion_with_retry(
        &self,
        model: &str,
        payload: serde_json::Value,
    ) -> Result<Completion, AssistantError> {
        let url = format!("{BASE_URL}/chat/completions");
        let started = Instant::now();

        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.client.post(&url).json(&payload).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Assistant request error (attempt {attempt}): {e}");
                    if attempt == MAX_ATTEMPTS {
                        return Err(e.into());
                    }
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(5);
                warn!("Assistant rate limited, waiting {retry_after}s");
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            if status.is_server_error() {
                warn!("Assistant server error {status}, retrying...");
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                continue;
            }

            if !status.is_success() {
                return Err(AssistantError::Status(status));
            }

            let parsed: ChatCompletionResponse = response.json().await?;
            let usage = parsed.usage.unwrap_or_default();
            let text = parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| AssistantError::Malformed("no choices in response".to_string()))?;

            return Ok(Completion {
                text,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                response_time_ms: started.elapsed().as_millis() as u64,
                model: model.to_string(),
            });
        }

        Err(AssistantError::RetriesExhausted)
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn user_message(text: &str, image_base64: Option<&str>, voice_base64: Option<&str>) -> serde_json::Value {
    if image_base64.is_none() && voice_base64.is_none() {
        return json!({ "role": "user", "content": text });
    }

    let mut parts = vec![json!({ "type": "text", "text": text })];

    if let Some(image) = image_base64 {
        parts.push(json!({
            "type": "image_url",
            "image_url": { "url": format!("data:image/jpeg;base64,{image}") },
        }));
    }

    if let Some(voice) = voice_base64 {
        parts.push(json!({
            "type": "input_audio",
            "input_audio": { "data": voice, "format": "ogg" },
        }));
    }

    json!({ "role": "user", "content": parts })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_user_message_is_a_string() {
        let message = user_message("hello", None, None);
        assert_eq!(message["content"], "hello");
    }

    #[test]
    fn image_message_uses_content_parts() {
        let message = user_message("hello", Some("QUJD"), None);
        let parts = message["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn voice_message_uses_input_audio_part() {
        let message = user_message("transcribe", None, Some("T0dH"));
        let parts = message["content"].as_array().unwrap();
        assert_eq!(parts[1]["type"], "input_audio");
        assert_eq!(parts[1]["input_audio"]["format"], "ogg");
    }
}
