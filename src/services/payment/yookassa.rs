use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::PaymentError;
use crate::config::YookassaConfig;
use crate::utils::http;

const API_BASE_URL: &str = "https://api.yookassa.ru/v3";

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub provider_payment_id: String,
    pub confirmation_url: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    confirmation: Confirmation,
}

#[derive(Debug, Deserialize)]
struct Confirmation {
    confirmation_url: String,
}

/// Webhook payload. YooKassa secures webhooks by IP allow-listing, so the
/// body is taken at face value and matched against our own payment rows.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    pub event: String,
    pub object: WebhookPayment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayment {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl WebhookPayment {
    pub fn internal_payment_id(&self) -> Option<i64> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("payment_id"))
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
    }
}

#[derive(Clone)]
pub struct YookassaClient {
    client: Client,
    config: YookassaConfig,
}

impl YookassaClient {
    pub fn new(config: YookassaConfig) -> Self {
        Self {
            client: http::create_payment_client(),
            config,
        }
    }

    /// Creates a redirect payment. `Idempotence-Key` makes an accidental
    /// double submit return the same payment instead of charging twice.
    pub async fn create_payment(
        &self,
        amount_kopecks: u64,
        description: &str,
        internal_payment_id: i64,
        telegram_id: u64,
    ) -> Result<CreatedPayment, PaymentError> {
        let idempotence_key = Uuid::new_v4().to_string();

        let payload = json!({
            "amount": {
                "value": format!("{:.2}", amount_kopecks as f64 / 100.0),
                "currency": "RUB",
            },
            "confirmation": {
                "type": "redirect",
                "return_url": self.config.return_url,
            },
            "capture": true,
            "description": description,
            "metadata": {
                "payment_id": internal_payment_id,
                "telegram_id": telegram_id,
            },
        });

        let response = self
            .client
            .post(format!("{API_BASE_URL}/payments"))
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .header("Idempotence-Key", idempotence_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api(format!("create payment failed with {status}: {body}")));
        }

        let parsed: PaymentResponse = response.json().await?;

        Ok(CreatedPayment {
            provider_payment_id: parsed.id,
            confirmation_url: parsed.confirmation.confirmation_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_metadata_payment_id_accepts_number_and_string() {
        let numeric: WebhookNotification = serde_json::from_value(json!({
            "event": "payment.succeeded",
            "object": { "id": "yk-1", "metadata": { "payment_id": 7 } },
        }))
        .unwrap();
        assert_eq!(numeric.object.internal_payment_id(), Some(7));

        let stringly: WebhookNotification = serde_json::from_value(json!({
            "event": "payment.succeeded",
            "object": { "id": "yk-2", "metadata": { "payment_id": "8" } },
        }))
        .unwrap();
        assert_eq!(stringly.object.internal_payment_id(), Some(8));

        let missing: WebhookNotification = serde_json::from_value(json!({
            "event": "payment.canceled",
            "object": { "id": "yk-3" },
        }))
        .unwrap();
        assert_eq!(missing.object.internal_payment_id(), None);
    }
}
