use chrono::FixedOffset;
use shuttle_runtime::SecretStore;
use std::sync::OnceLock;
use teloxide::types::UserId;

use crate::error::{BotError, BotResult};

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub assistant: AssistantConfig,
    pub pricing: PricingConfig,
    pub quota: QuotaConfig,
    pub pipeline: PipelineConfig,
    pub packages: PackagesConfig,
    pub yookassa: YookassaConfig,
    pub storage: StorageConfig,
    pub dialogue: DialogueConfig,
    pub background: BackgroundConfig,
}

impl AppConfig {
    pub fn set_global(config: AppConfig) -> BotResult<()> {
        APP_CONFIG
            .set(config)
            .map_err(|_| BotError::AppStateError("Failed to set global app config".to_string()))
    }

    pub fn get() -> BotResult<&'static AppConfig> {
        APP_CONFIG
            .get()
            .ok_or_else(|| BotError::AppStateError("App config not initialized".to_string()))
    }
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub token: String,
    pub admin_user_id: UserId,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub api_key: String,
    pub model: String,
    pub transcription_model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

/// Per-token USD prices. Kept separate from [`AssistantConfig`] because the
/// cost calculator needs them without the client settings.
#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub input_price: f64,
    pub output_price: f64,
    pub transcription_input_price: f64,
    pub transcription_output_price: f64,
}

#[derive(Clone, Debug)]
pub struct QuotaConfig {
    pub daily_limit: u32,
    /// Daily counters reset at local midnight in this fixed offset
    /// (Moscow, UTC+3 — no DST since 2014).
    pub reset_offset: FixedOffset,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub plan_timeout_secs: u64,
    pub max_question_chars: usize,
}

/// Package prices: Stars are whole units, RUB amounts are kopecks.
#[derive(Clone, Debug)]
pub struct PackagesConfig {
    pub fifty_stars: u32,
    pub fifty_rub: u64,
    pub hundred_stars: u32,
    pub hundred_rub: u64,
    pub subscription_stars: u32,
    pub subscription_rub: u64,
    pub subscription_days: i64,
}

#[derive(Clone, Debug)]
pub struct YookassaConfig {
    pub shop_id: String,
    pub secret_key: String,
    pub return_url: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub turso_url: String,
    pub turso_token: String,
}

#[derive(Clone, Debug)]
pub struct DialogueConfig {
    pub use_redis: bool,
    pub redis_url: String,
}

#[derive(Clone, Debug)]
pub struct BackgroundConfig {
    pub subscription_sweep_interval_secs: u64,
}

pub fn build_config(secret_store: &SecretStore) -> BotResult<AppConfig> {
    info!("Building AppConfig...");

    let reset_offset_hours = secret_store
        .get("DAILY_RESET_UTC_OFFSET_HOURS")
        .ok_or_else(|| BotError::SecretKeyError("Missing DAILY_RESET_UTC_OFFSET_HOURS".to_string()))?
        .parse::<i32>()
        .map_err(|_| BotError::SecretKeyError("Invalid DAILY_RESET_UTC_OFFSET_HOURS".to_string()))?;

    let reset_offset = FixedOffset::east_opt(reset_offset_hours * 3600)
        .ok_or_else(|| BotError::SecretKeyError("DAILY_RESET_UTC_OFFSET_HOURS out of range".to_string()))?;

    let config = AppConfig {
        telegram: TelegramConfig {
            token: secret_store
                .get("TELEGRAM_BOT_TOKEN")
                .ok_or_else(|| BotError::SecretKeyError("Missing TELEGRAM_BOT_TOKEN".to_string()))?,
            admin_user_id: UserId(
                secret_store
                    .get("ADMIN_TELEGRAM_USER_ID")
                    .ok_or_else(|| BotError::SecretKeyError("Missing ADMIN_TELEGRAM_USER_ID".to_string()))?
                    .parse::<u64>()
                    .map_err(|_| BotError::SecretKeyError("Invalid ADMIN_TELEGRAM_USER_ID".to_string()))?,
            ),
        },
        assistant: AssistantConfig {
            api_key: secret_store
                .get("OPENROUTER_API_KEY")
                .ok_or_else(|| BotError::SecretKeyError("Missing OPENROUTER_API_KEY".to_string()))?,
            model: secret_store
                .get("OPENROUTER_MODEL")
                .ok_or_else(|| BotError::SecretKeyError("Missing OPENROUTER_MODEL".to_string()))?,
            transcription_model: secret_store
                .get("OPENROUTER_TRANSCRIPTION_MODEL")
                .ok_or_else(|| BotError::SecretKeyError("Missing OPENROUTER_TRANSCRIPTION_MODEL".to_string()))?,
            max_tokens: secret_store
                .get("OPENROUTER_MAX_TOKENS")
                .ok_or_else(|| BotError::SecretKeyError("Missing OPENROUTER_MAX_TOKENS".to_string()))?
                .parse::<u32>()
                .map_err(|_| BotError::SecretKeyError("Invalid OPENROUTER_MAX_TOKENS".to_string()))?,
            temperature: secret_store
                .get("OPENROUTER_TEMPERATURE")
                .ok_or_else(|| BotError::SecretKeyError("Missing OPENROUTER_TEMPERATURE".to_string()))?
                .parse::<f64>()
                .map_err(|_| BotError::SecretKeyError("Invalid OPENROUTER_TEMPERATURE".to_string()))?,
            timeout_secs: secret_store
                .get("OPENROUTER_TIMEOUT_SECS")
                .ok_or_else(|| BotError::SecretKeyError("Missing OPENROUTER_TIMEOUT_SECS".to_string()))?
                .parse::<u64>()
                .map_err(|_| BotError::SecretKeyError("Invalid OPENROUTER_TIMEOUT_SECS".to_string()))?,
        },
        pricing: PricingConfig {
            input_price: secret_store
                .get("OPENROUTER_INPUT_PRICE")
                .ok_or_else(|| BotError::SecretKeyError("Missing OPENROUTER_INPUT_PRICE".to_string()))?
                .parse::<f64>()
                .map_err(|_| BotError::SecretKeyError("Invalid OPENROUTER_INPUT_PRICE".to_string()))?,
            output_price: secret_store
                .get("OPENROUTER_OUTPUT_PRICE")
                .ok_or_else(|| BotError::SecretKeyError("Missing OPENROUTER_OUTPUT_PRICE".to_string()))?
                .parse::<f64>()
                .map_err(|_| BotError::SecretKeyError("Invalid OPENROUTER_OUTPUT_PRICE".to_string()))?,
            transcription_input_price: secret_store
                .get("TRANSCRIPTION_INPUT_PRICE")
                .ok_or_else(|| BotError::SecretKeyError("Missing TRANSCRIPTION_INPUT_PRICE".to_string()))?
                .parse::<f64>()
                .map_err(|_| BotError::SecretKeyError("Invalid TRANSCRIPTION_INPUT_PRICE".to_string()))?,
            transcription_output_price: secret_store
                .get("TRANSCRIPTION_OUTPUT_PRICE")
                .ok_or_else(|| BotError::SecretKeyError("Missing TRANSCRIPTION_OUTPUT_PRICE".to_string()))?
                .parse::<f64>()
                .map_err(|_| BotError::SecretKeyError("Invalid TRANSCRIPTION_OUTPUT_PRICE".to_string()))?,
        },
        quota: QuotaConfig {
            daily_limit: secret_store
                .get("DAILY_REQUEST_LIMIT")
                .ok_or_else(|| BotError::SecretKeyError("Missing DAILY_REQUEST_LIMIT".to_string()))?
                .parse::<u32>()
                .map_err(|_| BotError::SecretKeyError("Invalid DAILY_REQUEST_LIMIT".to_string()))?,
            reset_offset,
        },
        pipeline: PipelineConfig {
            plan_timeout_secs: secret_store
                .get("PLAN_TIMEOUT_SECS")
                .ok_or_else(|| BotError::SecretKeyError("Missing PLAN_TIMEOUT_SECS".to_string()))?
                .parse::<u64>()
                .map_err(|_| BotError::SecretKeyError("Invalid PLAN_TIMEOUT_SECS".to_string()))?,
            max_question_chars: secret_store
                .get("MAX_QUESTION_CHARS")
                .ok_or_else(|| BotError::SecretKeyError("Missing MAX_QUESTION_CHARS".to_string()))?
                .parse::<usize>()
                .map_err(|_| BotError::SecretKeyError("Invalid MAX_QUESTION_CHARS".to_string()))?,
        },
        packages: PackagesConfig {
            fifty_stars: secret_store
                .get("PRICE_50_REQUESTS_STARS")
                .ok_or_else(|| BotError::SecretKeyError("Missing PRICE_50_REQUESTS_STARS".to_string()))?
                .parse::<u32>()
                .map_err(|_| BotError::SecretKeyError("Invalid PRICE_50_REQUESTS_STARS".to_string()))?,
            fifty_rub: secret_store
                .get("PRICE_50_REQUESTS_RUB")
                .ok_or_else(|| BotError::SecretKeyError("Missing PRICE_50_REQUESTS_RUB".to_string()))?
                .parse::<u64>()
                .map_err(|_| BotError::SecretKeyError("Invalid PRICE_50_REQUESTS_RUB".to_string()))?,
            hundred_stars: secret_store
                .get("PRICE_100_REQUESTS_STARS")
                .ok_or_else(|| BotError::SecretKeyError("Missing PRICE_100_REQUESTS_STARS".to_string()))?
                .parse::<u32>()
                .map_err(|_| BotError::SecretKeyError("Invalid PRICE_100_REQUESTS_STARS".to_string()))?,
            hundred_rub: secret_store
                .get("PRICE_100_REQUESTS_RUB")
                .ok_or_else(|| BotError::SecretKeyError("Missing PRICE_100_REQUESTS_RUB".to_string()))?
                .parse::<u64>()
                .map_err(|_| BotError::SecretKeyError("Invalid PRICE_100_REQUESTS_RUB".to_string()))?,
            subscription_stars: secret_store
                .get("PRICE_SUBSCRIPTION_STARS")
                .ok_or_else(|| BotError::SecretKeyError("Missing PRICE_SUBSCRIPTION_STARS".to_string()))?
                .parse::<u32>()
                .map_err(|_| BotError::SecretKeyError("Invalid PRICE_SUBSCRIPTION_STARS".to_string()))?,
            subscription_rub: secret_store
                .get("PRICE_SUBSCRIPTION_RUB")
                .ok_or_else(|| BotError::SecretKeyError("Missing PRICE_SUBSCRIPTION_RUB".to_string()))?
                .parse::<u64>()
                .map_err(|_| BotError::SecretKeyError("Invalid PRICE_SUBSCRIPTION_RUB".to_string()))?,
            subscription_days: secret_store
                .get("SUBSCRIPTION_DAYS")
                .ok_or_else(|| BotError::SecretKeyError("Missing SUBSCRIPTION_DAYS".to_string()))?
                .parse::<i64>()
                .map_err(|_| BotError::SecretKeyError("Invalid SUBSCRIPTION_DAYS".to_string()))?,
        },
        yookassa: YookassaConfig {
            shop_id: secret_store
                .get("YOOKASSA_SHOP_ID")
                .ok_or_else(|| BotError::SecretKeyError("Missing YOOKASSA_SHOP_ID".to_string()))?,
            secret_key: secret_store
                .get("YOOKASSA_SECRET_KEY")
                .ok_or_else(|| BotError::SecretKeyError("Missing YOOKASSA_SECRET_KEY".to_string()))?,
            return_url: secret_store
                .get("YOOKASSA_RETURN_URL")
                .ok_or_else(|| BotError::SecretKeyError("Missing YOOKASSA_RETURN_URL".to_string()))?,
        },
        storage: StorageConfig {
            turso_url: secret_store
                .get("TURSO_URL")
                .ok_or_else(|| BotError::SecretKeyError("Missing TURSO_URL".to_string()))?,
            turso_token: secret_store
                .get("TURSO_TOKEN")
                .ok_or_else(|| BotError::SecretKeyError("Missing TURSO_TOKEN".to_string()))?,
        },
        dialogue: DialogueConfig {
            use_redis: secret_store
                .get("DIALOGUE_USE_REDIS")
                .ok_or_else(|| BotError::SecretKeyError("Missing DIALOGUE_USE_REDIS".to_string()))?
                .parse::<bool>()
                .map_err(|_| BotError::SecretKeyError("Invalid DIALOGUE_USE_REDIS".to_string()))?,
            redis_url: secret_store
                .get("REDIS_URL")
                .ok_or_else(|| BotError::SecretKeyError("Missing REDIS_URL".to_string()))?,
        },
        background: BackgroundConfig {
            subscription_sweep_interval_secs: secret_store
                .get("SUBSCRIPTION_SWEEP_INTERVAL_SECS")
                .ok_or_else(|| BotError::SecretKeyError("Missing SUBSCRIPTION_SWEEP_INTERVAL_SECS".to_string()))?
                .parse::<u64>()
                .map_err(|_| BotError::SecretKeyError("Invalid SUBSCRIPTION_SWEEP_INTERVAL_SECS".to_string()))?,
        },
    };
    info!("AppConfig built");

    Ok(config)
}

#[cfg(test)]
impl AppConfig {
    pub fn new_test_config() -> Self {
        AppConfig {
            telegram: TelegramConfig {
                token: "test-token".to_string(),
                admin_user_id: UserId(1),
            },
            assistant: AssistantConfig {
                api_key: "test-key".to_string(),
                model: "google/gemini-2.0-flash-001".to_string(),
                transcription_model: "google/gemini-2.0-flash-001".to_string(),
                max_tokens: 2000,
                temperature: 0.7,
                timeout_secs: 60,
            },
            pricing: PricingConfig {
                input_price: 0.0000005,
                output_price: 0.000003,
                transcription_input_price: 0.0,
                transcription_output_price: 0.0,
            },
            quota: QuotaConfig {
                daily_limit: 20,
                reset_offset: FixedOffset::east_opt(3 * 3600).unwrap(),
            },
            pipeline: PipelineConfig {
                plan_timeout_secs: 300,
                max_question_chars: 4000,
            },
            packages: PackagesConfig {
                fifty_stars: 75,
                fifty_rub: 14900,
                hundred_stars: 115,
                hundred_rub: 22900,
                subscription_stars: 200,
                subscription_rub: 39900,
                subscription_days: 30,
            },
            yookassa: YookassaConfig {
                shop_id: "shop".to_string(),
                secret_key: "secret".to_string(),
                return_url: "https://t.me/eduhelper_bot".to_string(),
            },
            storage: StorageConfig {
                turso_url: String::new(),
                turso_token: String::new(),
            },
            dialogue: DialogueConfig {
                use_redis: false,
                redis_url: String::new(),
            },
            background: BackgroundConfig {
                subscription_sweep_interval_secs: 3600,
            },
        }
    }
}
