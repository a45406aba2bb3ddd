use shuttle_runtime::Error as ShuttleError;

use crate::services::assistant::AssistantError;
use crate::services::payment::PaymentError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("App state error: {0}")]
    AppStateError(String),

    #[error("Missing or invalid secret: {0}")]
    SecretKeyError(String),

    #[error("Dialogue state error: {0}")]
    DialogueStateError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<BotError> for ShuttleError {
    fn from(error: BotError) -> Self {
        ShuttleError::Custom(anyhow::anyhow!(error))
    }
}

pub type HandlerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub type BotResult<T> = Result<T, BotError>;
