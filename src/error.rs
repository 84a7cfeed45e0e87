//! Error types for the swap bot

use thiserror::Error;

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, SwapBotError>;

#[derive(Error, Debug)]
pub enum SwapBotError {

    // =============================
    // Conversation / Disposition
    // =============================

    #[error("Can't find asset ({0})")]
    UnknownAsset(String),

    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    // =============================
    // Swap Order Encoder
    // =============================

    #[error("Invalid group key: {0}")]
    InvalidKey(String),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    // =============================
    // Collaborators
    // =============================

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Asset catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SwapBotError {
    /// Encoder-level failures fall back to a refund instead of dropping funds.
    pub fn is_encoder_failure(&self) -> bool {
        matches!(self, Self::InvalidKey(_) | Self::AmountOutOfRange(_))
    }
}
