use crate::security_event::Severity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    // ── Input errors (client-correctable) ──────────────────────
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("PIN must be exactly 4 digits")]
    InvalidPin,

    #[error("PIN is too easy to guess")]
    WeakPin,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount exceeds the maximum allowed")]
    AmountTooLarge,

    #[error("Invalid API key format")]
    InvalidApiKeyFormat,

    // ── Authorization errors ───────────────────────────────────
    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Recipient not found")]
    RecipientNotFound,

    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("Card not found")]
    CardNotFound,

    #[error("Card is not active")]
    CardInactive,

    #[error("Card has expired")]
    CardExpired,

    #[error("No transaction PIN has been set")]
    PinNotSet,

    #[error("Current PIN is required to change an existing PIN")]
    CurrentPinRequired,

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Daily spending limit exceeded")]
    DailyLimitExceeded,

    #[error("Monthly spending limit exceeded")]
    MonthlyLimitExceeded,

    #[error("Account is not active")]
    WalletInactive,

    // ── Rate limiting ──────────────────────────────────────────
    #[error("Rate limit exceeded. Please wait before retrying")]
    RateLimited,

    // ── Infrastructure ─────────────────────────────────────────
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// What infrastructure failures look like from outside the core.
    /// Internal detail goes to the log and the security event, never here.
    #[error("Service temporarily unavailable. Please try again")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WalletError {
    /// Infrastructure failures are converted to `Unavailable` at the public
    /// boundary; everything else is returned to the caller as-is.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Serialization(_) | Self::Unavailable | Self::Other(_)
        )
    }

    /// Severity at which this error is recorded as a security event.
    /// Input errors stay low; authorization failures are medium;
    /// rate limiting and infrastructure failures are high.
    pub fn security_severity(&self) -> Severity {
        match self {
            Self::InvalidEmail
            | Self::InvalidPin
            | Self::WeakPin
            | Self::InvalidAmount
            | Self::AmountTooLarge
            | Self::InvalidApiKeyFormat => Severity::Low,

            Self::WalletNotFound
            | Self::RecipientNotFound
            | Self::SelfTransfer
            | Self::CardNotFound
            | Self::CardInactive
            | Self::CardExpired
            | Self::PinNotSet
            | Self::CurrentPinRequired
            | Self::InsufficientFunds
            | Self::DailyLimitExceeded
            | Self::MonthlyLimitExceeded
            | Self::WalletInactive => Severity::Medium,

            Self::RateLimited => Severity::High,

            Self::Database(_) | Self::Serialization(_) | Self::Unavailable | Self::Other(_) => {
                Severity::High
            }
        }
    }

    /// Stable tag used in security event details. Never includes the
    /// underlying database/serde message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "invalid_email",
            Self::InvalidPin => "invalid_pin",
            Self::WeakPin => "weak_pin",
            Self::InvalidAmount => "invalid_amount",
            Self::AmountTooLarge => "amount_too_large",
            Self::InvalidApiKeyFormat => "invalid_api_key_format",
            Self::WalletNotFound => "wallet_not_found",
            Self::RecipientNotFound => "recipient_not_found",
            Self::SelfTransfer => "self_transfer",
            Self::CardNotFound => "card_not_found",
            Self::CardInactive => "card_inactive",
            Self::CardExpired => "card_expired",
            Self::PinNotSet => "pin_not_set",
            Self::CurrentPinRequired => "current_pin_required",
            Self::InsufficientFunds => "insufficient_funds",
            Self::DailyLimitExceeded => "daily_limit_exceeded",
            Self::MonthlyLimitExceeded => "monthly_limit_exceeded",
            Self::WalletInactive => "wallet_inactive",
            Self::RateLimited => "rate_limited",
            Self::Database(_) => "database_error",
            Self::Serialization(_) => "serialization_error",
            Self::Unavailable => "unavailable",
            Self::Other(_) => "internal_error",
        }
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
