use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure raised by a read-side collaborator (rule store or representative registry).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store returned malformed data: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error(
        "no eligible sales representative: no routing rule matched and no active percentage \
         allocation is available"
    )]
    NoEligibleRepresentative,
    #[error("routing configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoEligibleRepresentative,
    ConfigurationError,
    InvalidRequest,
    StoreUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoEligibleRepresentative => "NO_ELIGIBLE_REPRESENTATIVE",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }
}

/// Wire shape for failures: `{ "error": { "message": ..., "code": ... } }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: ErrorCode,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { error: ErrorDetail { message: message.into(), code } }
    }
}

impl RoutingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoEligibleRepresentative => ErrorCode::NoEligibleRepresentative,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
            // Undecodable rows are bad data; retrying will not help.
            Self::Store(StoreError::Decode(_)) => ErrorCode::ConfigurationError,
            Self::Store(StoreError::Unavailable(_)) => ErrorCode::StoreUnavailable,
        }
    }

    /// Store internals are not echoed back to callers.
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(StoreError::Unavailable(_)) => {
                "Routing data is temporarily unavailable. Please retry shortly.".to_owned()
            }
            Self::Store(StoreError::Decode(_)) => {
                "Routing configuration contains invalid data.".to_owned()
            }
            other => other.to_string(),
        }
    }

    pub fn into_envelope(self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.code(), self.user_message())
    }
}
