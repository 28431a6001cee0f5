//! Request-level error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::board::store::StoreError;

/// Why a board request was refused.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Missing or invalid key, body, headers or meta tag.
    #[error("bad request: {0}")]
    Malformed(String),

    /// Signature missing from, malformed in, or failing verification.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Board full, or key above the current difficulty ceiling.
    #[error("throttled: {0}")]
    Throttled(String),

    /// Update is not newer than what is stored.
    #[error("conflict: stored board is newer or the same age")]
    Conflict,

    #[error("payload too large: {size} bytes exceeds {max}")]
    TooLarge { size: usize, max: usize },

    #[error("board not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl BoardError {
    pub fn status(&self) -> StatusCode {
        match self {
            BoardError::Malformed(_) => StatusCode::BAD_REQUEST,
            BoardError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BoardError::Throttled(_) => StatusCode::FORBIDDEN,
            BoardError::Conflict => StatusCode::CONFLICT,
            BoardError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BoardError::NotFound => StatusCode::NOT_FOUND,
            BoardError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        BoardError::Malformed(msg.into())
    }
}

impl From<StoreError> for BoardError {
    fn from(e: StoreError) -> Self {
        BoardError::Storage(e.to_string())
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        if let BoardError::Storage(ref e) = self {
            tracing::error!("Board storage error: {}", e);
        }
        (self.status(), self.to_string()).into_response()
    }
}
