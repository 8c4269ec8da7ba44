use thiserror::Error;

/// Core error type for recall.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum RecallError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("slide not found: {id}")]
    NotFound { id: String },

    #[error("index {index} out of bounds for deck of {len} slides")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("reorder source and destination are both {index}")]
    SameIndex { index: usize },

    #[error("malformed stream line {line}: {reason}")]
    Decode { line: usize, reason: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limited by service")]
    RateLimited { retry_after: Option<u64> },

    #[error("service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("service error: {code} {message}")]
    ServiceError { code: String, message: String },

    #[error("stream aborted: {reason}")]
    StreamAborted { reason: String },

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RecallError {
    /// Structural errors are caller bugs: the surface and the deck disagree.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::IndexOutOfBounds { .. } | Self::SameIndex { .. }
        )
    }

    /// Errors that come from talking to the presentation service.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::RateLimited { .. }
                | Self::ServiceUnavailable { .. }
                | Self::ServiceError { .. }
                | Self::StreamAborted { .. }
        )
    }

    /// Stable snake_case label used in telemetry and notices.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::IndexOutOfBounds { .. } => "index_out_of_bounds",
            Self::SameIndex { .. } => "same_index",
            Self::Decode { .. } => "decode",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::ServiceError { .. } => "service_error",
            Self::StreamAborted { .. } => "stream_aborted",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, RecallError>;
