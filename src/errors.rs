use thiserror::Error;

/// Classification of a failure reported by an external model service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// HTTP 429 or a provider-specific rate limit signal
    RateLimited,
    /// Quota or resource exhaustion
    QuotaExhausted,
    /// 5xx responses and "unavailable" signals
    Server,
    /// Request or deadline timeout
    Timeout,
    /// Connection refused, reset, DNS failure
    Connection,
    /// 401/403, missing or invalid credentials
    Unauthorized,
    /// Malformed request or unsupported model (other 4xx)
    InvalidRequest,
    /// The service answered but the payload was unusable
    InvalidResponse,
    /// Anything we could not classify
    Other,
}

/// Markers the model services put in error text for conditions worth retrying
const TRANSIENT_MARKERS: &[(&str, ModelErrorKind)] = &[
    ("429", ModelErrorKind::RateLimited),
    ("rate", ModelErrorKind::RateLimited),
    ("quota", ModelErrorKind::QuotaExhausted),
    ("resource_exhausted", ModelErrorKind::QuotaExhausted),
    ("500", ModelErrorKind::Server),
    ("502", ModelErrorKind::Server),
    ("503", ModelErrorKind::Server),
    ("504", ModelErrorKind::Server),
    ("unavailable", ModelErrorKind::Server),
    ("timeout", ModelErrorKind::Timeout),
    ("timed out", ModelErrorKind::Timeout),
    ("deadline", ModelErrorKind::Timeout),
    ("connection", ModelErrorKind::Connection),
];

impl ModelErrorKind {
    /// Whether a failure of this kind may succeed if retried later
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::QuotaExhausted | Self::Server | Self::Timeout | Self::Connection
        )
    }

    /// Classify an HTTP status returned by a model service
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            401 | 403 => Self::Unauthorized,
            408 => Self::Timeout,
            500..=599 => Self::Server,
            400..=499 => Self::InvalidRequest,
            _ => Self::Other,
        }
    }

    /// Heuristic classification for opaque error text
    ///
    /// Only used when the underlying client gives us nothing better than a message.
    pub fn from_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        TRANSIENT_MARKERS
            .iter()
            .find(|(marker, _)| lowered.contains(marker))
            .map_or(Self::Other, |(_, kind)| *kind)
    }

    /// Classify a transport-level reqwest failure
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16())
        } else if err.is_builder() || err.is_request() || err.is_body() {
            // Never reached the service; sending it again will not help
            Self::InvalidRequest
        } else if err.is_decode() {
            Self::InvalidResponse
        } else {
            Self::from_message(&err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum LuminaError {
    #[error("Model service error ({kind:?}): {message}")]
    Model {
        kind: ModelErrorKind,
        message: String,
    },

    #[error("Max retries ({attempts}) exceeded. Last error: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<LuminaError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Rerank error: {0}")]
    Rerank(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LuminaError {
    /// Model error with an explicit classification
    pub fn model(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self::Model {
            kind,
            message: message.into(),
        }
    }

    /// Model error classified from its text alone
    pub fn opaque_model(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Model {
            kind: ModelErrorKind::from_message(&message),
            message,
        }
    }

    /// Only model-service failures of a transient kind are retried
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Model { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LuminaError {
    fn from(err: reqwest::Error) -> Self {
        Self::model(ModelErrorKind::from_reqwest(&err), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LuminaError>;
