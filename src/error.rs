use thiserror::Error;

/// Crate-level error for configuration loading and the CLI plumbing.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Invalid configuration, rejected once at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown execution mode: {0}")]
    UnknownMode(String),

    #[error("retry attempts must be at least 1")]
    ZeroAttempts,

    #[error("service URL must not be empty")]
    EmptyServiceUrl,
}

/// Failure side of a dispatch. The `Display` output is the failure message
/// handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error(
        "local execution is not supported: no local runtime is available; use remote mode"
    )]
    LocalUnsupported,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("failed after {0} attempts")]
    Exhausted(u32),
}

impl DispatchError {
    /// Whether the remote retry loop makes another attempt: 5xx statuses and
    /// connection failures only.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Http { status, .. } => (500..600).contains(status),
            DispatchError::Connection(_) => true,
            _ => false,
        }
    }
}

/// Failure below the HTTP layer: nothing usable came back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}
