//! Errors of the resources agent client. They never reach callers of the
//! public API, which substitute a fallback bundle, but they are logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent answered with a non-2xx status.
    #[error("agent returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// DNS, refused connection, timeout.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A 2xx body that is not a resource bundle.
    #[error("unexpected agent response: {0}")]
    Decode(#[from] serde_json::Error),
}
