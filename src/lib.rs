//! Dispatcher for remote ML inference with bounded fixed-delay retry and a
//! local-first fallback mode, plus the two sibling HTTP clients used by the
//! education platform: the study resources agent and document analysis.

pub mod agent;
pub mod config;
pub mod documents;
pub mod error;
pub mod executor;

pub use config::Config;
pub use error::{ConfigError, DispatchError, ExecutorError, TransportError};
pub use executor::{DispatchResult, ExecutionMode, MlExecutor, Operation, RetryPolicy};
