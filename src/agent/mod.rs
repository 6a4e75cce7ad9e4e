pub mod client;
pub mod error;
pub mod types;

pub use client::{AgentClient, fallback_resources};
pub use error::AgentError;
pub use types::{ResourceBundle, ResourceRequest, RiskLevel};
