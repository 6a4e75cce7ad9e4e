//! Data model of the executor: execution modes, retry policy, endpoint
//! registry and the named logical operations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::error::{ConfigError, DispatchError};

/// Outcome of one logical operation: the service's JSON body, or a failure
/// carrying a human-readable message.
pub type DispatchResult = Result<Value, DispatchError>;

/// Strategy used to fulfil a logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// In-process execution. No local runtime ships with the service, so
    /// this always fails with [`DispatchError::LocalUnsupported`].
    Local,
    /// HTTP call to the inference service.
    Remote,
    /// Try local first, then fall back to remote.
    RemoteWithLocalFallback,
}

impl FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "subprocess" => Ok(ExecutionMode::Local),
            "remote" | "http" => Ok(ExecutionMode::Remote),
            "remote_with_local_fallback" | "remote-with-local-fallback" | "hybrid" => {
                Ok(ExecutionMode::RemoteWithLocalFallback)
            }
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Local => write!(f, "local"),
            ExecutionMode::Remote => write!(f, "remote"),
            ExecutionMode::RemoteWithLocalFallback => write!(f, "remote_with_local_fallback"),
        }
    }
}

/// Bounded retry with a constant delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Upper bound on outbound calls for one logical operation. At least 1.
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn new(enabled: bool, max_attempts: u32, delay_ms: u64) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(Self {
            enabled,
            max_attempts,
            delay_ms,
        })
    }

    /// Number of outbound calls actually allowed. A disabled policy still
    /// makes the first call.
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Pause between consecutive attempts; constant, no backoff.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Read-only mapping from operation name to relative URL path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointRegistry {
    paths: BTreeMap<String, String>,
}

impl EndpointRegistry {
    pub fn new(paths: BTreeMap<String, String>) -> Self {
        Self { paths }
    }

    pub fn get(&self, operation: &str) -> Option<&str> {
        self.paths
            .get(operation)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for EndpointRegistry
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            paths: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Registry key of the health endpoint.
pub const HEALTH_ENDPOINT: &str = "health";

/// The logical operations the inference service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RiskPrediction,
    CareerRecommendation,
    TrendPrediction,
    ProgressPrediction,
    KMeansClustering,
    AnomalyDetection,
    LstmPrediction,
}

impl Operation {
    /// Registry key.
    pub fn key(self) -> &'static str {
        match self {
            Operation::RiskPrediction => "risk_predictions",
            Operation::CareerRecommendation => "career_recommendations",
            Operation::TrendPrediction => "trend_predictions",
            Operation::ProgressPrediction => "progress_predictions",
            Operation::KMeansClustering => "kmeans_clustering",
            Operation::AnomalyDetection => "anomaly_detection",
            Operation::LstmPrediction => "lstm_predictions",
        }
    }

    /// Human label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Operation::RiskPrediction => "risk prediction",
            Operation::CareerRecommendation => "career recommendation",
            Operation::TrendPrediction => "trend prediction",
            Operation::ProgressPrediction => "progress prediction",
            Operation::KMeansClustering => "k-means clustering",
            Operation::AnomalyDetection => "anomaly detection",
            Operation::LstmPrediction => "LSTM prediction",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
