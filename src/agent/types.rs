//! Wire types of the educational resources agent.
//!
//! Resource listings are grouped by format. Resources and unknown top-level
//! fields from the agent are kept as-is so nothing is lost when a bundle is
//! passed along.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Formats the aggregated listing knows about, in display order.
pub const RESOURCE_FORMATS: [&str; 6] = [
    "videos",
    "articles",
    "exercises",
    "interactive",
    "documentation",
    "communities",
];

/// Need sent when the caller does not specify one.
pub const DEFAULT_NEED: &str = "study_resource";

/// How urgently a student needs help with a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Maps a topic error rate (0.0–1.0) to a risk level.
    pub fn from_error_rate(error_rate: f64) -> Self {
        if error_rate >= 0.75 {
            RiskLevel::High
        } else if error_rate >= 0.50 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Body of `POST /api/resources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub student_name: String,
    pub subject: String,
    /// Grade on the agent's 0–10 scale.
    pub current_grade: f64,
    pub risk_level: RiskLevel,
    pub need: String,
}

impl ResourceRequest {
    /// Builds a request from a grade on the platform's 0–100 scale.
    pub fn new(
        student_name: impl Into<String>,
        subject: impl Into<String>,
        grade_0_100: f64,
        risk_level: RiskLevel,
        need: Option<&str>,
    ) -> Self {
        Self {
            student_name: student_name.into(),
            subject: subject.into(),
            current_grade: grade_0_100 / 10.0,
            risk_level,
            need: need.unwrap_or(DEFAULT_NEED).to_string(),
        }
    }
}

/// Resources grouped by format, as returned by the agent and as produced by
/// aggregation over several topics.
///
/// Individual resources are kept as the agent sent them. Explicit `null`s
/// in the listing or the counters read as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceBundle {
    #[serde(default, deserialize_with = "listing")]
    pub resources_by_format: BTreeMap<String, Vec<Value>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_count: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub breakdown: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Set only on the local substitute used when the agent is unavailable.
    #[serde(skip)]
    pub fallback: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// A format whose value is not an array contributes no resources.
fn listing<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(format, value)| match value {
            Value::Array(items) => (format, items),
            _ => (format, Vec::new()),
        })
        .collect())
}

impl ResourceBundle {
    /// An empty bundle with every known format present.
    pub fn empty() -> Self {
        let mut bundle = Self::default();
        for format in RESOURCE_FORMATS {
            bundle.resources_by_format.insert(format.to_string(), Vec::new());
        }
        bundle.recount();
        bundle
    }

    /// Appends resources of a known format; unknown formats are dropped.
    /// Returns how many were added.
    pub fn merge_format(&mut self, format: &str, resources: Vec<Value>) -> usize {
        match self.resources_by_format.get_mut(format) {
            Some(list) if RESOURCE_FORMATS.contains(&format) => {
                let added = resources.len();
                list.extend(resources);
                added
            }
            _ => 0,
        }
    }

    /// Recomputes `total_count` and `breakdown` from the listing.
    pub fn recount(&mut self) {
        self.breakdown = self
            .resources_by_format
            .iter()
            .map(|(format, list)| (format.clone(), list.len()))
            .collect();
        self.total_count = self.breakdown.values().sum();
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}
