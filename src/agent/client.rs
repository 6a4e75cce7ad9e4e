use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::error::AgentError;
use super::types::{RESOURCE_FORMATS, ResourceBundle, ResourceRequest, RiskLevel};
use crate::config::AgentConfig;

/// Client for the agent that suggests study resources per topic.
///
/// Every public call yields a usable [`ResourceBundle`]: when the agent is
/// unreachable or answers badly, a canned bundle pointing at well-known
/// learning sites is returned instead.
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.url.clone(), Duration::from_secs(config.timeout_secs))
    }

    /// Resources for one topic, or the fallback bundle for its subject.
    pub async fn resources_for_topic(&self, req: &ResourceRequest) -> ResourceBundle {
        info!(
            student = %req.student_name,
            subject = %req.subject,
            risk_level = %req.risk_level,
            "requesting resources from agent"
        );

        match self.fetch(req).await {
            Ok(bundle) => {
                info!(
                    subject = %req.subject,
                    resources = bundle.total_count,
                    "resources received from agent"
                );
                bundle
            }
            Err(err @ AgentError::Network(_)) => {
                error!(error = %err, url = %self.base_url, "could not reach agent");
                fallback_resources(&req.subject)
            }
            Err(err) => {
                warn!(error = %err, "agent returned an unusable answer");
                fallback_resources(&req.subject)
            }
        }
    }

    /// Gathers resources for every failed topic into one listing keyed by
    /// the known formats. `failed_topics` pairs a topic with its error rate.
    pub async fn resources_for_failed_topics(
        &self,
        failed_topics: &[(String, f64)],
        student_name: &str,
        grade_0_100: f64,
    ) -> ResourceBundle {
        let mut all = ResourceBundle::empty();

        for (topic, error_rate) in failed_topics {
            let req = ResourceRequest::new(
                student_name,
                topic.as_str(),
                grade_0_100,
                RiskLevel::from_error_rate(*error_rate),
                None,
            );
            let bundle = self.resources_for_topic(&req).await;
            for (format, resources) in bundle.resources_by_format {
                all.merge_format(&format, resources);
            }
        }

        all.recount();
        all
    }

    async fn fetch(&self, req: &ResourceRequest) -> Result<ResourceBundle, AgentError> {
        let response = self
            .client
            .post(format!("{}/api/resources", self.base_url))
            .timeout(self.timeout)
            .json(req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut bundle: ResourceBundle = serde_json::from_str(&body)?;
        if bundle.breakdown.is_empty() {
            bundle.recount();
        }
        Ok(bundle)
    }
}

fn resource(title: String, url: &str, source: &str, description: String, kind: &str, emoji: &str) -> Value {
    json!({
        "title": title,
        "url": url,
        "source": source,
        "description": description,
        "type": kind,
        "emoji": emoji,
    })
}

/// Canned suggestions used when the agent is not available.
pub fn fallback_resources(subject: &str) -> ResourceBundle {
    let mut by_format: BTreeMap<String, Vec<Value>> = RESOURCE_FORMATS
        .iter()
        .map(|f| (f.to_string(), Vec::new()))
        .collect();

    let entries = [
        (
            "videos",
            resource(
                format!("Search '{subject}' on Khan Academy"),
                "https://www.khanacademy.org/",
                "Khan Academy",
                format!("Educational videos about {subject}"),
                "video",
                "📺",
            ),
        ),
        (
            "articles",
            resource(
                format!("Article about {subject} on Wikipedia"),
                "https://www.wikipedia.org/",
                "Wikipedia",
                format!("Open encyclopedia with information about {subject}"),
                "article",
                "📄",
            ),
        ),
        (
            "exercises",
            resource(
                format!("{subject} exercises"),
                "https://www.codewars.com/",
                "CodeWars",
                "Practice platform with interactive exercises".to_string(),
                "exercise",
                "🎯",
            ),
        ),
        (
            "communities",
            resource(
                "Learning community".to_string(),
                "https://www.reddit.com/r/learningprogramming/",
                "Reddit",
                "Community to ask questions and share resources".to_string(),
                "community",
                "👥",
            ),
        ),
    ];
    for (format, entry) in entries {
        if let Some(list) = by_format.get_mut(format) {
            list.push(entry);
        }
    }

    let mut bundle = ResourceBundle {
        resources_by_format: by_format,
        note: Some("Suggested resources (agent unavailable)".to_string()),
        fallback: true,
        ..ResourceBundle::default()
    };
    bundle.recount();
    bundle
}
