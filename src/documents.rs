//! Client for the document analysis endpoint, which estimates how much of an
//! uploaded document was produced by an AI model.
//!
//! Like the resources agent, a failed analysis never surfaces as an error:
//! the caller gets a [`DocumentAnalysis`] flagged as a fallback with a 0%
//! estimate and the reason it could not be computed.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DocumentsConfig;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected analysis response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("analysis response has no numeric ai_percentage")]
    MissingPercentage,
}

/// Result of analyzing one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentAnalysis {
    /// Estimated share of AI-generated content, 0–100.
    pub ai_percentage: f64,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Full service answer; null for fallbacks.
    pub raw: Value,
}

impl DocumentAnalysis {
    fn fallback(reason: String) -> Self {
        Self {
            ai_percentage: 0.0,
            fallback: true,
            reason: Some(reason),
            raw: Value::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentAnalyzer {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DocumentAnalyzer {
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

    pub fn from_config(config: &DocumentsConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.url.clone(), Duration::from_secs(config.timeout_secs))
    }

    /// Uploads `bytes` as the multipart field `file` and reads back the
    /// AI-content estimate.
    pub async fn analyze(&self, file_name: &str, bytes: Vec<u8>) -> DocumentAnalysis {
        info!(file = file_name, size = bytes.len(), "submitting document for analysis");
        match self.submit(file_name, bytes).await {
            Ok(analysis) => {
                info!(file = file_name, ai_percentage = analysis.ai_percentage, "document analyzed");
                analysis
            }
            Err(err) => {
                warn!(file = file_name, error = %err, "document analysis failed, using fallback");
                DocumentAnalysis::fallback(err.to_string())
            }
        }
    }

    /// Reads the file at `path` and analyzes it. Only reading the file can
    /// fail.
    pub async fn analyze_path(&self, path: &Path) -> std::io::Result<DocumentAnalysis> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document");
        Ok(self.analyze(file_name, bytes).await)
    }

    async fn submit(&self, file_name: &str, bytes: Vec<u8>) -> Result<DocumentAnalysis, AnalysisError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = serde_json::from_str(&body)?;
        let ai_percentage = raw
            .get("ai_percentage")
            .and_then(Value::as_f64)
            .ok_or(AnalysisError::MissingPercentage)?
            .clamp(0.0, 100.0);

        Ok(DocumentAnalysis {
            ai_percentage,
            fallback: false,
            reason: None,
            raw,
        })
    }
}
