//! Configuração do executor carregada a partir de `ml-executor.toml`.
//!
//! A struct [`Config`] contém todos os parâmetros do executor e dos dois
//! clientes auxiliares. Chaves ausentes no arquivo usam valores padrão, e
//! algumas variáveis de ambiente têm precedência sobre o arquivo. O arquivo é
//! lido uma vez na inicialização; o executor guarda sua própria cópia imutável.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ExecutorError};
use crate::executor::ExecutionMode;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ml-executor.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `local`, `remote` or `remote_with_local_fallback` (legacy spellings
    /// `subprocess`, `http` and `hybrid` are accepted too).
    #[serde(default = "default_execution_mode")]
    pub execution_mode: String,

    /// Base URL of the ML inference service, without trailing path.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Per-request timeout for remote calls.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Timeout reserved for local execution. Local mode is a stub, so this
    /// is carried but never waited on.
    #[serde(default = "default_subprocess_timeout_secs")]
    pub subprocess_timeout_secs: u64,

    /// Bearer token; empty means no `Authorization` header.
    #[serde(default)]
    pub api_token: String,

    #[serde(default)]
    pub retries: RetriesConfig,

    /// Operation name → relative path. Entries here override the built-in
    /// defaults of [`default_endpoints`].
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub documents: DocumentsConfig,
}

/// `[retries]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct RetriesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

/// `[agent]` table: the educational resources agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_url")]
    pub url: String,
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[documents]` table: the document analysis endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_url")]
    pub url: String,
    #[serde(default = "default_documents_timeout_secs")]
    pub timeout_secs: u64,
}

// Valor padrão para o modo de execução: "remote".
fn default_execution_mode() -> String {
    "remote".to_string()
}

// Valor padrão para a URL do serviço de ML: localhost:8001.
fn default_service_url() -> String {
    "http://localhost:8001".to_string()
}

// Valor padrão para o timeout HTTP: 30s.
fn default_http_timeout_secs() -> u64 {
    30
}

// Valor padrão para o timeout de execução local: 300s.
fn default_subprocess_timeout_secs() -> u64 {
    300
}

// Retentativas habilitadas por padrão.
fn default_true() -> bool {
    true
}

// Valor padrão para tentativas máximas: 3.
fn default_attempts() -> u32 {
    3
}

// Valor padrão para o atraso entre tentativas: 1000ms.
fn default_delay_ms() -> u64 {
    1000
}

// Valor padrão para a URL do agente de recursos: localhost:8003.
fn default_agent_url() -> String {
    "http://localhost:8003".to_string()
}

// Valor padrão para o timeout do agente: 30s.
fn default_agent_timeout_secs() -> u64 {
    30
}

// Valor padrão para a URL da análise de documentos: localhost:8005.
fn default_documents_url() -> String {
    "http://localhost:8005".to_string()
}

// Valor padrão para o timeout da análise de documentos: 60s.
fn default_documents_timeout_secs() -> u64 {
    60
}

/// Built-in endpoint paths of the inference service.
pub fn default_endpoints() -> BTreeMap<String, String> {
    [
        ("health", "/health"),
        ("risk_predictions", "/predict/risk"),
        ("career_recommendations", "/predict/career"),
        ("trend_predictions", "/predict/trend"),
        ("progress_predictions", "/predict/progress"),
        ("kmeans_clustering", "/clustering/kmeans"),
        ("anomaly_detection", "/anomaly/detect"),
        ("lstm_predictions", "/predict/lstm"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for RetriesConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: default_agent_url(),
            timeout_secs: default_agent_timeout_secs(),
        }
    }
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            url: default_documents_url(),
            timeout_secs: default_documents_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            execution_mode: default_execution_mode(),
            service_url: default_service_url(),
            http_timeout_secs: default_http_timeout_secs(),
            subprocess_timeout_secs: default_subprocess_timeout_secs(),
            api_token: String::new(),
            retries: RetriesConfig::default(),
            endpoints: BTreeMap::new(),
            agent: AgentConfig::default(),
            documents: DocumentsConfig::default(),
        }
    }
}

impl Config {
    /// Loads `path`, or [`DEFAULT_CONFIG_FILE`] when `None`, then applies
    /// environment overrides. A missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ExecutorError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&contents)?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Environment values take precedence over the file; empty values are
    /// ignored. `lookup` is injected so tests need not touch the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(mode) = get("ML_EXECUTION_MODE") {
            self.execution_mode = mode;
        }
        if let Some(url) = get("ML_SERVICE_URL") {
            self.service_url = url;
        }
        if let Some(token) = get("ML_API_TOKEN") {
            self.api_token = token;
        }
        if let Some(url) = get("ML_AGENTE_URL").or_else(|| get("AGENT_API_URL")) {
            self.agent.url = url;
        }
        if let Some(url) = get("DOCUMENT_ANALYSIS_URL") {
            self.documents.url = url;
        }
    }

    /// Parses the configured execution mode.
    pub fn mode(&self) -> Result<ExecutionMode, ConfigError> {
        self.execution_mode.parse()
    }

    /// Built-in endpoints overlaid with the ones from the file.
    pub fn endpoint_map(&self) -> BTreeMap<String, String> {
        let mut endpoints = default_endpoints();
        endpoints.extend(self.endpoints.clone());
        endpoints
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn subprocess_timeout(&self) -> Duration {
        Duration::from_secs(self.subprocess_timeout_secs)
    }

    /// The bearer credential, if one is configured.
    pub fn bearer_token(&self) -> Option<String> {
        let token = self.api_token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}
