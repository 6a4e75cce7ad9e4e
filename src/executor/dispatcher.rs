use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::transport::{ReqwestTransport, Transport};
use super::types::{
    DispatchResult, EndpointRegistry, ExecutionMode, HEALTH_ENDPOINT, Operation, RetryPolicy,
};
use crate::config::Config;
use crate::error::{ConfigError, DispatchError, ExecutorError};

/// Immutable settings of an [`MlExecutor`], fixed at construction.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub mode: ExecutionMode,
    /// Base URL; endpoint paths are appended verbatim.
    pub base_url: String,
    pub endpoints: EndpointRegistry,
    pub retry: RetryPolicy,
    pub api_token: Option<String>,
    /// Reserved for local execution, which is a stub.
    pub local_timeout: Duration,
    pub remote_timeout: Duration,
}

impl ExecutorSettings {
    /// Validates the loaded configuration into executor settings.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mode = config.mode()?;
        let base_url = config.service_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyServiceUrl);
        }
        let retry = RetryPolicy::new(
            config.retries.enabled,
            config.retries.attempts,
            config.retries.delay_ms,
        )?;

        Ok(Self {
            mode,
            base_url,
            endpoints: EndpointRegistry::new(config.endpoint_map()),
            retry,
            api_token: config.bearer_token(),
            local_timeout: config.subprocess_timeout(),
            remote_timeout: config.http_timeout(),
        })
    }
}

/// Resolves logical ML operations to an execution strategy and runs them.
///
/// The executor holds no per-call state: every [`invoke`](Self::invoke) is
/// independent, so one instance can be shared between tasks.
#[derive(Debug)]
pub struct MlExecutor<T = ReqwestTransport> {
    settings: ExecutorSettings,
    transport: T,
}

impl MlExecutor<ReqwestTransport> {
    /// Builds an executor over `reqwest` from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ExecutorError> {
        let settings = ExecutorSettings::from_config(config)?;
        let transport = ReqwestTransport::new()?;
        Ok(Self::new(settings, transport))
    }
}

impl<T: Transport> MlExecutor<T> {
    pub fn new(settings: ExecutorSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn mode(&self) -> ExecutionMode {
        self.settings.mode
    }

    /// Runs the named operation with `payload` and normalizes the outcome.
    ///
    /// Never panics: unknown operations, unsupported local execution, HTTP
    /// rejections and exhausted retries all come back as `Err`.
    pub async fn invoke(&self, operation: &str, payload: &Value) -> DispatchResult {
        let Some(path) = self.settings.endpoints.get(operation) else {
            warn!(operation, "no endpoint registered for operation");
            return Err(DispatchError::EndpointNotFound(operation.to_string()));
        };

        info!(operation, mode = %self.settings.mode, "ML operation started");

        let result = match self.settings.mode {
            ExecutionMode::Local => self.execute_local(operation),
            ExecutionMode::Remote => self.execute_remote(operation, path, payload).await,
            ExecutionMode::RemoteWithLocalFallback => match self.execute_local(operation) {
                Ok(value) => Ok(value),
                Err(err) => {
                    warn!(operation, error = %err, "local execution failed, falling back to remote");
                    self.execute_remote(operation, path, payload).await
                }
            },
        };

        if let Err(err) = &result {
            error!(operation, error = %err, "ML operation failed");
        }
        result
    }

    /// Typed entry point for one of the known operations.
    pub async fn run(&self, operation: Operation, payload: &Value) -> DispatchResult {
        debug!(operation = operation.label(), "dispatching");
        self.invoke(operation.key(), payload).await
    }

    pub async fn predict_risk(&self, student_data: &Value) -> DispatchResult {
        self.run(Operation::RiskPrediction, student_data).await
    }

    pub async fn recommend_careers(&self, student_data: &Value) -> DispatchResult {
        self.run(Operation::CareerRecommendation, student_data).await
    }

    pub async fn predict_trends(&self, student_data: &Value) -> DispatchResult {
        self.run(Operation::TrendPrediction, student_data).await
    }

    pub async fn predict_progress(&self, student_data: &Value) -> DispatchResult {
        self.run(Operation::ProgressPrediction, student_data).await
    }

    pub async fn cluster_kmeans(&self, student_data: &Value) -> DispatchResult {
        self.run(Operation::KMeansClustering, student_data).await
    }

    pub async fn detect_anomalies(&self, student_data: &Value) -> DispatchResult {
        self.run(Operation::AnomalyDetection, student_data).await
    }

    pub async fn predict_lstm(&self, student_data: &Value) -> DispatchResult {
        self.run(Operation::LstmPrediction, student_data).await
    }

    /// `true` when the service answers its health endpoint with 2xx. Local
    /// mode has nothing to probe and is always healthy.
    pub async fn health_check(&self) -> bool {
        if self.settings.mode == ExecutionMode::Local {
            return true;
        }

        let Some(path) = self.settings.endpoints.get(HEALTH_ENDPOINT) else {
            warn!("no health endpoint configured");
            return false;
        };
        let url = format!("{}{}", self.settings.base_url, path);

        match self.transport.get(&url, self.settings.remote_timeout).await {
            Ok(reply) => {
                if !reply.is_success() {
                    warn!(%url, status = reply.status, "ML service health check failed");
                }
                reply.is_success()
            }
            Err(err) => {
                warn!(%url, error = %err, "ML service health check failed");
                false
            }
        }
    }

    fn execute_local(&self, operation: &str) -> DispatchResult {
        debug!(
            operation,
            timeout_ms = self.settings.local_timeout.as_millis() as u64,
            "local execution requested"
        );
        Err(DispatchError::LocalUnsupported)
    }

    async fn execute_remote(&self, operation: &str, path: &str, payload: &Value) -> DispatchResult {
        let url = format!("{}{}", self.settings.base_url, path);
        let attempts = self.settings.retry.attempts();
        let bearer = self.settings.api_token.as_deref();

        for attempt in 1..=attempts {
            debug!(%url, attempt, max_attempts = attempts, "POST to ML service");

            let err = match self
                .transport
                .post_json(&url, payload, bearer, self.settings.remote_timeout)
                .await
            {
                Ok(reply) if reply.is_success() => {
                    info!(operation, attempt, "ML operation completed");
                    return parse_body(&reply.body);
                }
                Ok(reply) => {
                    warn!(
                        operation,
                        attempt,
                        status = reply.status,
                        body = %reply.body,
                        "ML service returned an error status"
                    );
                    DispatchError::Http {
                        status: reply.status,
                        body: reply.body,
                    }
                }
                Err(err) => {
                    warn!(operation, attempt, error = %err, "request to ML service failed");
                    DispatchError::Connection(err.to_string())
                }
            };

            if err.is_retryable() && attempt < attempts {
                sleep(self.settings.retry.delay()).await;
                continue;
            }
            return Err(err);
        }

        Err(DispatchError::Exhausted(attempts))
    }
}

// An empty 2xx body decodes to null.
fn parse_body(body: &str) -> DispatchResult {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| DispatchError::InvalidJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::executor::transport::HttpReply;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Instant;

    type Reply = Result<HttpReply, TransportError>;

    /// Plays back scripted replies, repeating the last one once the script
    /// runs out, and records every outbound call.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Reply>>,
        last: Reply,
        calls: Mutex<Vec<Call>>,
    }

    #[derive(Debug, Clone)]
    struct Call {
        url: String,
        bearer: Option<String>,
        body: Option<Value>,
        at: Instant,
    }

    impl ScriptedTransport {
        fn always(reply: Reply) -> Self {
            Self::sequence(vec![reply])
        }

        fn sequence(replies: Vec<Reply>) -> Self {
            let last = replies
                .last()
                .cloned()
                .unwrap_or_else(|| Ok(HttpReply::new(200, "null")));
            Self {
                script: Mutex::new(replies.into()),
                last,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn next(&self, call: Call) -> Reply {
            self.calls.lock().unwrap().push(call);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.last.clone())
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn post_json(
            &self,
            url: &str,
            body: &Value,
            bearer: Option<&str>,
            _timeout: Duration,
        ) -> Result<HttpReply, TransportError> {
            self.next(Call {
                url: url.to_string(),
                bearer: bearer.map(str::to_string),
                body: Some(body.clone()),
                at: Instant::now(),
            })
        }

        async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpReply, TransportError> {
            self.next(Call {
                url: url.to_string(),
                bearer: None,
                body: None,
                at: Instant::now(),
            })
        }
    }

    fn settings(mode: ExecutionMode, attempts: u32, delay_ms: u64) -> ExecutorSettings {
        let config = Config {
            service_url: "http://ml.test".into(),
            ..Config::default()
        };
        ExecutorSettings {
            mode,
            retry: RetryPolicy::new(true, attempts, delay_ms).unwrap(),
            ..ExecutorSettings::from_config(&config).unwrap()
        }
    }

    fn executor(mode: ExecutionMode, transport: ScriptedTransport) -> MlExecutor<ScriptedTransport> {
        MlExecutor::new(settings(mode, 3, 5), transport)
    }

    fn ok(body: &str) -> Reply {
        Ok(HttpReply::new(200, body))
    }

    fn status(code: u16, body: &str) -> Reply {
        Ok(HttpReply::new(code, body))
    }

    fn refused() -> Reply {
        Err(TransportError::Connect("connection refused".into()))
    }

    #[tokio::test]
    async fn unknown_operation_makes_no_calls() {
        for mode in [
            ExecutionMode::Local,
            ExecutionMode::Remote,
            ExecutionMode::RemoteWithLocalFallback,
        ] {
            let exec = executor(mode, ScriptedTransport::always(ok("{}")));
            let result = exec.invoke("grade_inflation", &json!({})).await;
            assert_eq!(
                result,
                Err(DispatchError::EndpointNotFound("grade_inflation".into()))
            );
            assert!(exec.transport.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn server_errors_exhaust_all_attempts_with_delay() {
        let exec = MlExecutor::new(
            settings(ExecutionMode::Remote, 3, 25),
            ScriptedTransport::always(status(500, "boom")),
        );

        let result = exec.predict_risk(&json!({"student_id": 1})).await;

        assert_eq!(
            result,
            Err(DispatchError::Http {
                status: 500,
                body: "boom".into()
            })
        );
        let calls = exec.transport.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1].at.duration_since(pair[0].at) >= Duration::from_millis(25));
        }
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let exec = executor(
            ExecutionMode::Remote,
            ScriptedTransport::always(status(400, r#"{"detail":"missing field"}"#)),
        );

        let err = exec.predict_trends(&json!({})).await.unwrap_err();

        assert_eq!(err.to_string(), r#"HTTP 400: {"detail":"missing field"}"#);
        assert_eq!(exec.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let exec = executor(
            ExecutionMode::Remote,
            ScriptedTransport::sequence(vec![
                status(500, "err"),
                status(503, "unavailable"),
                ok(r#"{"cluster": 2}"#),
            ]),
        );

        let value = exec.cluster_kmeans(&json!({"features": [1, 2]})).await.unwrap();

        assert_eq!(value, json!({"cluster": 2}));
        assert_eq!(exec.transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn transport_failures_exhaust_into_connection_error() {
        let exec = executor(ExecutionMode::Remote, ScriptedTransport::always(refused()));

        let err = exec.detect_anomalies(&json!({})).await.unwrap_err();

        assert_eq!(err.to_string(), "connection failed: connection refused");
        assert_eq!(exec.transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn only_retryable_failures_get_another_attempt() {
        let exec = executor(
            ExecutionMode::Remote,
            ScriptedTransport::sequence(vec![refused(), status(502, "bad gateway"), status(304, "")]),
        );

        let err = exec.predict_lstm(&json!({})).await.unwrap_err();

        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "HTTP 304: ");
        assert_eq!(exec.transport.calls().len(), 3);

        let exec = executor(
            ExecutionMode::Remote,
            ScriptedTransport::sequence(vec![status(429, "slow down"), ok("{}")]),
        );
        assert!(exec.predict_lstm(&json!({})).await.is_err());
        assert_eq!(exec.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_then_success_recovers() {
        let exec = executor(
            ExecutionMode::Remote,
            ScriptedTransport::sequence(vec![refused(), ok(r#"{"trend":"up"}"#)]),
        );
        let value = exec.predict_trends(&json!({})).await.unwrap();
        assert_eq!(value, json!({"trend": "up"}));
        assert_eq!(exec.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn disabled_retries_make_one_call() {
        let mut settings = settings(ExecutionMode::Remote, 5, 5);
        settings.retry.enabled = false;
        let exec = MlExecutor::new(settings, ScriptedTransport::always(status(502, "bad gateway")));

        let result = exec.predict_progress(&json!({})).await;

        assert!(matches!(result, Err(DispatchError::Http { status: 502, .. })));
        assert_eq!(exec.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn local_mode_is_unsupported_without_calls() {
        let exec = executor(ExecutionMode::Local, ScriptedTransport::always(ok("{}")));

        let err = exec.predict_lstm(&json!({})).await.unwrap_err();

        assert_eq!(err, DispatchError::LocalUnsupported);
        assert!(err.to_string().contains("not supported"));
        assert!(exec.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn fallback_mode_matches_remote_outcome() {
        let scripts: [fn() -> Vec<Reply>; 5] = [
            || vec![ok(r#"{"risk": 0.4}"#)],
            || vec![status(500, "a"), status(500, "b"), ok(r#"{"risk": 0.9}"#)],
            || vec![status(404, "no such model")],
            || vec![status(500, "x")],
            || vec![refused()],
        ];

        for script in scripts {
            let remote = executor(ExecutionMode::Remote, ScriptedTransport::sequence(script()));
            let hybrid = executor(
                ExecutionMode::RemoteWithLocalFallback,
                ScriptedTransport::sequence(script()),
            );

            let payload = json!({"student_id": 42});
            let expected = remote.predict_risk(&payload).await;
            let actual = hybrid.predict_risk(&payload).await;

            assert_eq!(actual, expected);
            assert_eq!(hybrid.transport.calls().len(), remote.transport.calls().len());
        }
    }

    #[tokio::test]
    async fn request_targets_registered_path_with_payload_and_token() {
        let mut settings = settings(ExecutionMode::Remote, 1, 0);
        settings.api_token = Some("secret".into());
        let exec = MlExecutor::new(settings, ScriptedTransport::always(ok("[]")));
        let payload = json!({"student_id": 9, "grades": [7.5, 8.0]});

        exec.recommend_careers(&payload).await.unwrap();

        let calls = exec.transport.calls();
        assert_eq!(calls[0].url, "http://ml.test/predict/career");
        assert_eq!(calls[0].bearer.as_deref(), Some("secret"));
        assert_eq!(calls[0].body.as_ref(), Some(&payload));
    }

    #[tokio::test]
    async fn no_token_means_no_bearer() {
        let exec = executor(ExecutionMode::Remote, ScriptedTransport::always(ok("{}")));
        exec.predict_risk(&json!({})).await.unwrap();
        assert_eq!(exec.transport.calls()[0].bearer, None);
    }

    #[tokio::test]
    async fn invalid_json_on_success_is_a_failure() {
        let exec = executor(ExecutionMode::Remote, ScriptedTransport::always(ok("<html>")));
        let err = exec.predict_risk(&json!({})).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidJson(_)));
        assert_eq!(exec.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let exec = executor(
            ExecutionMode::Remote,
            ScriptedTransport::always(Ok(HttpReply::new(204, ""))),
        );
        assert_eq!(exec.predict_risk(&json!({})).await, Ok(Value::Null));
    }

    #[tokio::test]
    async fn repeated_invocations_are_identical() {
        let exec = executor(ExecutionMode::Remote, ScriptedTransport::always(ok(r#"{"k": 3}"#)));
        let payload = json!({"students": [1, 2, 3]});

        let first = exec.invoke("kmeans_clustering", &payload).await;
        let second = exec.invoke("kmeans_clustering", &payload).await;

        assert_eq!(first, second);
        assert_eq!(exec.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_invocations_share_the_executor() {
        let exec = executor(ExecutionMode::Remote, ScriptedTransport::always(ok(r#"{"ok": true}"#)));
        let payload = json!({});

        let (a, b) = tokio::join!(exec.predict_risk(&payload), exec.predict_lstm(&payload));

        assert_eq!(a, Ok(json!({"ok": true})));
        assert_eq!(b, Ok(json!({"ok": true})));
        let urls: Vec<String> = exec.transport.calls().into_iter().map(|c| c.url).collect();
        assert!(urls.contains(&"http://ml.test/predict/risk".to_string()));
        assert!(urls.contains(&"http://ml.test/predict/lstm".to_string()));
    }

    #[tokio::test]
    async fn health_check_local_is_true_without_calls() {
        let exec = executor(ExecutionMode::Local, ScriptedTransport::always(refused()));
        assert!(exec.health_check().await);
        assert!(exec.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn health_check_remote_outcomes() {
        let healthy = executor(ExecutionMode::Remote, ScriptedTransport::always(ok("")));
        assert!(healthy.health_check().await);
        assert_eq!(healthy.transport.calls()[0].url, "http://ml.test/health");

        let down = executor(ExecutionMode::Remote, ScriptedTransport::always(status(503, "")));
        assert!(!down.health_check().await);

        let unreachable = executor(
            ExecutionMode::RemoteWithLocalFallback,
            ScriptedTransport::always(Err(TransportError::Timeout("5s".into()))),
        );
        assert!(!unreachable.health_check().await);
        assert_eq!(unreachable.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn health_check_without_endpoint_is_false() {
        let mut settings = settings(ExecutionMode::Remote, 1, 0);
        settings.endpoints = [("risk_predictions", "/predict/risk")].into_iter().collect();
        let exec = MlExecutor::new(settings, ScriptedTransport::always(ok("")));
        assert!(!exec.health_check().await);
        assert!(exec.transport.calls().is_empty());
    }

    #[test]
    fn settings_reject_invalid_config() {
        let config = Config {
            execution_mode: "batch".into(),
            ..Config::default()
        };
        assert_eq!(
            ExecutorSettings::from_config(&config).unwrap_err(),
            ConfigError::UnknownMode("batch".into())
        );

        let mut config = Config::default();
        config.retries.attempts = 0;
        assert_eq!(
            ExecutorSettings::from_config(&config).unwrap_err(),
            ConfigError::ZeroAttempts
        );

        let config = Config {
            service_url: "  ".into(),
            ..Config::default()
        };
        assert_eq!(
            ExecutorSettings::from_config(&config).unwrap_err(),
            ConfigError::EmptyServiceUrl
        );
    }

    #[test]
    fn settings_trim_trailing_slash() {
        let config = Config {
            service_url: "http://ml.test/".into(),
            api_token: "t".into(),
            ..Config::default()
        };
        let settings = ExecutorSettings::from_config(&config).unwrap();
        assert_eq!(settings.base_url, "http://ml.test");
        assert_eq!(settings.api_token.as_deref(), Some("t"));
        assert_eq!(settings.endpoints.get("health"), Some("/health"));
    }

    mod over_http {
        use super::*;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn http_executor(server: &MockServer, mode: ExecutionMode) -> MlExecutor {
            let config = Config {
                execution_mode: mode.to_string(),
                service_url: server.uri(),
                ..Config::default()
            };
            let mut settings = ExecutorSettings::from_config(&config).unwrap();
            settings.retry = RetryPolicy::new(true, 3, 10).unwrap();
            MlExecutor::new(settings, ReqwestTransport::new().unwrap())
        }

        #[tokio::test]
        async fn retries_server_errors_then_succeeds() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/predict/risk"))
                .respond_with(ResponseTemplate::new(503))
                .up_to_n_times(2)
                .expect(2)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/predict/risk"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"risk_level": "HIGH"})),
                )
                .expect(1)
                .mount(&server)
                .await;

            let exec = http_executor(&server, ExecutionMode::RemoteWithLocalFallback).await;
            let value = exec.predict_risk(&json!({"student_id": 3})).await.unwrap();
            assert_eq!(value, json!({"risk_level": "HIGH"}));
        }

        #[tokio::test]
        async fn health_endpoint_is_probed() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/health"))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;

            let exec = http_executor(&server, ExecutionMode::Remote).await;
            assert!(exec.health_check().await);
        }
    }
}
