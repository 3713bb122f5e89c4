//! HTTP action executor
//!
//! Posts resolved actions to the farm-records backend and maps the reply
//! onto [`ExecutionError::Transient`] / [`ExecutionError::Permanent`].

use std::time::Duration;

use async_trait::async_trait;
use farmhand_config::ExecutorConfig;
use farmhand_core::{
    Action, ActionExecutor, ActionResult, ConnectivityProbe, ExecutionContext, ExecutionError,
};
use reqwest::{Client, StatusCode};
use serde::Serialize;

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    id: uuid::Uuid,
    intent: farmhand_core::Intent,
    parameters: serde_json::Map<String, serde_json::Value>,
    context: &'a ExecutionContext,
}

/// Map a non-success status to the retry class
fn classify_status(status: StatusCode, body: &str) -> ExecutionError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };

    // 408 and 429 clear up on their own
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        ExecutionError::Transient(detail)
    } else {
        ExecutionError::Permanent(detail)
    }
}

pub struct HttpActionExecutor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_ms: u64,
}

impl HttpActionExecutor {
    pub fn new(config: &ExecutorConfig) -> Result<Self, ExecutionError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExecutionError::Permanent(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_ms: config.timeout_ms,
        })
    }
}

#[async_trait]
impl ActionExecutor for HttpActionExecutor {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, ExecutionError> {
        let body = ExecuteRequest {
            id: action.id,
            intent: action.intent,
            parameters: action.parameters.to_json_map(),
            context: ctx,
        };

        let mut request = self
            .client
            .post(format!("{}/actions", self.endpoint))
            .header("Idempotency-Key", action.idempotency_key.to_string())
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExecutionError::timeout(self.timeout_ms)
            } else {
                ExecutionError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(
                action_id = %action.id,
                intent = %action.intent,
                status = status.as_u16(),
                "Action rejected by executor"
            );
            return Err(classify_status(status, &text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExecutionError::Transient(e.to_string()))?;

        // Backends that answer 2xx without a body still count as done
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| ActionResult::ok(text.trim())))
    }
}

/// Polls the executor's health URL
pub struct HttpConnectivityProbe {
    client: Client,
    health_url: String,
}

impl HttpConnectivityProbe {
    pub fn new(config: &ExecutorConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.connectivity_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            health_url: config.health_url.clone(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn is_online(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, url = %self.health_url, "Executor unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::NaiveDate;
    use farmhand_core::{ExtractedParameters, Intent, Provenance, SlotName, SlotValue};
    use std::net::SocketAddr;

    async fn spawn(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn config(addr: SocketAddr) -> ExecutorConfig {
        ExecutorConfig {
            endpoint: format!("http://{}", addr),
            health_url: format!("http://{}/health", addr),
            api_key: Some("secret".to_string()),
            timeout_ms: 500,
            connectivity_timeout_ms: 500,
        }
    }

    fn sale() -> Action {
        let mut params = ExtractedParameters::new();
        params.insert(SlotName::Amount, SlotValue::Number(800_000.0), Provenance::Text);
        Action::new(Intent::CreateSale, params)
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("farm-1", "user-1", NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(!classify_status(StatusCode::UNPROCESSABLE_ENTITY, "bad amount").is_transient());
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "no such record").to_string(),
            "permanent failure: 404 Not Found: no such record"
        );
    }

    #[tokio::test]
    async fn test_execute_posts_action_with_idempotency_key() {
        let router = Router::new().route(
            "/actions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let key = headers
                    .get("idempotency-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(serde_json::json!({
                    "success": true,
                    "message": "saved",
                    "data": { "key": key, "auth": auth, "body": body }
                }))
            }),
        );
        let addr = spawn(router).await;
        let executor = HttpActionExecutor::new(&config(addr)).unwrap();
        let action = sale();

        let result = executor.execute(&action, &ctx()).await.unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["key"], action.idempotency_key.to_string());
        assert_eq!(data["auth"], "Bearer secret");
        assert_eq!(data["body"]["parameters"]["amount"], 800_000.0);
        assert_eq!(data["body"]["context"]["tenant_id"], "farm-1");
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let router = Router::new().route(
            "/actions",
            post(|| async { (axum::http::StatusCode::BAD_REQUEST, "amount must be positive") }),
        );
        let addr = spawn(router).await;
        let executor = HttpActionExecutor::new(&config(addr)).unwrap();

        let err = executor.execute(&sale(), &ctx()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Permanent(msg) if msg.contains("amount must be positive")));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let router = Router::new().route(
            "/actions",
            post(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
        );
        let addr = spawn(router).await;
        let executor = HttpActionExecutor::new(&config(addr)).unwrap();

        assert!(executor.execute(&sale(), &ctx()).await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_as_transient() {
        let router = Router::new().route(
            "/actions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        );
        let addr = spawn(router).await;
        let executor = HttpActionExecutor::new(&config(addr)).unwrap();

        let err = executor.execute(&sale(), &ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "transient failure: timed out after 500ms");
    }

    #[tokio::test]
    async fn test_plain_body_counts_as_success() {
        let router = Router::new().route("/actions", post(|| async { "ok" }));
        let addr = spawn(router).await;
        let executor = HttpActionExecutor::new(&config(addr)).unwrap();

        let result = executor.execute(&sale(), &ctx()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.message, "ok");
    }

    #[tokio::test]
    async fn test_connectivity_check() {
        let router = Router::new().route("/health", get(|| async { "up" }));
        let addr = spawn(router).await;
        let online = HttpConnectivityProbe::new(&config(addr)).unwrap();
        assert!(online.is_online().await);

        let mut unreachable = config(addr);
        unreachable.health_url = "http://127.0.0.1:1/health".to_string();
        let offline = HttpConnectivityProbe::new(&unreachable).unwrap();
        assert!(!offline.is_online().await);
    }
}
