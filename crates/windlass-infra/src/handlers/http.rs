//! `http` step handler: performs a real HTTP request via reqwest.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use windlass_core::context::StepContext;
use windlass_core::handler::{HandlerError, HandlerOutput, StepHandler};
use windlass_types::definition::StepDefinition;

#[derive(Debug, Deserialize)]
struct HttpConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Performs the configured request and returns `{statusCode, data}`, where
/// `data` is the parsed JSON body when possible and the raw text otherwise.
/// Responses with status >= 400 fail the step.
///
/// The client carries its own 30-second timeout: a step timeout abandons the
/// in-flight request rather than cancelling it, so the transport deadline is
/// the real upper bound on background work.
pub struct HttpHandler {
    client: reqwest::Client,
}

impl HttpHandler {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("windlass/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    /// Use a caller-supplied client (custom deadlines, proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl StepHandler for HttpHandler {
    fn step_type(&self) -> &'static str {
        "http"
    }

    fn execute<'a>(
        &'a self,
        step: &'a StepDefinition,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<HandlerOutput, HandlerError>> {
        Box::pin(async move {
            let config: HttpConfig = serde_json::from_value(step.config.clone())
                .map_err(|e| HandlerError::InvalidConfig(e.to_string()))?;

            let method: reqwest::Method = config
                .method
                .parse()
                .map_err(|_| HandlerError::InvalidConfig(format!("invalid HTTP method: {}", config.method)))?;

            let mut request = self.client.request(method, &config.url);
            if let Some(headers) = &config.headers {
                for (key, value) in headers {
                    request = request.header(key.as_str(), value.as_str());
                }
            }
            if let Some(body) = &config.body {
                request = request.body(body.clone());
            }

            let response = request.send().await.map_err(|e| {
                HandlerError::Failed(format!("HTTP request to '{}' failed: {e}", config.url))
            })?;

            let status = response.status().as_u16();
            let text = response.text().await.map_err(|e| {
                HandlerError::Failed(format!("failed to read HTTP response body: {e}"))
            })?;

            if status >= 400 {
                return Err(HandlerError::Failed(format!(
                    "HTTP {status} from {}",
                    config.url
                )));
            }

            let data: Value =
                serde_json::from_str(&text).unwrap_or(Value::String(text));

            tracing::debug!(
                execution_id = %ctx.execution_id,
                step_id = step.id.as_str(),
                url = config.url.as_str(),
                status,
                "http step completed"
            );

            Ok(HandlerOutput::with_next(
                json!({"statusCode": status, "data": data}),
                step,
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use uuid::Uuid;

    /// Minimal canned-response HTTP listener for exercising the handler
    /// without network access.
    async fn spawn_server(status_line: &'static str, body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn http_step(config: Value) -> StepDefinition {
        StepDefinition {
            id: "fetch-data".to_string(),
            step_type: "http".to_string(),
            config,
            next: Some("after".to_string()),
            on_error: None,
            timeout_ms: None,
            retry: None,
        }
    }

    fn ctx() -> StepContext {
        StepContext::new(Uuid::now_v7(), serde_json::Map::new())
    }

    #[tokio::test]
    async fn test_get_200_parses_json_body() {
        let url = spawn_server("200 OK", r#"{"items": [1, 2, 3]}"#).await;
        let step = http_step(json!({"url": url}));

        let out = HttpHandler::new().execute(&step, &ctx()).await.unwrap();
        assert_eq!(out.output["statusCode"], json!(200));
        assert_eq!(out.output["data"]["items"], json!([1, 2, 3]));
        assert_eq!(out.next.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_non_json_body_returned_as_text() {
        let url = spawn_server("200 OK", "plain text response").await;
        let step = http_step(json!({"url": url}));

        let out = HttpHandler::new().execute(&step, &ctx()).await.unwrap();
        assert_eq!(out.output["data"], json!("plain text response"));
    }

    #[tokio::test]
    async fn test_500_fails_the_step() {
        let url = spawn_server("500 Internal Server Error", "{}").await;
        let step = http_step(json!({"url": url}));

        let err = HttpHandler::new().execute(&step, &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_404_fails_the_step() {
        let url = spawn_server("404 Not Found", "{}").await;
        let step = http_step(json!({"url": url, "method": "POST", "body": "{}"}));

        let err = HttpHandler::new().execute(&step, &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn test_invalid_method_is_config_error() {
        let step = http_step(json!({"url": "http://127.0.0.1:1", "method": "NOT A METHOD"}));
        let err = HttpHandler::new().execute(&step, &ctx()).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_fails() {
        // Port 1 is essentially never listening.
        let step = http_step(json!({"url": "http://127.0.0.1:1/nope"}));
        let err = HttpHandler::new().execute(&step, &ctx()).await.unwrap_err();
        assert!(err.to_string().contains("failed"));
    }

    #[tokio::test]
    async fn test_missing_url_is_config_error() {
        let step = http_step(json!({"method": "GET"}));
        let err = HttpHandler::new().execute(&step, &ctx()).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidConfig(_)));
    }
}
