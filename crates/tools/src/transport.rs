//! HTTP transport used by the dispatcher.
//!
//! The dispatcher owns timeout and retry policy; a transport only moves one
//! JSON body to one URL and reports what came back.

use async_trait::async_trait;
use std::time::Duration;

/// Raw response from a tool service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failures below the HTTP status level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    /// The request could not be built, e.g. the endpoint is not a URL.
    /// Retrying cannot help.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be decoded as text.
    #[error("undecodable response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Connect(e.to_string())
        }
    }
}

#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// `timeout` caps a single attempt at the socket level.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

#[async_trait]
impl ToolTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn posts_json_and_reads_status() {
        let app = Router::new()
            .route(
                "/invoke",
                post(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                    axum::Json(serde_json::json!({ "echo": body["tool_name"] }))
                }),
            )
            .route("/busy", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = serve(app).await;
        let transport = ReqwestTransport::new(Duration::from_secs(5));

        let ok = transport
            .post_json(&format!("{base}/invoke"), &serde_json::json!({"tool_name": "quiz"}))
            .await
            .unwrap();
        assert_eq!(ok.status, 200);
        assert!(ok.body.contains("quiz"));

        let busy = transport
            .post_json(&format!("{base}/busy"), &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(busy.status, 503);
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(2));
        let err = transport
            .post_json("http://127.0.0.1:1/invoke", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect(_) | TransportError::Timeout));
    }

    #[tokio::test]
    async fn unparseable_url_is_invalid_request() {
        let transport = ReqwestTransport::new(Duration::from_secs(2));
        let err = transport
            .post_json("not a url at all", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
