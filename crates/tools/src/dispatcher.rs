//! HTTP tool dispatcher — timeout, single retry, failure normalization.
//!
//! Retry policy:
//! - connection error, timeout, or 5xx: retried once after a short pause
//! - 4xx: surfaced immediately as a contract mismatch
//! - unusable endpoint URL: surfaced immediately as not configured
//! - 2xx with `success: false`: surfaced as a tool-reported failure

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tutorflow_core::error::DispatchError;
use tutorflow_core::tool::{ToolDispatcher, ToolRequest, ToolResponse};

use crate::transport::{ReqwestTransport, ToolTransport, TransportError};

/// Total attempts per dispatch: the first try plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Dispatches tool requests over HTTP.
pub struct HttpToolDispatcher {
    transport: Arc<dyn ToolTransport>,
    attempt_timeout: Duration,
    retry_pause: Duration,
}

/// What one attempt produced.
enum Attempt {
    Done(Result<ToolResponse, DispatchError>),
    Transient(String),
}

impl HttpToolDispatcher {
    pub fn new(
        transport: Arc<dyn ToolTransport>,
        attempt_timeout: Duration,
        retry_pause: Duration,
    ) -> Self {
        Self {
            transport,
            attempt_timeout,
            retry_pause,
        }
    }

    /// A dispatcher over a real HTTP client.
    pub fn over_http(attempt_timeout: Duration, retry_pause: Duration) -> Self {
        Self::new(
            Arc::new(ReqwestTransport::new(attempt_timeout)),
            attempt_timeout,
            retry_pause,
        )
    }

    async fn attempt(&self, request: &ToolRequest, body: &Value) -> Attempt {
        let tool_id = request.tool_id.as_str();
        let call = self.transport.post_json(&request.endpoint, body);

        let response = match tokio::time::timeout(self.attempt_timeout, call).await {
            Err(_) => return Attempt::Transient("timed out".into()),
            Ok(Err(TransportError::Timeout)) => return Attempt::Transient("timed out".into()),
            Ok(Err(TransportError::Connect(cause))) => return Attempt::Transient(cause),
            Ok(Err(TransportError::InvalidRequest(cause))) => {
                warn!(tool = %tool_id, endpoint = %request.endpoint, cause = %cause, "Tool endpoint unusable");
                return Attempt::Done(Err(DispatchError::NotConfigured(tool_id.to_string())));
            }
            Ok(Err(TransportError::Decode(cause))) => {
                return Attempt::Done(Err(DispatchError::Malformed {
                    tool_id: tool_id.to_string(),
                    cause,
                }));
            }
            Ok(Ok(response)) => response,
        };

        match response.status {
            200..=299 => Attempt::Done(interpret_body(tool_id, &response.body)),
            400..=499 => Attempt::Done(Err(DispatchError::Rejected {
                tool_id: tool_id.to_string(),
                status: response.status,
                body: truncate(&response.body, 500),
            })),
            500..=599 => Attempt::Transient(format!("status {}", response.status)),
            other => Attempt::Done(Err(DispatchError::Malformed {
                tool_id: tool_id.to_string(),
                cause: format!("unexpected status {other}"),
            })),
        }
    }
}

#[async_trait]
impl ToolDispatcher for HttpToolDispatcher {
    async fn dispatch(&self, request: &ToolRequest) -> Result<ToolResponse, DispatchError> {
        let tool_id = request.tool_id.as_str();
        if request.endpoint.trim().is_empty() {
            return Err(DispatchError::NotConfigured(tool_id.to_string()));
        }

        let body = request.wire_body();
        let mut last_cause = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            debug!(tool = %tool_id, attempt, endpoint = %request.endpoint, "Dispatching to tool");

            match self.attempt(request, &body).await {
                Attempt::Done(result) => {
                    if let Err(e) = &result {
                        warn!(tool = %tool_id, attempt, error = %e, "Tool call failed");
                    } else {
                        info!(tool = %tool_id, attempt, "Tool call succeeded");
                    }
                    return result;
                }
                Attempt::Transient(cause) => {
                    warn!(tool = %tool_id, attempt, cause = %cause, "Transient tool failure");
                    last_cause = cause;
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(self.retry_pause).await;
                    }
                }
            }
        }

        Err(DispatchError::Transient {
            tool_id: tool_id.to_string(),
            attempts: MAX_ATTEMPTS,
            cause: last_cause,
        })
    }
}

/// Turn a 2xx body into content.
///
/// `{"success": true, "data": ...}` yields `data`; `{"success": false}` is a
/// tool-reported failure; any other JSON value is content as-is.
pub fn interpret_body(tool_id: &str, body: &str) -> Result<ToolResponse, DispatchError> {
    let value: Value = serde_json::from_str(body).map_err(|e| DispatchError::Malformed {
        tool_id: tool_id.to_string(),
        cause: e.to_string(),
    })?;

    let content = match value.get("success").and_then(Value::as_bool) {
        Some(false) => {
            let message = value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("no reason given")
                .to_string();
            return Err(DispatchError::ToolFailed {
                tool_id: tool_id.to_string(),
                message,
            });
        }
        Some(true) => value.get("data").cloned().unwrap_or(Value::Null),
        None => value,
    };

    Ok(ToolResponse {
        tool_id: tool_id.into(),
        content,
    })
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tutorflow_core::context::EducationalContext;
    use tutorflow_core::profile::LearningProfile;
    use tutorflow_core::schema::ParameterSet;

    /// Replays a fixed script of outcomes and counts calls.
    struct ScriptedTransport {
        script: Mutex<Vec<Result<TransportResponse, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(mut script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolTransport for ScriptedTransport {
        async fn post_json(
            &self,
            _url: &str,
            _body: &Value,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(TransportError::Connect("script exhausted".into())))
        }
    }

    /// Never answers.
    struct HangingTransport;

    #[async_trait]
    impl ToolTransport for HangingTransport {
        async fn post_json(
            &self,
            _url: &str,
            _body: &Value,
        ) -> Result<TransportResponse, TransportError> {
            std::future::pending().await
        }
    }

    fn status(code: u16, body: &str) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status: code,
            body: body.into(),
        })
    }

    fn request() -> ToolRequest {
        ToolRequest {
            tool_id: "quiz".into(),
            endpoint: "http://localhost:8004/invoke".into(),
            parameters: ParameterSet::new(),
            context: EducationalContext::default(),
            profile: LearningProfile::default_for("u1"),
            history: vec![],
        }
    }

    fn dispatcher(transport: Arc<dyn ToolTransport>) -> HttpToolDispatcher {
        HttpToolDispatcher::new(transport, Duration::from_secs(1), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn success_unwraps_data() {
        let transport = ScriptedTransport::new(vec![status(
            200,
            r#"{"success": true, "data": {"questions": [1, 2]}}"#,
        )]);
        let response = dispatcher(transport.clone()).dispatch(&request()).await.unwrap();
        assert_eq!(response.content["questions"][1], 2);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn retries_once_on_503_then_gives_up() {
        let transport = ScriptedTransport::new(vec![status(503, ""), status(503, "")]);
        let err = dispatcher(transport.clone())
            .dispatch(&request())
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 2);
        match err {
            DispatchError::Transient {
                tool_id, attempts, ..
            } => {
                assert_eq!(tool_id, "quiz");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected transient, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_can_recover() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".into())),
            status(200, r#"{"notes": "..."}"#),
        ]);
        let response = dispatcher(transport.clone()).dispatch(&request()).await.unwrap();
        assert_eq!(response.content["notes"], "...");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn no_retry_on_4xx() {
        let transport = ScriptedTransport::new(vec![status(422, "num_questions out of range")]);
        let err = dispatcher(transport.clone())
            .dispatch(&request())
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert!(matches!(err, DispatchError::Rejected { status: 422, .. }));
    }

    #[tokio::test]
    async fn tool_reported_failure_not_retried() {
        let transport =
            ScriptedTransport::new(vec![status(200, r#"{"success": false, "error": "model down"}"#)]);
        let err = dispatcher(transport.clone())
            .dispatch(&request())
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert!(matches!(err, DispatchError::ToolFailed { ref message, .. } if message == "model down"));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let transport = ScriptedTransport::new(vec![status(200, "<html>oops</html>")]);
        let err = dispatcher(transport).dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Malformed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_tool_times_out_twice() {
        let dispatcher = HttpToolDispatcher::new(
            Arc::new(HangingTransport),
            Duration::from_secs(20),
            Duration::from_millis(250),
        );
        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Transient { attempts: 2, ref cause, .. } if cause == "timed out"
        ));
    }

    #[tokio::test]
    async fn empty_endpoint_not_configured() {
        let transport = ScriptedTransport::new(vec![]);
        let mut req = request();
        req.endpoint = String::new();
        let err = dispatcher(transport.clone()).dispatch(&req).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotConfigured(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_request_not_retried() {
        let transport =
            ScriptedTransport::new(vec![Err(TransportError::InvalidRequest("relative URL".into()))]);
        let err = dispatcher(transport.clone()).dispatch(&request()).await.unwrap_err();
        assert_eq!(transport.calls(), 1);
        assert!(matches!(err, DispatchError::NotConfigured(ref id) if id == "quiz"));
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Decode("bad utf-8".into()))]);
        let err = dispatcher(transport.clone()).dispatch(&request()).await.unwrap_err();
        assert_eq!(transport.calls(), 1);
        assert!(matches!(err, DispatchError::Malformed { .. }));
    }

    #[tokio::test]
    async fn garbage_endpoint_fails_without_retry() {
        let dispatcher =
            HttpToolDispatcher::over_http(Duration::from_secs(2), Duration::from_millis(1));
        let mut req = request();
        req.endpoint = "not a url at all".into();
        let err = dispatcher.dispatch(&req).await.unwrap_err();
        assert!(!matches!(err, DispatchError::Transient { .. }));
        assert!(matches!(err, DispatchError::NotConfigured(_)));
    }

    #[test]
    fn plain_object_is_content() {
        let response = interpret_body("flashcard", r#"{"cards": []}"#).unwrap();
        assert_eq!(response.content, serde_json::json!({"cards": []}));
        assert_eq!(response.tool_id.as_str(), "flashcard");
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("abcdef", 3), "abc…");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
