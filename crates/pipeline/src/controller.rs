//! The pipeline controller — one chat request from message to reply.
//!
//! Stages run in a fixed order:
//!
//! ```text
//! ReceivedMessage → ProfileResolved → ContextInferred → IntentClassified
//!     → ParametersExtracted → Dispatched → ResponseFormatted
//! ```
//!
//! Any stage may short-circuit to `ErrorFormatted`. Every branch ends in a
//! well-formed [`ChatReply`], and the exchange is appended to the session
//! history exactly once, after the reply is formatted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span, warn};
use tutorflow_config::AppConfig;
use tutorflow_core::context::EducationalContext;
use tutorflow_core::error::DispatchError;
use tutorflow_core::history::ChatHistoryStore;
use tutorflow_core::message::ChatTurn;
use tutorflow_core::profile::{LearningProfile, ProfileProvider, resolve_profile};
use tutorflow_core::tool::{RegistryHandle, ToolDispatcher, ToolIntent, ToolRegistry, ToolRequest};
use tutorflow_tools::HttpToolDispatcher;

use crate::classifier::{ClassificationInput, IntentClassifier, ModelIntentStrategy};
use crate::extractor::{ExtractionInput, ParameterExtractor};
use crate::inference;
use crate::presenter::{self, PresentationHints};

/// An incoming chat request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub session_id: String,
    pub message: String,
    /// Caller-supplied history. When absent, the stored session history is used.
    #[serde(default)]
    pub chat_history: Option<Vec<ChatTurn>>,
}

/// Pipeline states, in the order they are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ReceivedMessage,
    ProfileResolved,
    ContextInferred,
    IntentClassified,
    ParametersExtracted,
    Dispatched,
    ResponseFormatted,
    ErrorFormatted,
}

/// Outcome category of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    Help,
    NeedMoreInfo,
    ToolUnavailable,
    ContractMismatch,
    ToolFailed,
    TimedOut,
}

impl ReplyStatus {
    fn for_dispatch_error(error: &DispatchError) -> Self {
        match error {
            DispatchError::Transient { .. } | DispatchError::NotConfigured(_) => Self::ToolUnavailable,
            DispatchError::Rejected { .. } => Self::ContractMismatch,
            DispatchError::ToolFailed { .. } | DispatchError::Malformed { .. } => Self::ToolFailed,
        }
    }
}

/// The structured reply returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub content: String,
    pub context_used: Option<EducationalContext>,
    /// The selected tool, whether or not the call succeeded.
    pub tool_invoked: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation: Option<PresentationHints>,
    pub stages: Vec<Stage>,
}

/// What a request has established so far; survives a deadline.
#[derive(Debug, Default)]
struct Progress {
    stages: Vec<Stage>,
    context: Option<EducationalContext>,
    tool: Option<String>,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        debug!(stage = ?stage, "Stage reached");
        self.stages.push(stage);
    }

    fn reply(mut self, status: ReplyStatus, content: String, terminal: Stage) -> ChatReply {
        self.enter(terminal);
        ChatReply {
            content,
            context_used: self.context,
            tool_invoked: self.tool,
            data: None,
            status,
            missing_fields: Vec::new(),
            presentation: None,
            stages: self.stages,
        }
    }
}

pub struct Pipeline {
    registry: RegistryHandle,
    profiles: Arc<dyn ProfileProvider>,
    history: Arc<dyn ChatHistoryStore>,
    dispatcher: Arc<dyn ToolDispatcher>,
    classifier: IntentClassifier,
    extractor: ParameterExtractor,
    /// Overall deadline for one request.
    deadline: Duration,
    /// Stored turns loaded when the caller sends no history.
    history_window: usize,
}

impl Pipeline {
    /// A keyword-only pipeline with default timeouts.
    pub fn new(
        registry: RegistryHandle,
        profiles: Arc<dyn ProfileProvider>,
        history: Arc<dyn ChatHistoryStore>,
        dispatcher: Arc<dyn ToolDispatcher>,
    ) -> Self {
        Self {
            registry,
            profiles,
            history,
            dispatcher,
            classifier: IntentClassifier::new(),
            extractor: ParameterExtractor::offline(),
            deadline: Duration::from_secs(45),
            history_window: 10,
        }
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_extractor(mut self, extractor: ParameterExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    /// Assemble the production pipeline: configured stores, model tiers when a
    /// provider is available, and the HTTP dispatcher.
    pub async fn from_config(config: &AppConfig) -> Result<Self, tutorflow_core::Error> {
        let registry = RegistryHandle::new(config.registry()?);
        let stores = tutorflow_memory::open_stores(&config.store).await?;
        let timeouts = &config.timeouts;
        let dispatcher = Arc::new(HttpToolDispatcher::over_http(
            timeouts.dispatch(),
            timeouts.retry_pause(),
        ));

        let mut pipeline = Self::new(registry, stores.profiles, stores.history, dispatcher)
            .with_deadline(timeouts.request_deadline())
            .with_history_window(config.store.history_window);

        let router = tutorflow_providers::build_from_config(&config.model);
        if let Some(provider) = router.default() {
            info!(provider = %provider.name(), model = %config.model.model, "Model tiers enabled");
            let strategy = ModelIntentStrategy::new(provider.clone(), &config.model.model)
                .with_temperature(config.model.temperature);
            pipeline = pipeline
                .with_classifier(
                    IntentClassifier::new().with_strategy(Arc::new(strategy), timeouts.classification()),
                )
                .with_extractor(
                    ParameterExtractor::new(provider, &config.model.model)
                        .with_temperature(config.model.temperature)
                        .with_max_tokens(config.model.max_tokens)
                        .with_timeout(timeouts.extraction()),
                );
        } else {
            info!("No model provider available, running keyword and fallback tiers only");
        }

        Ok(pipeline)
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileProvider> {
        &self.profiles
    }

    /// Classify a message without running the rest of the pipeline. The
    /// context is inferred from the message and history alone, as for a
    /// student with no stored profile.
    pub async fn classify(&self, message: &str, history: &[ChatTurn]) -> crate::classifier::Classification {
        let registry = self.registry.snapshot();
        let context = inference::infer(message, history, &LearningProfile::default_for("anonymous"));
        self.classifier
            .classify(ClassificationInput {
                message,
                context: &context,
                history,
                registry: &registry,
            })
            .await
    }

    /// Handle one chat request. Never fails: every outcome is a reply.
    pub async fn handle(&self, request: ChatRequest) -> ChatReply {
        let span = info_span!(
            "chat",
            user_id = %request.user_id,
            session_id = %request.session_id,
        );
        async move {
            let started = Instant::now();
            let registry = self.registry.snapshot();
            let history = match request.chat_history.clone() {
                Some(turns) => turns,
                None => self.stored_history(&request.session_id).await,
            };

            let mut progress = Progress::default();
            let outcome = tokio::time::timeout(
                self.deadline,
                self.run(&request, &history, &registry, &mut progress),
            )
            .await;
            let reply = match outcome {
                Ok(reply) => reply,
                Err(_) => {
                    warn!(deadline_secs = self.deadline.as_secs(), "Request deadline exceeded");
                    progress.reply(ReplyStatus::TimedOut, presenter::timed_out(), Stage::ErrorFormatted)
                }
            };

            let exchange = [ChatTurn::student(&request.message), ChatTurn::system(&reply.content)];
            if let Err(e) = self.history.append(&request.session_id, &exchange).await {
                warn!(error = %e, "Failed to append chat history");
            }

            info!(
                status = ?reply.status,
                tool = reply.tool_invoked.as_deref().unwrap_or("none"),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request handled"
            );
            reply
        }
        .instrument(span)
        .await
    }

    async fn stored_history(&self, session_id: &str) -> Vec<ChatTurn> {
        match self.history.recent(session_id, self.history_window).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(error = %e, "Stored history unavailable, continuing without it");
                Vec::new()
            }
        }
    }

    async fn run(
        &self,
        request: &ChatRequest,
        history: &[ChatTurn],
        registry: &ToolRegistry,
        progress: &mut Progress,
    ) -> ChatReply {
        progress.enter(Stage::ReceivedMessage);

        // ── Profile ──
        let profile = resolve_profile(self.profiles.as_ref(), &request.user_id).await;
        progress.enter(Stage::ProfileResolved);

        // ── Context ──
        let context = inference::infer(&request.message, history, &profile);
        progress.context = Some(context);
        progress.enter(Stage::ContextInferred);

        // ── Intent ──
        let classification = self
            .classifier
            .classify(ClassificationInput {
                message: &request.message,
                context: &context,
                history,
                registry,
            })
            .await;
        progress.enter(Stage::IntentClassified);

        let ToolIntent::Tool(tool_id) = classification.intent else {
            return std::mem::take(progress).reply(
                ReplyStatus::Help,
                presenter::help_message(registry),
                Stage::ResponseFormatted,
            );
        };
        let Some(tool) = registry.get(tool_id.as_str()) else {
            return std::mem::take(progress).reply(
                ReplyStatus::Help,
                presenter::help_message(registry),
                Stage::ResponseFormatted,
            );
        };
        progress.tool = Some(tool.id.to_string());

        // ── Parameters ──
        let input = ExtractionInput {
            message: &request.message,
            context: &context,
            history,
            profile: &profile,
        };
        let parameters = match self.extractor.extract(tool, input).await {
            Ok(parameters) => parameters,
            Err(e) => {
                info!(tool = %tool.id, missing = ?e.missing, "Extraction incomplete, asking for more");
                let content = presenter::need_more_info(&tool.display_name, &e.missing);
                let mut reply =
                    std::mem::take(progress).reply(ReplyStatus::NeedMoreInfo, content, Stage::ErrorFormatted);
                reply.missing_fields = e.missing;
                return reply;
            }
        };
        progress.enter(Stage::ParametersExtracted);

        // ── Dispatch ──
        let tool_request = ToolRequest {
            tool_id: tool.id.clone(),
            endpoint: tool.endpoint.clone(),
            parameters,
            context,
            profile,
            history: history.to_vec(),
        };
        let response = match self.dispatcher.dispatch(&tool_request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = %e.tool_id(), error = %e, "Dispatch failed");
                let content = presenter::dispatch_failure(&tool.display_name, &e);
                return std::mem::take(progress).reply(
                    ReplyStatus::for_dispatch_error(&e),
                    content,
                    Stage::ErrorFormatted,
                );
            }
        };
        progress.enter(Stage::Dispatched);

        // ── Format ──
        let hints = PresentationHints::for_context(&context);
        let content = presenter::success(&tool.display_name, &hints, &response.content);
        let mut reply = std::mem::take(progress).reply(ReplyStatus::Ok, content, Stage::ResponseFormatted);
        reply.data = Some(response.content);
        reply.presentation = Some(hints);
        reply
    }
}
