//! Intent classification — an ordered chain of strategies.
//!
//! Each model-backed strategy runs under its own timeout and may fail; the
//! keyword strategy is infallible and always ends the chain, so
//! classification never fails the request.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tutorflow_core::context::EducationalContext;
use tutorflow_core::error::ProviderError;
use tutorflow_core::message::ChatTurn;
use tutorflow_core::provider::{Provider, ProviderRequest};
use tutorflow_core::tool::{ToolIntent, ToolRegistry};

use crate::prompts;
use crate::text::{count_keyword, normalize};

/// Everything a strategy may look at.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput<'a> {
    pub message: &'a str,
    pub context: &'a EducationalContext,
    pub history: &'a [ChatTurn],
    pub registry: &'a ToolRegistry,
}

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("reply named no registered tool: {0:?}")]
    Unrecognized(String),
}

/// One way of deciding which tool a message is for.
#[async_trait]
pub trait IntentStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, input: ClassificationInput<'_>) -> Result<ToolIntent, StrategyError>;
}

/// The outcome of classification and which strategy produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: ToolIntent,
    pub strategy: String,
}

// ── Model strategy ─────────────────────────────────────────────────────────

/// Asks the model collaborator to name a tool.
pub struct ModelIntentStrategy {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl ModelIntentStrategy {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: tutorflow_core::provider::default_temperature(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl IntentStrategy for ModelIntentStrategy {
    fn name(&self) -> &str {
        "model"
    }

    async fn classify(&self, input: ClassificationInput<'_>) -> Result<ToolIntent, StrategyError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: prompts::classification(
                input.registry,
                input.context,
                input.message,
                input.history,
            ),
            temperature: self.temperature,
            max_tokens: Some(20),
        };

        let response = self.provider.complete(request).await?;
        debug!(reply = %response.text.trim(), "Model classification reply");

        parse_tool_reply(&response.text, input.registry)
            .map(ToolIntent::Tool)
            .ok_or(StrategyError::Unrecognized(response.text))
    }
}

/// Find the registered tool a free-form reply names.
///
/// A tool matches on its id as a whole token, its id without underscores, or
/// its display name. The earliest match in the reply wins.
pub fn parse_tool_reply(reply: &str, registry: &ToolRegistry) -> Option<tutorflow_core::ToolId> {
    let reply = normalize(reply);
    registry
        .iter()
        .filter_map(|tool| {
            let id = tool.id.as_str().to_lowercase();
            let candidates = [
                id.clone(),
                id.replace('_', " "),
                id.replace('_', ""),
                tool.display_name.to_lowercase(),
            ];
            candidates
                .iter()
                .filter_map(|c| token_position(&reply, c))
                .min()
                .map(|at| (at, tool))
        })
        .min_by_key(|(at, _)| *at)
        .map(|(_, tool)| tool.id.clone())
}

/// Position of `token` in `text` where it neither starts nor ends inside a
/// longer alphanumeric run. A trailing underscore is allowed, so
/// `quiz_generator` still names `quiz`.
fn token_position(text: &str, token: &str) -> Option<usize> {
    if token.is_empty() {
        return None;
    }
    text.match_indices(token).map(|(at, _)| at).find(|&at| {
        let before = text[..at].chars().next_back();
        let after = text[at + token.len()..].chars().next();
        before.is_none_or(|c| !c.is_alphanumeric() && c != '_')
            && after.is_none_or(|c| !c.is_alphanumeric())
    })
}

// ── Keyword strategy ───────────────────────────────────────────────────────

/// Scores tools by keyword occurrences. Ties go to the first registered tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordIntentStrategy;

impl KeywordIntentStrategy {
    pub fn score(message: &str, registry: &ToolRegistry) -> ToolIntent {
        let message = normalize(message);
        let mut best: Option<(&tutorflow_core::ToolId, usize)> = None;

        for tool in registry.iter() {
            let score: usize = tool
                .keywords
                .iter()
                .map(|k| count_keyword(&message, &normalize(k)))
                .sum();
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((&tool.id, score));
            }
        }

        match best {
            Some((id, _)) => ToolIntent::Tool(id.clone()),
            None => ToolIntent::Unknown,
        }
    }
}

#[async_trait]
impl IntentStrategy for KeywordIntentStrategy {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, input: ClassificationInput<'_>) -> Result<ToolIntent, StrategyError> {
        Ok(Self::score(input.message, input.registry))
    }
}

// ── Chain ──────────────────────────────────────────────────────────────────

struct ChainEntry {
    strategy: Arc<dyn IntentStrategy>,
    timeout: Duration,
}

/// Fallible strategies in order, then keywords.
#[derive(Default)]
pub struct IntentClassifier {
    chain: Vec<ChainEntry>,
    keyword: KeywordIntentStrategy,
}

impl IntentClassifier {
    /// A keyword-only classifier (offline mode).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy ahead of the keyword tier.
    pub fn with_strategy(mut self, strategy: Arc<dyn IntentStrategy>, timeout: Duration) -> Self {
        self.chain.push(ChainEntry { strategy, timeout });
        self
    }

    /// Names of the tiers, in evaluation order.
    pub fn tiers(&self) -> Vec<&str> {
        self.chain
            .iter()
            .map(|e| e.strategy.name())
            .chain(std::iter::once(self.keyword.name()))
            .collect()
    }

    pub async fn classify(&self, input: ClassificationInput<'_>) -> Classification {
        for entry in &self.chain {
            let name = entry.strategy.name();
            match tokio::time::timeout(entry.timeout, entry.strategy.classify(input)).await {
                Ok(Ok(intent)) => {
                    info!(strategy = name, intent = %intent, "Intent classified");
                    return Classification {
                        intent,
                        strategy: name.to_string(),
                    };
                }
                Ok(Err(e)) => {
                    warn!(strategy = name, error = %e, "Classification tier failed, falling back");
                }
                Err(_) => {
                    warn!(
                        strategy = name,
                        timeout_ms = entry.timeout.as_millis() as u64,
                        "Classification tier timed out, falling back"
                    );
                }
            }
        }

        let intent = KeywordIntentStrategy::score(input.message, input.registry);
        info!(strategy = self.keyword.name(), intent = %intent, "Intent classified");
        Classification {
            intent,
            strategy: self.keyword.name().to_string(),
        }
    }
}
