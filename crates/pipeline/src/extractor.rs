//! Parameter extraction — fill a tool's schema from the request evidence.
//!
//! The model collaborator proposes values; each declared field it supplies
//! validly is kept. Every other field is filled by the fallback rule its
//! registration declares, then by the declared default. The result is
//! re-validated before it leaves this module.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tutorflow_core::context::{EducationalContext, MasteryBand};
use tutorflow_core::error::ExtractionError;
use tutorflow_core::message::{ChatTurn, recent_student_turns};
use tutorflow_core::profile::LearningProfile;
use tutorflow_core::provider::{Provider, ProviderRequest};
use tutorflow_core::schema::{FallbackRule, ParamSpec, ParameterSet, validate};
use tutorflow_core::tool::ToolRegistration;

use crate::prompts;
use crate::text::{concept_phrase, known_subject, normalize, outermost_object, strip_code_fences, topic_phrase};

/// Student turns searched for an earlier topic or subject.
const HISTORY_SEARCH_TURNS: usize = 10;

/// Everything extraction may look at.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub message: &'a str,
    pub context: &'a EducationalContext,
    pub history: &'a [ChatTurn],
    pub profile: &'a LearningProfile,
}

pub struct ParameterExtractor {
    /// `None` runs fallbacks only.
    provider: Option<Arc<dyn Provider>>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl Default for ParameterExtractor {
    fn default() -> Self {
        Self::offline()
    }
}

impl ParameterExtractor {
    /// An extractor that never calls a model.
    pub fn offline() -> Self {
        Self {
            provider: None,
            model: String::new(),
            temperature: tutorflow_core::provider::default_temperature(),
            max_tokens: 512,
            timeout: Duration::from_secs(8),
        }
    }

    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            ..Self::offline()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Produce a parameter set that validates against `tool`'s schema, or
    /// name the required fields that could not be filled.
    pub async fn extract(
        &self,
        tool: &ToolRegistration,
        input: ExtractionInput<'_>,
    ) -> Result<ParameterSet, ExtractionError> {
        let proposed = self.propose(tool, input).await.unwrap_or_default();
        let evidence = Evidence::gather(input);

        let mut params = ParameterSet::new();
        for spec in &tool.params {
            let from_model = proposed.get(&spec.name).and_then(|v| match spec.check(v) {
                Ok(value) => Some(value),
                Err(reason) => {
                    debug!(tool = %tool.id, field = %spec.name, %reason, "Discarding model value");
                    None
                }
            });

            let value = from_model.or_else(|| fill(spec, &evidence, input.context));
            if let Some(value) = value {
                params.insert(spec.name.clone(), value);
            }
        }

        match validate(&tool.params, &params) {
            Ok(()) => {
                debug!(tool = %tool.id, fields = params.len(), "Parameters extracted");
                Ok(params)
            }
            Err(violations) => Err(ExtractionError {
                tool_id: tool.id.to_string(),
                missing: violations.into_iter().map(|v| v.field).collect(),
            }),
        }
    }

    /// Ask the model for values. Any failure yields `None`.
    async fn propose(&self, tool: &ToolRegistration, input: ExtractionInput<'_>) -> Option<Map<String, Value>> {
        let provider = self.provider.as_ref()?;
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: prompts::extraction(tool, input.context, input.profile, input.message, input.history),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
        };

        let reply = match tokio::time::timeout(self.timeout, provider.complete(request)).await {
            Ok(Ok(response)) => response.text,
            Ok(Err(e)) => {
                warn!(tool = %tool.id, error = %e, "Extraction call failed, using fallbacks");
                return None;
            }
            Err(_) => {
                warn!(tool = %tool.id, "Extraction call timed out, using fallbacks");
                return None;
            }
        };

        let parsed = parse_object(&reply, tool);
        if parsed.is_none() {
            warn!(tool = %tool.id, "Extraction reply was not a JSON object, using fallbacks");
        }
        parsed
    }
}

/// Parse a model reply into the declared fields it contains.
pub fn parse_object(reply: &str, tool: &ToolRegistration) -> Option<Map<String, Value>> {
    let body = outermost_object(strip_code_fences(reply))?;
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    Some(
        object
            .into_iter()
            .filter(|(name, value)| !value.is_null() && tool.param(name).is_some())
            .collect(),
    )
}

// ── Fallback rules ─────────────────────────────────────────────────────────

/// Phrases found in the request, computed once per extraction.
struct Evidence {
    message_topic: Option<String>,
    history_topic: Option<String>,
    concept: Option<String>,
    subject: Option<&'static str>,
}

impl Evidence {
    fn gather(input: ExtractionInput<'_>) -> Self {
        let message_topic = topic_phrase(input.message);
        let history_topic = recent_student_turns(input.history, HISTORY_SEARCH_TURNS)
            .find_map(|turn| topic_phrase(&turn.text));
        let concept = concept_phrase(input.message);
        let subject = known_subject(&normalize(input.message)).or_else(|| {
            recent_student_turns(input.history, HISTORY_SEARCH_TURNS)
                .find_map(|turn| known_subject(&normalize(&turn.text)))
        });
        Self {
            message_topic,
            history_topic,
            concept,
            subject,
        }
    }
}

/// The fallback value for one field: its rule, then its default. A value
/// that fails the field's check is discarded.
fn fill(spec: &ParamSpec, evidence: &Evidence, context: &EducationalContext) -> Option<Value> {
    let from_rule = apply_rule(&spec.fallback, evidence, context).and_then(|v| spec.check(&v).ok());
    from_rule.or_else(|| spec.default.as_ref().and_then(|v| spec.check(v).ok()))
}

fn apply_rule(rule: &FallbackRule, evidence: &Evidence, context: &EducationalContext) -> Option<Value> {
    match rule {
        FallbackRule::Literal => None,
        FallbackRule::Topic => evidence
            .message_topic
            .clone()
            .or_else(|| evidence.history_topic.clone())
            .map(Value::String),
        FallbackRule::HistoryTopic => evidence.history_topic.clone().map(Value::String),
        FallbackRule::Concept => evidence
            .concept
            .clone()
            .or_else(|| evidence.message_topic.as_deref().map(crate::text::title_case))
            .map(Value::String),
        FallbackRule::Subject => evidence.subject.map(|s| Value::String(s.into())),
        FallbackRule::Difficulty { map } => map.get(context.difficulty.as_str()).cloned(),
        FallbackRule::Emotion { map, otherwise, then } => {
            keyed(map.get(context.emotional_state.as_str()), otherwise, then, evidence, context)
        }
        FallbackRule::Style { map, otherwise, then } => {
            keyed(map.get(context.teaching_style.as_str()), otherwise, then, evidence, context)
        }
        FallbackRule::Mastery { map, otherwise, then } => {
            let band = band_name(context.mastery_level.band());
            keyed(map.get(band), otherwise, then, evidence, context)
        }
    }
}

/// Table hit, else `otherwise`, else the chained rule.
fn keyed(
    hit: Option<&Value>,
    otherwise: &Option<Value>,
    then: &Option<Box<FallbackRule>>,
    evidence: &Evidence,
    context: &EducationalContext,
) -> Option<Value> {
    hit.or(otherwise.as_ref())
        .cloned()
        .or_else(|| then.as_deref().and_then(|rule| apply_rule(rule, evidence, context)))
}

fn band_name(band: MasteryBand) -> &'static str {
    match band {
        MasteryBand::Low => "low",
        MasteryBand::Mid => "mid",
        MasteryBand::High => "high",
    }
}
