//! Tool registry and dispatch contract.
//!
//! The registry is the only place tools are named. Classification and
//! extraction walk it in registration order; adding a tool means adding a
//! registration, never touching the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::context::EducationalContext;
use crate::error::DispatchError;
use crate::message::ChatTurn;
use crate::profile::LearningProfile;
use crate::schema::{FallbackRule, ParamKind, ParamSpec, ParameterSet};

/// Identifier of a registered tool (e.g. "flashcard").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(pub String);

impl ToolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The classification outcome for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolIntent {
    Tool(ToolId),
    Unknown,
}

impl ToolIntent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tool(id) => id.as_str(),
            Self::Unknown => "unknown",
        }
    }

    pub fn tool_id(&self) -> Option<&ToolId> {
        match self {
            Self::Tool(id) => Some(id),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for ToolIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ToolIntent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Everything the pipeline knows about one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRegistration {
    pub id: ToolId,

    /// Plural noun phrase used in replies ("flashcards", "practice questions").
    pub display_name: String,

    /// Sent to the model collaborator during classification.
    #[serde(default)]
    pub description: String,

    /// Matching keywords, in priority order.
    pub keywords: Vec<String>,

    /// Invocation URL of the tool service.
    pub endpoint: String,

    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl ToolRegistration {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// An ordered collection of tool registrations.
///
/// Order matters: it breaks keyword-score ties and orders the help message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolRegistry {
    tools: Vec<ToolRegistration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: Vec<ToolRegistration>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool. A registration with an existing id replaces the old
    /// one in place, keeping its position.
    pub fn register(&mut self, tool: ToolRegistration) {
        match self.tools.iter_mut().find(|t| t.id == tool.id) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ToolRegistration> {
        self.tools.iter().find(|t| t.id.as_str() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolRegistration> {
        self.tools.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn into_tools(self) -> Vec<ToolRegistration> {
        self.tools
    }

    /// The four built-in educational tools on their conventional local ports.
    pub fn builtin() -> Self {
        Self::from_tools(vec![
            flashcard_tool(),
            note_maker_tool(),
            concept_explainer_tool(),
            quiz_tool(),
        ])
    }
}

/// A shared, swappable registry.
///
/// Requests take a snapshot once at entry; `replace` never affects a request
/// already holding one.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    inner: Arc<RwLock<Arc<ToolRegistry>>>,
}

impl RegistryHandle {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    pub fn snapshot(&self) -> Arc<ToolRegistry> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, registry: ToolRegistry) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(registry);
    }
}

/// A normalized request to a tool service.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub tool_id: ToolId,
    pub endpoint: String,
    pub parameters: ParameterSet,
    pub context: EducationalContext,
    pub profile: LearningProfile,
    pub history: Vec<ChatTurn>,
}

impl ToolRequest {
    /// The JSON body tool services accept.
    pub fn wire_body(&self) -> Value {
        let history: Vec<Value> = self
            .history
            .iter()
            .map(|t| json!({ "role": t.role.wire_name(), "content": t.text }))
            .collect();
        json!({
            "tool_name": self.tool_id,
            "extracted_parameters": self.parameters,
            "educational_context": self.context,
            "user_info": self.profile,
            "chat_history": history,
        })
    }
}

/// Generated content returned by a tool service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub tool_id: ToolId,
    pub content: Value,
}

/// The Tool Dispatcher contract.
///
/// Implementations must convert every failure into a [`DispatchError`]
/// carrying the tool id; nothing escapes as a panic or raw transport error.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, request: &ToolRequest) -> Result<ToolResponse, DispatchError>;
}

// ── Built-in registrations ─────────────────────────────────────────────────

fn table(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn string_param(name: &str, required: bool, fallback: FallbackRule, default: Option<&str>) -> ParamSpec {
    ParamSpec {
        name: name.into(),
        kind: ParamKind::String { min_length: None },
        required,
        description: String::new(),
        default: default.map(|d| Value::String(d.into())),
        fallback,
    }
}

fn enum_param(name: &str, values: &[&str], fallback: FallbackRule, default: &str) -> ParamSpec {
    ParamSpec {
        name: name.into(),
        kind: ParamKind::Enum {
            values: values.iter().map(|v| v.to_string()).collect(),
        },
        required: false,
        description: String::new(),
        default: Some(Value::String(default.into())),
        fallback,
    }
}

fn int_param(name: &str, min: i64, max: i64, fallback: FallbackRule, default: i64) -> ParamSpec {
    ParamSpec {
        name: name.into(),
        kind: ParamKind::Integer {
            min: Some(min),
            max: Some(max),
        },
        required: false,
        description: String::new(),
        default: Some(Value::from(default)),
        fallback,
    }
}

fn bool_param(name: &str, fallback: FallbackRule, default: bool) -> ParamSpec {
    ParamSpec {
        name: name.into(),
        kind: ParamKind::Boolean,
        required: false,
        description: String::new(),
        default: Some(Value::Bool(default)),
        fallback,
    }
}

fn topic_param() -> ParamSpec {
    let mut spec = string_param("topic", true, FallbackRule::Topic, Some("general"));
    spec.description = "The topic the student wants material on".into();
    spec
}

fn subject_param() -> ParamSpec {
    string_param("subject", false, FallbackRule::Subject, Some("general"))
}

fn strained_table(value: Value) -> BTreeMap<String, Value> {
    table(&[
        ("anxious", value.clone()),
        ("confused", value.clone()),
        ("tired", value),
    ])
}

fn flashcard_tool() -> ToolRegistration {
    ToolRegistration {
        id: "flashcard".into(),
        display_name: "flashcards".into(),
        description: "Creates flashcards for memorizing terms and facts".into(),
        keywords: ["flashcard", "memorize", "cards", "drill", "practice terms"]
            .map(String::from)
            .to_vec(),
        endpoint: "http://localhost:8001/invoke".into(),
        params: vec![
            topic_param(),
            int_param(
                "count",
                1,
                20,
                FallbackRule::Emotion {
                    map: strained_table(json!(3)),
                    otherwise: Some(json!(5)),
                    then: None,
                },
                5,
            ),
            enum_param(
                "difficulty",
                &["easy", "medium", "hard"],
                FallbackRule::Difficulty {
                    map: table(&[
                        ("easy", json!("easy")),
                        ("medium", json!("medium")),
                        ("hard", json!("hard")),
                    ]),
                },
                "medium",
            ),
            subject_param(),
            bool_param("include_examples", FallbackRule::Literal, true),
        ],
    }
}

fn note_maker_tool() -> ToolRegistration {
    ToolRegistration {
        id: "note_maker".into(),
        display_name: "notes".into(),
        description: "Writes structured study notes and summaries".into(),
        keywords: ["note", "notes", "summary", "summarize", "outline", "write"]
            .map(String::from)
            .to_vec(),
        endpoint: "http://localhost:8002/invoke".into(),
        params: vec![
            topic_param(),
            subject_param(),
            enum_param(
                "note_taking_style",
                &["outline", "bullet_points", "narrative", "structured"],
                FallbackRule::Emotion {
                    map: table(&[
                        ("anxious", json!("structured")),
                        ("confused", json!("structured")),
                        ("tired", json!("bullet_points")),
                    ]),
                    otherwise: None,
                    then: Some(Box::new(FallbackRule::Mastery {
                        map: table(&[("high", json!("narrative"))]),
                        otherwise: Some(json!("outline")),
                        then: None,
                    })),
                },
                "outline",
            ),
            bool_param("include_examples", FallbackRule::Literal, true),
            bool_param(
                "include_analogies",
                FallbackRule::Style {
                    map: table(&[("visual", json!(true))]),
                    otherwise: Some(json!(false)),
                    then: None,
                },
                false,
            ),
        ],
    }
}

fn concept_explainer_tool() -> ToolRegistration {
    let mut concept = string_param("concept_to_explain", true, FallbackRule::Concept, None);
    concept.description = "The concept the student asked about".into();
    ToolRegistration {
        id: "concept_explainer".into(),
        display_name: "concept explanations".into(),
        description: "Explains a concept at a depth suited to the student".into(),
        keywords: ["explain", "concept", "understand", "what is", "how does", "tell me about"]
            .map(String::from)
            .to_vec(),
        endpoint: "http://localhost:8003/invoke".into(),
        params: vec![
            concept,
            string_param("current_topic", true, FallbackRule::HistoryTopic, Some("general")),
            enum_param(
                "desired_depth",
                &["basic", "intermediate", "advanced", "comprehensive"],
                FallbackRule::Difficulty {
                    map: table(&[
                        ("easy", json!("basic")),
                        ("medium", json!("intermediate")),
                        ("hard", json!("advanced")),
                    ]),
                },
                "intermediate",
            ),
        ],
    }
}

fn quiz_tool() -> ToolRegistration {
    ToolRegistration {
        id: "quiz".into(),
        display_name: "practice questions".into(),
        description: "Generates practice questions and quizzes".into(),
        keywords: ["quiz", "practice", "questions", "test", "problems", "exercises"]
            .map(String::from)
            .to_vec(),
        endpoint: "http://localhost:8004/invoke".into(),
        params: vec![
            topic_param(),
            subject_param(),
            enum_param(
                "difficulty",
                &["beginner", "intermediate", "advanced"],
                FallbackRule::Difficulty {
                    map: table(&[
                        ("easy", json!("beginner")),
                        ("medium", json!("intermediate")),
                        ("hard", json!("advanced")),
                    ]),
                },
                "intermediate",
            ),
            enum_param(
                "question_type",
                &["practice", "multiple_choice", "true_false", "fill_blank"],
                FallbackRule::Emotion {
                    map: table(&[("anxious", json!("multiple_choice"))]),
                    otherwise: Some(json!("practice")),
                    then: None,
                },
                "practice",
            ),
            int_param(
                "num_questions",
                1,
                50,
                FallbackRule::Emotion {
                    map: strained_table(json!(5)),
                    otherwise: Some(json!(10)),
                    then: None,
                },
                10,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EmotionalState, MasteryLevel, TeachingStyle};

    #[test]
    fn builtin_registry_order() {
        let registry = ToolRegistry::builtin();
        assert_eq!(
            registry.ids(),
            vec!["flashcard", "note_maker", "concept_explainer", "quiz"]
        );
        assert_eq!(registry.get("quiz").unwrap().display_name, "practice questions");
        assert!(registry.get("calculator").is_none());
    }

    #[test]
    fn builtin_defaults_are_valid() {
        for tool in ToolRegistry::builtin().iter() {
            for spec in &tool.params {
                if let Some(default) = &spec.default {
                    assert!(
                        spec.check(default).is_ok(),
                        "{}.{} default is invalid",
                        tool.id,
                        spec.name
                    );
                }
            }
        }
    }

    #[test]
    fn register_replaces_in_place() {
        let mut registry = ToolRegistry::builtin();
        let mut quiz = registry.get("quiz").unwrap().clone();
        quiz.endpoint = "http://quiz.internal/invoke".into();
        let mut flashcard = registry.get("flashcard").unwrap().clone();
        flashcard.display_name = "cards".into();

        registry.register(flashcard);
        registry.register(quiz);

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.ids()[0], "flashcard");
        assert_eq!(registry.get("flashcard").unwrap().display_name, "cards");
        assert_eq!(registry.get("quiz").unwrap().endpoint, "http://quiz.internal/invoke");
    }

    #[test]
    fn snapshot_survives_replace() {
        let handle = RegistryHandle::new(ToolRegistry::builtin());
        let before = handle.snapshot();
        handle.replace(ToolRegistry::new());
        assert_eq!(before.len(), 4);
        assert!(handle.snapshot().is_empty());
    }

    #[test]
    fn intent_names() {
        assert_eq!(ToolIntent::Tool("quiz".into()).as_str(), "quiz");
        assert_eq!(ToolIntent::Unknown.to_string(), "unknown");
        assert_eq!(serde_json::to_value(ToolIntent::Unknown).unwrap(), "unknown");
    }

    #[test]
    fn wire_body_shape() {
        let mut params = ParameterSet::new();
        params.insert("topic", json!("photosynthesis"));
        let request = ToolRequest {
            tool_id: "flashcard".into(),
            endpoint: "http://localhost:8001/invoke".into(),
            parameters: params,
            context: EducationalContext::new(
                TeachingStyle::Visual,
                EmotionalState::Anxious,
                MasteryLevel::new(3).unwrap(),
            ),
            profile: LearningProfile::default_for("student456"),
            history: vec![ChatTurn::student("hi"), ChatTurn::system("hello")],
        };

        let body = request.wire_body();
        assert_eq!(body["tool_name"], "flashcard");
        assert_eq!(body["extracted_parameters"]["topic"], "photosynthesis");
        assert_eq!(body["educational_context"]["inferred_difficulty"], "easy");
        assert_eq!(body["user_info"]["user_id"], "student456");
        assert_eq!(body["chat_history"][0], json!({"role": "user", "content": "hi"}));
        assert_eq!(body["chat_history"][1]["role"], "assistant");
    }
}
