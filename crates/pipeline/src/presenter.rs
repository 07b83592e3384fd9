//! Reply wording and presentation hints.

use serde::Serialize;
use serde_json::Value;
use tutorflow_core::context::{EducationalContext, EmotionalState, TeachingStyle};
use tutorflow_core::error::DispatchError;
use tutorflow_core::tool::ToolRegistry;

/// How the caller should present generated content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentationHints {
    pub tone: &'static str,
    pub style: TeachingStyle,
    pub adaptations: Vec<&'static str>,
}

impl PresentationHints {
    pub fn for_context(context: &EducationalContext) -> Self {
        Self {
            tone: tone(context.emotional_state),
            style: context.teaching_style,
            adaptations: adaptations(context),
        }
    }

    /// One line describing the adaptations applied.
    pub fn note(&self) -> String {
        if self.adaptations.is_empty() {
            "Tailored to your learning preferences.".into()
        } else {
            format!("Adaptations: {}.", self.adaptations.join(", "))
        }
    }
}

pub fn tone(emotion: EmotionalState) -> &'static str {
    match emotion {
        EmotionalState::Anxious => "reassuring",
        EmotionalState::Confused => "patient",
        EmotionalState::Tired => "concise",
        EmotionalState::Focused => "encouraging",
    }
}

fn adaptations(context: &EducationalContext) -> Vec<&'static str> {
    let mut list = Vec::new();
    match context.emotional_state {
        EmotionalState::Anxious => list.push("simplified for comfort"),
        EmotionalState::Confused => list.push("broken down into simpler concepts"),
        EmotionalState::Tired => list.push("made concise for easy digestion"),
        EmotionalState::Focused => {}
    }
    match context.teaching_style {
        TeachingStyle::Visual => list.push("enhanced with visual elements"),
        TeachingStyle::Socratic => list.push("structured to encourage thinking"),
        TeachingStyle::Flipped => list.push("framed for self-paced preview"),
        TeachingStyle::Direct => {}
    }
    list
}

/// "a", "a or b", "a, b, or c".
fn either(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => (*one).to_string(),
        [a, b] => format!("{a} or {b}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}

/// Reply for a message no tool matched.
pub fn help_message(registry: &ToolRegistry) -> String {
    let names: Vec<&str> = registry.iter().map(|t| t.display_name.as_str()).collect();
    format!(
        "I understand you need help with learning. Could you please specify if you'd like {}?",
        either(&names)
    )
}

/// Reply for a successful tool call.
pub fn success(display_name: &str, hints: &PresentationHints, data: &Value) -> String {
    let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    format!(
        "I've generated {display_name} for you, adapted to your learning needs.\n{}\nHere are your results:\n\n{pretty}",
        hints.note()
    )
}

/// Reply asking the student for the fields extraction could not fill.
pub fn need_more_info(display_name: &str, missing: &[String]) -> String {
    let fields: Vec<String> = missing.iter().map(|f| f.replace('_', " ")).collect();
    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    format!(
        "I can make {display_name} for you, but I need a bit more information first. \
         Could you tell me the {}?",
        either_and(&fields)
    )
}

fn either_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => (*one).to_string(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

/// Reply for a failed dispatch.
pub fn dispatch_failure(display_name: &str, error: &DispatchError) -> String {
    match error {
        DispatchError::Transient { .. } | DispatchError::NotConfigured(_) => format!(
            "The {display_name} service is unavailable right now. Please try again in a moment."
        ),
        DispatchError::Rejected { .. } => format!(
            "I encountered an issue while processing your request: the {display_name} service \
             could not accept it. Please try again."
        ),
        DispatchError::ToolFailed { message, .. } => format!(
            "I encountered an issue while processing your request: {message}. Please try again."
        ),
        DispatchError::Malformed { .. } => format!(
            "I encountered an issue while processing your request: the {display_name} service \
             sent an unreadable response. Please try again."
        ),
    }
}

/// Reply when the request deadline passes.
pub fn timed_out() -> String {
    "Sorry, putting that together took too long. Please try again.".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorflow_core::MasteryLevel;

    #[test]
    fn help_lists_registered_tools() {
        assert_eq!(
            help_message(&ToolRegistry::builtin()),
            "I understand you need help with learning. Could you please specify if you'd like \
             flashcards, notes, concept explanations, or practice questions?"
        );
    }

    #[test]
    fn either_forms() {
        assert_eq!(either(&["a"]), "a");
        assert_eq!(either(&["a", "b"]), "a or b");
        assert_eq!(either_and(&["a", "b", "c"]), "a, b, and c");
    }

    #[test]
    fn hints_for_anxious_visual() {
        let ctx = EducationalContext::new(
            TeachingStyle::Visual,
            EmotionalState::Anxious,
            MasteryLevel::new(3).unwrap(),
        );
        let hints = PresentationHints::for_context(&ctx);
        assert_eq!(hints.tone, "reassuring");
        assert_eq!(
            hints.note(),
            "Adaptations: simplified for comfort, enhanced with visual elements."
        );
    }

    #[test]
    fn success_text_layout() {
        let hints = PresentationHints::for_context(&EducationalContext::default());
        let text = success("flashcards", &hints, &serde_json::json!({"cards": []}));
        assert_eq!(
            text,
            "I've generated flashcards for you, adapted to your learning needs.\n\
             Tailored to your learning preferences.\n\
             Here are your results:\n\n{\n  \"cards\": []\n}"
        );
    }

    #[test]
    fn need_more_info_names_fields() {
        let text = need_more_info("concept explanations", &["concept_to_explain".into()]);
        assert!(text.ends_with("Could you tell me the concept to explain?"));
    }

    #[test]
    fn failures_distinguish_causes() {
        let transient = DispatchError::Transient {
            tool_id: "quiz".into(),
            attempts: 2,
            cause: "status 503".into(),
        };
        assert!(dispatch_failure("practice questions", &transient).contains("unavailable"));

        let failed = DispatchError::ToolFailed {
            tool_id: "quiz".into(),
            message: "model down".into(),
        };
        assert_eq!(
            dispatch_failure("practice questions", &failed),
            "I encountered an issue while processing your request: model down. Please try again."
        );
    }
}
