//! Prompt construction for the model collaborator.

use tutorflow_core::context::EducationalContext;
use tutorflow_core::message::{ChatTurn, render_history};
use tutorflow_core::profile::LearningProfile;
use tutorflow_core::provider::PromptMessage;
use tutorflow_core::schema::describe;
use tutorflow_core::tool::{ToolRegistration, ToolRegistry};

/// Turns of history quoted as evidence in a prompt.
pub const PROMPT_HISTORY_TURNS: usize = 6;

fn context_lines(context: &EducationalContext) -> String {
    format!(
        "- Teaching style: {}\n- Emotional state: {}\n- Mastery level: {}/10 ({} difficulty)",
        context.teaching_style.as_str(),
        context.emotional_state.as_str(),
        context.mastery_level,
        context.difficulty.as_str(),
    )
}

fn evidence(message: &str, history: &[ChatTurn]) -> String {
    let rendered = render_history(history, PROMPT_HISTORY_TURNS);
    if rendered.is_empty() {
        format!("Student message: {message}")
    } else {
        format!("Conversation so far:\n{rendered}\n\nStudent message: {message}")
    }
}

/// Ask the model which registered tool a message is for.
pub fn classification(
    registry: &ToolRegistry,
    context: &EducationalContext,
    message: &str,
    history: &[ChatTurn],
) -> Vec<PromptMessage> {
    let tools = registry
        .iter()
        .map(|t| format!("- {}: {}", t.id, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "You route a student's request to exactly one educational tool.\n\n\
         Available tools:\n{tools}\n\n\
         Student context:\n{}\n\n\
         Reply with ONLY the tool id. If no tool fits, reply with: unknown",
        context_lines(context),
    );

    vec![
        PromptMessage::system(system),
        PromptMessage::user(evidence(message, history)),
    ]
}

/// Ask the model to fill a tool's parameter schema.
pub fn extraction(
    tool: &ToolRegistration,
    context: &EducationalContext,
    profile: &LearningProfile,
    message: &str,
    history: &[ChatTurn],
) -> Vec<PromptMessage> {
    let schema = serde_json::to_string_pretty(&describe(&tool.params)).unwrap_or_default();
    let grade = profile
        .grade_level
        .as_deref()
        .map(|g| format!("\n- Grade level: {g}"))
        .unwrap_or_default();

    let system = format!(
        "Extract the parameters for the '{}' tool ({}) from the student's request.\n\n\
         Parameter schema:\n{schema}\n\n\
         Student context:\n{}{grade}\n\n\
         Guidelines:\n\
         - Infer topics and subjects from the message first, then the conversation.\n\
         - Match difficulty and amount of material to the student context.\n\
         - Omit a field rather than guessing when there is no evidence for it.\n\n\
         Reply with ONLY a JSON object.",
        tool.id,
        tool.description,
        context_lines(context),
    );

    vec![
        PromptMessage::system(system),
        PromptMessage::user(evidence(message, history)),
    ]
}
