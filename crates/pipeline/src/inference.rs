//! Context inference — style, emotional state and mastery for one request.
//!
//! A total function over the message, the recent history and the stored
//! profile. Stored preferences win over lexical cues; cues win over defaults.

use tutorflow_core::context::{EducationalContext, EmotionalState, TeachingStyle};
use tutorflow_core::message::{ChatTurn, recent_student_turns};
use tutorflow_core::profile::LearningProfile;
use tutorflow_core::MasteryLevel;

use crate::text::{contains_phrase, normalize};

/// How many earlier student turns are read for emotional cues.
pub const EMOTION_WINDOW: usize = 3;

/// Emotional cue groups in priority order.
const EMOTION_CUES: &[(EmotionalState, &[&str])] = &[
    (
        EmotionalState::Confused,
        &[
            "confused",
            "lost",
            "don't understand",
            "dont understand",
            "don't get",
            "makes no sense",
        ],
    ),
    (
        EmotionalState::Anxious,
        &[
            "anxious",
            "nervous",
            "worried",
            "struggling",
            "stressed",
            "frustrated",
            "scared",
            "panicking",
            "overwhelmed",
        ],
    ),
    (
        EmotionalState::Tired,
        &["tired", "exhausted", "sleepy", "burned out", "burnt out", "drained"],
    ),
    (
        EmotionalState::Focused,
        &["focused", "ready", "excited", "motivated"],
    ),
];

const STYLE_CUES: &[(TeachingStyle, &[&str])] = &[
    (
        TeachingStyle::Visual,
        &[
            "diagram",
            "diagrams",
            "visual",
            "visually",
            "picture",
            "chart",
            "draw",
            "illustrate",
            "mind map",
        ],
    ),
    (
        TeachingStyle::Socratic,
        &["ask me", "guide me", "socratic", "help me think", "questions to think"],
    ),
    (
        TeachingStyle::Flipped,
        &["before class", "preview", "flipped", "on my own first"],
    ),
];

fn first_cue<T: Copy>(text: &str, groups: &[(T, &[&str])]) -> Option<T> {
    let text = normalize(text);
    groups
        .iter()
        .find(|(_, cues)| cues.iter().any(|cue| contains_phrase(&text, cue)))
        .map(|(value, _)| *value)
}

/// The emotional state a single piece of text signals, if any.
pub fn emotion_cue(text: &str) -> Option<EmotionalState> {
    first_cue(text, EMOTION_CUES)
}

/// The teaching style a single piece of text asks for, if any.
pub fn style_cue(text: &str) -> Option<TeachingStyle> {
    first_cue(text, STYLE_CUES)
}

/// Infer the educational context for one request.
pub fn infer(message: &str, history: &[ChatTurn], profile: &LearningProfile) -> EducationalContext {
    let teaching_style = profile
        .teaching_style
        .or_else(|| style_cue(message))
        .unwrap_or_default();

    let emotional_state = emotion_cue(message)
        .or_else(|| {
            recent_student_turns(history, EMOTION_WINDOW).find_map(|turn| emotion_cue(&turn.text))
        })
        .or(profile.emotional_baseline)
        .unwrap_or_default();

    let mastery = profile.mastery_level.unwrap_or(MasteryLevel::NEUTRAL);

    EducationalContext::new(teaching_style, emotional_state, mastery)
}
