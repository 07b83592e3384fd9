//! Sample student profiles for demos and local development.

use tutorflow_core::context::{EmotionalState, MasteryLevel, TeachingStyle};
use tutorflow_core::profile::LearningProfile;

fn sample(
    user_id: &str,
    name: &str,
    grade_level: &str,
    style: TeachingStyle,
    emotion: EmotionalState,
    mastery: u8,
) -> LearningProfile {
    LearningProfile {
        user_id: user_id.into(),
        name: Some(name.into()),
        grade_level: Some(grade_level.into()),
        teaching_style: Some(style),
        mastery_level: MasteryLevel::new(mastery),
        emotional_baseline: Some(emotion),
        metadata: serde_json::Map::new(),
    }
}

/// The three seeded students.
pub fn sample_profiles() -> Vec<LearningProfile> {
    vec![
        sample(
            "student123",
            "Charlie",
            "10",
            TeachingStyle::Direct,
            EmotionalState::Focused,
            6,
        ),
        sample(
            "student456",
            "Alice",
            "8",
            TeachingStyle::Visual,
            EmotionalState::Anxious,
            3,
        ),
        sample(
            "student789",
            "Bob",
            "11",
            TeachingStyle::Socratic,
            EmotionalState::Confused,
            4,
        ),
    ]
}
