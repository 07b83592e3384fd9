//! Educational context — the per-request bundle that shapes generated content.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the student prefers to be taught.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeachingStyle {
    #[default]
    Direct,
    Socratic,
    Visual,
    #[serde(alias = "flipped_classroom")]
    Flipped,
}

impl TeachingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Socratic => "socratic",
            Self::Visual => "visual",
            Self::Flipped => "flipped",
        }
    }
}

/// The student's inferred emotional state for this request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    #[default]
    Focused,
    Anxious,
    Confused,
    Tired,
}

impl EmotionalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Focused => "focused",
            Self::Anxious => "anxious",
            Self::Confused => "confused",
            Self::Tired => "tired",
        }
    }
}

/// Content difficulty, derived from mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// 1–3 → easy, 4–7 → medium, 8–10 → hard.
    pub fn from_mastery(mastery: MasteryLevel) -> Self {
        match mastery.band() {
            MasteryBand::Low => Self::Easy,
            MasteryBand::Mid => Self::Medium,
            MasteryBand::High => Self::Hard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// Coarse grouping of mastery levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryBand {
    Low,
    Mid,
    High,
}

/// A mastery level on the 1–10 scale. Construction outside the range fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MasteryLevel(u8);

impl MasteryLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    /// Used when the profile has no stored mastery.
    pub const NEUTRAL: MasteryLevel = MasteryLevel(5);

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&level).then_some(Self(level))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn band(&self) -> MasteryBand {
        match self.0 {
            1..=3 => MasteryBand::Low,
            4..=7 => MasteryBand::Mid,
            _ => MasteryBand::High,
        }
    }
}

impl Default for MasteryLevel {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl TryFrom<u8> for MasteryLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("mastery level {value} is outside 1-10"))
    }
}

impl From<MasteryLevel> for u8 {
    fn from(level: MasteryLevel) -> Self {
        level.0
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fully populated context every downstream stage works from.
///
/// Deserializing ignores any incoming `inferred_difficulty` and derives it
/// from `mastery_level` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ContextRepr")]
pub struct EducationalContext {
    pub teaching_style: TeachingStyle,
    pub emotional_state: EmotionalState,
    pub mastery_level: MasteryLevel,
    #[serde(rename = "inferred_difficulty")]
    pub difficulty: Difficulty,
}

impl EducationalContext {
    /// Build a context; difficulty always follows from mastery.
    pub fn new(
        teaching_style: TeachingStyle,
        emotional_state: EmotionalState,
        mastery_level: MasteryLevel,
    ) -> Self {
        Self {
            teaching_style,
            emotional_state,
            mastery_level,
            difficulty: Difficulty::from_mastery(mastery_level),
        }
    }
}

#[derive(Deserialize)]
struct ContextRepr {
    teaching_style: TeachingStyle,
    emotional_state: EmotionalState,
    mastery_level: MasteryLevel,
}

impl From<ContextRepr> for EducationalContext {
    fn from(repr: ContextRepr) -> Self {
        Self::new(repr.teaching_style, repr.emotional_state, repr.mastery_level)
    }
}

impl Default for EducationalContext {
    fn default() -> Self {
        Self::new(
            TeachingStyle::default(),
            EmotionalState::default(),
            MasteryLevel::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_table() {
        let expected = [
            (1, Difficulty::Easy),
            (3, Difficulty::Easy),
            (4, Difficulty::Medium),
            (7, Difficulty::Medium),
            (8, Difficulty::Hard),
            (10, Difficulty::Hard),
        ];
        for (level, difficulty) in expected {
            let mastery = MasteryLevel::new(level).unwrap();
            assert_eq!(Difficulty::from_mastery(mastery), difficulty, "level {level}");
        }
    }

    #[test]
    fn mastery_rejects_out_of_range() {
        assert!(MasteryLevel::new(0).is_none());
        assert!(MasteryLevel::new(11).is_none());
        assert!(serde_json::from_str::<MasteryLevel>("12").is_err());
        assert_eq!(serde_json::from_str::<MasteryLevel>("7").unwrap().value(), 7);
    }

    #[test]
    fn default_context() {
        let ctx = EducationalContext::default();
        assert_eq!(ctx.teaching_style, TeachingStyle::Direct);
        assert_eq!(ctx.emotional_state, EmotionalState::Focused);
        assert_eq!(ctx.mastery_level.value(), 5);
        assert_eq!(ctx.difficulty, Difficulty::Medium);
    }

    #[test]
    fn context_wire_shape() {
        let ctx = EducationalContext::new(
            TeachingStyle::Visual,
            EmotionalState::Anxious,
            MasteryLevel::new(3).unwrap(),
        );
        let json = serde_json::to_value(ctx).unwrap();
        assert_eq!(json["teaching_style"], "visual");
        assert_eq!(json["emotional_state"], "anxious");
        assert_eq!(json["mastery_level"], 3);
        assert_eq!(json["inferred_difficulty"], "easy");
    }

    #[test]
    fn stale_difficulty_recomputed_on_read() {
        let ctx: EducationalContext = serde_json::from_str(
            r#"{"teaching_style": "direct", "emotional_state": "focused",
                "mastery_level": 9, "inferred_difficulty": "easy"}"#,
        )
        .unwrap();
        assert_eq!(ctx.difficulty, Difficulty::Hard);

        let ctx: EducationalContext = serde_json::from_str(
            r#"{"teaching_style": "socratic", "emotional_state": "tired", "mastery_level": 2}"#,
        )
        .unwrap();
        assert_eq!(ctx.difficulty, Difficulty::Easy);
    }

    #[test]
    fn flipped_classroom_alias() {
        let style: TeachingStyle = serde_json::from_str(r#""flipped_classroom""#).unwrap();
        assert_eq!(style, TeachingStyle::Flipped);
    }
}
