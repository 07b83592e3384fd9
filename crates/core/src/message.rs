//! Chat turns — the caller-supplied conversation evidence.
//!
//! History is ordered and append-only. The pipeline reads it as evidence for
//! classification and extraction and never rewrites an existing turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The learner. `user` is accepted on input.
    #[serde(alias = "user")]
    Student,
    /// The tutor side of the exchange. `assistant` is accepted on input.
    #[serde(alias = "assistant")]
    System,
}

impl TurnRole {
    /// The role name tool services expect on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Student => "user",
            Self::System => "assistant",
        }
    }
}

/// A single turn in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,

    /// The text of the turn. `content` is accepted on input.
    #[serde(alias = "content")]
    pub text: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn student(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Student,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_student(&self) -> bool {
        self.role == TurnRole::Student
    }
}

/// The student turns of `history`, newest first, at most `limit` of them.
pub fn recent_student_turns(history: &[ChatTurn], limit: usize) -> impl Iterator<Item = &ChatTurn> {
    history.iter().rev().filter(|t| t.is_student()).take(limit)
}

/// Render the tail of a history as plain text evidence for a model prompt.
pub fn render_history(history: &[ChatTurn], max_turns: usize) -> String {
    let start = history.len().saturating_sub(max_turns);
    history[start..]
        .iter()
        .map(|t| format!("{}: {}", t.role.wire_name(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_user_assistant_aliases() {
        let json = r#"[
            {"role": "user", "content": "I'm studying calculus"},
            {"role": "assistant", "content": "What would you like to practice?"}
        ]"#;
        let turns: Vec<ChatTurn> = serde_json::from_str(json).unwrap();
        assert_eq!(turns[0].role, TurnRole::Student);
        assert_eq!(turns[1].role, TurnRole::System);
        assert_eq!(turns[0].text, "I'm studying calculus");
    }

    #[test]
    fn serializes_canonical_role_names() {
        let json = serde_json::to_string(&ChatTurn::student("hi")).unwrap();
        assert!(json.contains(r#""role":"student""#));
        assert!(json.contains(r#""text":"hi""#));
    }

    #[test]
    fn recent_student_turns_newest_first() {
        let history = vec![
            ChatTurn::student("first"),
            ChatTurn::system("reply"),
            ChatTurn::student("second"),
            ChatTurn::student("third"),
        ];
        let texts: Vec<&str> = recent_student_turns(&history, 2).map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["third", "second"]);
    }

    #[test]
    fn render_history_keeps_tail() {
        let history = vec![
            ChatTurn::student("one"),
            ChatTurn::system("two"),
            ChatTurn::student("three"),
        ];
        assert_eq!(render_history(&history, 2), "assistant: two\nuser: three");
        assert_eq!(render_history(&[], 4), "");
    }
}
