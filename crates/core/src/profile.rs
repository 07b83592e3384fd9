//! Learning profiles and the store that owns them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{EmotionalState, MasteryLevel, TeachingStyle};
use crate::error::ProfileError;

/// A student's stored learning preferences.
///
/// Owned by the profile store; the pipeline only reads it. Every preference is
/// optional so a freshly defaulted profile carries no opinions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningProfile {
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teaching_style: Option<TeachingStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery_level: Option<MasteryLevel>,

    /// Last known emotional state, used only when the conversation shows no cue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_baseline: Option<EmotionalState>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl LearningProfile {
    /// The documented default profile: no preferences at all.
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// The profile store collaborator.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Backend name (e.g. "in_memory", "sqlite").
    fn name(&self) -> &str;

    /// Look up a profile. `ProfileError::NotFound` when none is stored.
    async fn profile(&self, user_id: &str) -> Result<LearningProfile, ProfileError>;
}

/// Resolve a profile, substituting the default on any failure.
pub async fn resolve_profile(provider: &dyn ProfileProvider, user_id: &str) -> LearningProfile {
    match provider.profile(user_id).await {
        Ok(profile) => profile,
        Err(ProfileError::NotFound(_)) => {
            tracing::debug!(user_id, "No stored profile, using defaults");
            LearningProfile::default_for(user_id)
        }
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Profile store unavailable, using defaults");
            LearningProfile::default_for(user_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DownStore;

    #[async_trait]
    impl ProfileProvider for DownStore {
        fn name(&self) -> &str {
            "down"
        }

        async fn profile(&self, _user_id: &str) -> Result<LearningProfile, ProfileError> {
            Err(ProfileError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn default_profile_has_no_preferences() {
        let profile = LearningProfile::default_for("u1");
        assert_eq!(profile.user_id, "u1");
        assert!(profile.teaching_style.is_none());
        assert!(profile.mastery_level.is_none());
    }

    #[test]
    fn profile_deserializes_partial() {
        let profile: LearningProfile =
            serde_json::from_str(r#"{"user_id": "s1", "teaching_style": "visual", "mastery_level": 3}"#)
                .unwrap();
        assert_eq!(profile.teaching_style, Some(TeachingStyle::Visual));
        assert_eq!(profile.mastery_level.map(|m| m.value()), Some(3));
        assert!(profile.emotional_baseline.is_none());
    }

    #[tokio::test]
    async fn unavailable_store_resolves_to_default() {
        let profile = resolve_profile(&DownStore, "s9").await;
        assert_eq!(profile, LearningProfile::default_for("s9"));
    }
}
