//! In-memory store — useful for testing and ephemeral deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tutorflow_core::error::{HistoryError, ProfileError};
use tutorflow_core::history::ChatHistoryStore;
use tutorflow_core::message::ChatTurn;
use tutorflow_core::profile::{LearningProfile, ProfileProvider};

use crate::samples::sample_profiles;

/// Profiles and session logs held in process memory.
pub struct InMemoryStore {
    profiles: Arc<RwLock<HashMap<String, LearningProfile>>>,
    sessions: Arc<RwLock<HashMap<String, Vec<ChatTurn>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            profiles: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A store pre-loaded with the sample students.
    pub fn with_samples() -> Self {
        let profiles = sample_profiles()
            .into_iter()
            .map(|p| (p.user_id.clone(), p))
            .collect();
        Self {
            profiles: Arc::new(RwLock::new(profiles)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace a profile.
    pub async fn upsert_profile(&self, profile: LearningProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }

    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileProvider for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn profile(&self, user_id: &str) -> Result<LearningProfile, ProfileError> {
        self.profiles
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(user_id.to_string()))
    }
}

#[async_trait]
impl ChatHistoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, session_id: &str, turns: &[ChatTurn]) -> Result<(), HistoryError> {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .extend_from_slice(turns);
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>, HistoryError> {
        let sessions = self.sessions.read().await;
        let turns = sessions.get(session_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorflow_core::context::TeachingStyle;

    #[tokio::test]
    async fn samples_are_seeded() {
        let store = InMemoryStore::with_samples();
        assert_eq!(store.profile_count().await, 3);

        let alice = store.profile("student456").await.unwrap();
        assert_eq!(alice.name.as_deref(), Some("Alice"));
        assert_eq!(alice.teaching_style, Some(TeachingStyle::Visual));
        assert_eq!(alice.mastery_level.map(|m| m.value()), Some(3));
    }

    #[tokio::test]
    async fn unknown_user_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.profile("nobody").await,
            Err(ProfileError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn upsert_replaces() {
        let store = InMemoryStore::with_samples();
        let mut bob = store.profile("student789").await.unwrap();
        bob.teaching_style = Some(TeachingStyle::Flipped);
        store.upsert_profile(bob).await;

        assert_eq!(store.profile_count().await, 3);
        let bob = store.profile("student789").await.unwrap();
        assert_eq!(bob.teaching_style, Some(TeachingStyle::Flipped));
    }

    #[tokio::test]
    async fn history_appends_in_order() {
        let store = InMemoryStore::new();
        store
            .append("s1", &[ChatTurn::student("one"), ChatTurn::system("two")])
            .await
            .unwrap();
        store.append("s1", &[ChatTurn::student("three")]).await.unwrap();
        store.append("s2", &[ChatTurn::student("other")]).await.unwrap();

        let texts: Vec<String> = store
            .recent("s1", 2)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert!(store.recent("missing", 5).await.unwrap().is_empty());
    }
}
