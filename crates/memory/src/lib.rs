//! Profile and chat-history stores for tutorflow.
//!
//! Every backend implements both `ProfileProvider` and `ChatHistoryStore`.

pub mod in_memory;
pub mod samples;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;
use tutorflow_config::StoreConfig;
use tutorflow_core::history::ChatHistoryStore;
use tutorflow_core::profile::ProfileProvider;

pub use in_memory::InMemoryStore;
pub use samples::sample_profiles;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// The two store handles the pipeline needs, usually backed by one object.
#[derive(Clone)]
pub struct Stores {
    pub profiles: Arc<dyn ProfileProvider>,
    pub history: Arc<dyn ChatHistoryStore>,
}

impl Stores {
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: ProfileProvider + ChatHistoryStore + 'static,
    {
        Self {
            profiles: store.clone(),
            history: store,
        }
    }
}

/// Open the backend named in `[store]`.
pub async fn open_stores(config: &StoreConfig) -> Result<Stores, tutorflow_core::Error> {
    match config.backend.as_str() {
        "memory" => {
            let store = if config.seed_samples {
                InMemoryStore::with_samples()
            } else {
                InMemoryStore::new()
            };
            Ok(Stores::from_shared(Arc::new(store)))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let store = SqliteStore::new(&config.database_url).await?;
            if config.seed_samples {
                store.seed_samples().await?;
            }
            Ok(Stores::from_shared(Arc::new(store)))
        }
        other => Err(tutorflow_core::Error::Config {
            message: format!("store backend '{other}' is not available in this build"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_seeded() {
        let config = StoreConfig::default();
        let stores = open_stores(&config).await.unwrap();
        assert!(stores.profiles.profile("student123").await.is_ok());
    }

    #[tokio::test]
    async fn unseeded_memory_backend_is_empty() {
        let config = StoreConfig {
            seed_samples: false,
            ..StoreConfig::default()
        };
        let stores = open_stores(&config).await.unwrap();
        assert!(stores.profiles.profile("student123").await.is_err());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn sqlite_backend_shares_one_database() {
        let config = StoreConfig {
            backend: "sqlite".into(),
            database_url: "sqlite::memory:".into(),
            ..StoreConfig::default()
        };
        let stores = open_stores(&config).await.unwrap();
        stores
            .history
            .append("s", &[tutorflow_core::ChatTurn::student("hello")])
            .await
            .unwrap();
        assert_eq!(stores.history.recent("s", 5).await.unwrap().len(), 1);
        assert!(stores.profiles.profile("student456").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_backend_rejected() {
        let config = StoreConfig {
            backend: "redis".into(),
            ..StoreConfig::default()
        };
        assert!(open_stores(&config).await.is_err());
    }
}
