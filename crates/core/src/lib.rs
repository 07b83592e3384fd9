//! # Tutorflow Core
//!
//! Domain types, traits, and error definitions for the tutorflow routing
//! middleware. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! Every collaborator of the pipeline (profile store, history log, model
//! provider, tool dispatcher) is a trait here; implementations live in their
//! own crates and tests substitute hand-written mocks.

pub mod context;
pub mod error;
pub mod history;
pub mod message;
pub mod profile;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::{Difficulty, EducationalContext, EmotionalState, MasteryBand, MasteryLevel, TeachingStyle};
pub use error::{DispatchError, Error, ExtractionError, HistoryError, ProfileError, ProviderError, Result};
pub use history::ChatHistoryStore;
pub use message::{ChatTurn, TurnRole};
pub use profile::{LearningProfile, ProfileProvider};
pub use provider::{PromptMessage, Provider, ProviderRequest, ProviderResponse};
pub use schema::{FallbackRule, ParamKind, ParamSpec, ParameterSet};
pub use tool::{RegistryHandle, ToolDispatcher, ToolId, ToolIntent, ToolRegistration, ToolRegistry, ToolRequest, ToolResponse};
