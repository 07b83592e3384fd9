//! Model provider implementations for tutorflow.
//!
//! All providers implement the `tutorflow_core::Provider` trait.
//! The router selects the configured provider, or none for offline mode.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config, needs_api_key};
