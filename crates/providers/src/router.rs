//! Provider router — selects the model provider based on config.
//!
//! Handles provider creation and lookup. A router with no default provider
//! means the pipeline runs in offline (keyword-only) mode.

use std::collections::HashMap;
use std::sync::Arc;
use tutorflow_config::ModelConfig;
use tutorflow_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Routes model requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build the router from the `[model]` section.
///
/// Providers that need a key are skipped (with a warning) when none is
/// configured; `none` registers nothing.
pub fn build_from_config(config: &ModelConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.provider);
    let name = config.provider.as_str();

    if name == "none" {
        tracing::info!("Model provider disabled, classification uses keywords only");
        return router;
    }

    let api_key = match (&config.api_key, needs_api_key(name)) {
        (Some(key), _) => key.clone(),
        (None, false) => name.to_string(),
        (None, true) => {
            tracing::warn!(provider = %name, "No API key configured, classification uses keywords only");
            return router;
        }
    };

    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(name));

    router.register(
        name,
        Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
    );
    router
}

/// Whether `provider_name` is a hosted service that requires a key.
pub fn needs_api_key(provider_name: &str) -> bool {
    !matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "gemini" | "google" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
