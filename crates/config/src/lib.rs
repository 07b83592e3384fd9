//! Configuration loading, validation, and management for tutorflow.
//!
//! Loads configuration from `~/.tutorflow/config.toml` with environment
//! variable overrides. Validates all settings at startup, including the tool
//! registry, so a bad registry never reaches request handling.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tutorflow_core::schema::{FallbackRule, ParamKind};
use tutorflow_core::tool::{ToolRegistration, ToolRegistry};

/// The root configuration structure.
///
/// Maps directly to `~/.tutorflow/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// The classification/extraction model collaborator
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Profile and chat-history storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Separate TOML file holding the `[[tools]]` registry. Takes precedence
    /// over inline tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,

    /// Inline tool registry. Empty means the built-in four tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolRegistration>,
}

fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum accepted request body size
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Allowed CORS origins. `["*"]` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    64 * 1024
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider name (`openai`, `gemini`, `ollama`, ...). `none` disables the
    /// model tier entirely.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the provider's well-known base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    512
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Bounds on every external call, and on the request as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_classification_secs")]
    pub classification_secs: u64,

    #[serde(default = "default_extraction_secs")]
    pub extraction_secs: u64,

    /// Per dispatch attempt
    #[serde(default = "default_dispatch_secs")]
    pub dispatch_secs: u64,

    /// Pause before the single dispatch retry
    #[serde(default = "default_retry_pause_ms")]
    pub retry_pause_ms: u64,

    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
}

fn default_classification_secs() -> u64 {
    8
}
fn default_extraction_secs() -> u64 {
    8
}
fn default_dispatch_secs() -> u64 {
    20
}
fn default_retry_pause_ms() -> u64 {
    250
}
fn default_request_deadline_secs() -> u64 {
    45
}

impl TimeoutConfig {
    pub fn classification(&self) -> Duration {
        Duration::from_secs(self.classification_secs)
    }

    pub fn extraction(&self) -> Duration {
        Duration::from_secs(self.extraction_secs)
    }

    pub fn dispatch(&self) -> Duration {
        Duration::from_secs(self.dispatch_secs)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            classification_secs: default_classification_secs(),
            extraction_secs: default_extraction_secs(),
            dispatch_secs: default_dispatch_secs(),
            retry_pause_ms: default_retry_pause_ms(),
            request_deadline_secs: default_request_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `memory` or `sqlite`
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite URL, used when `backend = "sqlite"`
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Seed the three sample student profiles at startup
    #[serde(default = "default_true")]
    pub seed_samples: bool,

    /// How many stored turns to load when a caller sends no history
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_store_backend() -> String {
    "memory".into()
}
fn default_database_url() -> String {
    format!(
        "sqlite://{}?mode=rwc",
        AppConfig::config_dir().join("tutorflow.db").display()
    )
}
fn default_history_window() -> usize {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            database_url: default_database_url(),
            seed_samples: true,
            history_window: default_history_window(),
        }
    }
}

/// Shape of a standalone registry file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub tools: Vec<ToolRegistration>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.tutorflow/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides:
    /// - `TUTORFLOW_API_KEY` (then `OPENAI_API_KEY`, `GOOGLE_API_KEY`)
    /// - `TUTORFLOW_PROVIDER`, `TUTORFLOW_MODEL`
    /// - `TUTORFLOW_DATABASE_URL` (also selects the sqlite backend)
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("TUTORFLOW_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("GOOGLE_API_KEY"));
        }

        if let Some(provider) = lookup("TUTORFLOW_PROVIDER") {
            self.model.provider = provider;
        }

        if let Some(model) = lookup("TUTORFLOW_MODEL") {
            self.model.model = model;
        }

        if let Some(url) = lookup("TUTORFLOW_DATABASE_URL") {
            self.store.database_url = url;
            self.store.backend = "sqlite".into();
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tutorflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be non-zero".into()));
        }

        let t = &self.timeouts;
        if t.classification_secs == 0 || t.extraction_secs == 0 || t.dispatch_secs == 0 {
            return Err(ConfigError::ValidationError(
                "per-call timeouts must be greater than zero".into(),
            ));
        }
        let deadline = t.request_deadline();
        for (name, value) in [
            ("classification_secs", t.classification()),
            ("extraction_secs", t.extraction()),
            ("dispatch_secs", t.dispatch()),
            ("retry_pause_ms", t.retry_pause()),
        ] {
            if value >= deadline {
                return Err(ConfigError::ValidationError(format!(
                    "timeouts.{name} must be shorter than timeouts.request_deadline_secs"
                )));
            }
        }

        if !matches!(self.store.backend.as_str(), "memory" | "sqlite") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be 'memory' or 'sqlite', got '{}'",
                self.store.backend
            )));
        }

        if !self.tools.is_empty() {
            check_unique_ids(&self.tools)?;
            validate_registry(&ToolRegistry::from_tools(self.tools.clone()))?;
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// The effective tool registry: the registry file, else inline tools,
    /// else the built-in tools, with `TUTORFLOW_<TOOL_ID>_URL` endpoint
    /// overrides applied.
    pub fn registry(&self) -> Result<ToolRegistry, ConfigError> {
        self.registry_with(|key| std::env::var(key).ok())
    }

    fn registry_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ToolRegistry, ConfigError> {
        let tools = match &self.registry_file {
            Some(path) => load_registry_file(path)?.tools,
            None if !self.tools.is_empty() => self.tools.clone(),
            None => ToolRegistry::builtin().into_tools(),
        };
        check_unique_ids(&tools)?;

        let mut registry = ToolRegistry::new();
        for mut tool in tools {
            let key = format!("TUTORFLOW_{}_URL", tool.id.as_str().to_ascii_uppercase());
            if let Some(url) = lookup(&key) {
                tracing::debug!(tool = %tool.id, url = %url, "Endpoint overridden from environment");
                tool.endpoint = url;
            }
            registry.register(tool);
        }

        validate_registry(&registry)?;
        Ok(registry)
    }

    /// Generate a default config TOML string (for the `init` command), with
    /// the built-in registry written out so it can be edited.
    pub fn default_toml() -> String {
        let config = Self {
            tools: ToolRegistry::builtin().into_tools(),
            ..Self::default()
        };
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            model: ModelConfig::default(),
            timeouts: TimeoutConfig::default(),
            store: StoreConfig::default(),
            registry_file: None,
            tools: Vec::new(),
        }
    }
}

/// Read a standalone `[[tools]]` registry file.
pub fn load_registry_file(path: &Path) -> Result<RegistryFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Reject a tool list that declares the same id twice; registering it would
/// silently keep only the last entry.
fn check_unique_ids(tools: &[ToolRegistration]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for tool in tools {
        if !seen.insert(tool.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate tool id '{}' in the tool registry",
                tool.id
            )));
        }
    }
    Ok(())
}

const DIFFICULTY_KEYS: &[&str] = &["easy", "medium", "hard"];
const EMOTION_KEYS: &[&str] = &["focused", "anxious", "confused", "tired"];
const STYLE_KEYS: &[&str] = &["direct", "socratic", "visual", "flipped"];
const MASTERY_KEYS: &[&str] = &["low", "mid", "high"];

/// Check a registry for structural problems.
pub fn validate_registry(registry: &ToolRegistry) -> Result<(), ConfigError> {
    if registry.is_empty() {
        return Err(ConfigError::ValidationError("the tool registry is empty".into()));
    }

    for tool in registry.iter() {
        validate_tool(tool)?;
    }
    Ok(())
}

fn validate_tool(tool: &ToolRegistration) -> Result<(), ConfigError> {
    let fail = |msg: String| Err(ConfigError::ValidationError(format!("tool '{}': {msg}", tool.id)));

    if tool.id.as_str().trim().is_empty() {
        return Err(ConfigError::ValidationError("tool id must be non-empty".into()));
    }
    if tool.display_name.trim().is_empty() {
        return fail("display_name must be non-empty".into());
    }
    if tool.endpoint.trim().is_empty() {
        return fail("endpoint must be non-empty".into());
    }
    if tool.keywords.iter().all(|k| k.trim().is_empty()) {
        return fail("at least one keyword is required".into());
    }

    let mut names = HashSet::new();
    for spec in &tool.params {
        if !names.insert(spec.name.as_str()) {
            return fail(format!("parameter '{}' is declared twice", spec.name));
        }
        match &spec.kind {
            ParamKind::Integer {
                min: Some(lo),
                max: Some(hi),
            } if lo > hi => {
                return fail(format!("parameter '{}' has min > max", spec.name));
            }
            ParamKind::Enum { values } if values.is_empty() => {
                return fail(format!("parameter '{}' has no enum values", spec.name));
            }
            _ => {}
        }
        if let Some(default) = &spec.default
            && let Err(reason) = spec.check(default)
        {
            return fail(format!("default of '{}' is invalid: {reason}", spec.name));
        }
        if let Err(key) = check_rule_keys(&spec.fallback) {
            return fail(format!("fallback of '{}' has unknown key '{key}'", spec.name));
        }
    }
    Ok(())
}

fn check_rule_keys(rule: &FallbackRule) -> Result<(), String> {
    let (map, allowed, then) = match rule {
        FallbackRule::Difficulty { map } => (map, DIFFICULTY_KEYS, None),
        FallbackRule::Emotion { map, then, .. } => (map, EMOTION_KEYS, then.as_deref()),
        FallbackRule::Style { map, then, .. } => (map, STYLE_KEYS, then.as_deref()),
        FallbackRule::Mastery { map, then, .. } => (map, MASTERY_KEYS, then.as_deref()),
        _ => return Ok(()),
    };
    if let Some(key) = map.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(key.clone());
    }
    match then {
        Some(next) => check_rule_keys(next),
        None => Ok(()),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for tutorflow_core::Error {
    fn from(e: ConfigError) -> Self {
        tutorflow_core::Error::Config {
            message: e.to_string(),
        }
    }
}
