//! Configuration loading, validation, and management for confab.
//!
//! Loads configuration from a `confab.toml` file with environment variable
//! overrides for secrets. Validates all settings at startup — a config that
//! loads is a config the pipeline can run on.
//!
//! The intent-class → model-profile mapping lives here, not in router
//! logic: which model answers a conversational turn versus a factual one is
//! an operations decision.

use confab_core::classification::{IntentClass, ModelProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The root configuration structure. Maps directly to `confab.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Named model/temperature profiles
    #[serde(default = "default_profiles")]
    pub profiles: HashMap<String, ProfileConfig>,

    /// Router tuning
    #[serde(default)]
    pub router: RouterConfig,

    /// Context assembly and cache tuning
    #[serde(default)]
    pub context: ContextConfig,

    /// Orchestrator tuning
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// How many recent turns the conversation window keeps
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_history_turns() -> usize {
    16
}

/// Settings for reaching the completion backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible chat endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; the `CONFAB_API_KEY` env var takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Hard timeout per completion request, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/v1".into()
}
fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("backend", &self.backend)
            .field("profiles", &self.profiles)
            .field("router", &self.router)
            .field("context", &self.context)
            .field("orchestrator", &self.orchestrator)
            .field("history_turns", &self.history_turns)
            .finish()
    }
}

/// One named model/temperature profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

/// Default profile table: a low-latency chatty profile and a
/// higher-fidelity precise one.
fn default_profiles() -> HashMap<String, ProfileConfig> {
    let mut map = HashMap::new();
    map.insert(
        "chat".to_string(),
        ProfileConfig {
            model: "small-fast".into(),
            temperature: 0.8,
            max_tokens: 1024,
        },
    );
    map.insert(
        "precise".to_string(),
        ProfileConfig {
            model: "large-accurate".into(),
            temperature: 0.2,
            max_tokens: 1024,
        },
    );
    map
}

/// Router tuning: score margin for the tie-break, and the class → profile
/// mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// If the top two class scores are within this margin, the smaller
    /// blast radius wins
    #[serde(default = "default_tie_margin")]
    pub tie_margin: f32,

    /// Profile name for conversational utterances
    #[serde(default = "default_chat_profile")]
    pub conversational_profile: String,

    /// Profile name for factual lookups, actions, and multi-step requests
    #[serde(default = "default_precise_profile")]
    pub precise_profile: String,
}

fn default_tie_margin() -> f32 {
    0.15
}
fn default_chat_profile() -> String {
    "chat".into()
}
fn default_precise_profile() -> String {
    "precise".into()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tie_margin: default_tie_margin(),
            conversational_profile: default_chat_profile(),
            precise_profile: default_precise_profile(),
        }
    }
}

impl RouterConfig {
    /// Which profile name serves a given intent class.
    pub fn profile_name_for(&self, intent: IntentClass) -> &str {
        match intent {
            IntentClass::Conversational => &self.conversational_profile,
            _ => &self.precise_profile,
        }
    }
}

/// Context assembly and summary-cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Character ceiling for assembled context
    #[serde(default = "default_budget_chars")]
    pub budget_chars: usize,

    /// Summary cache time-to-live, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Cache a summary only when fetch+rank+format took longer than this
    #[serde(default = "default_summarize_threshold_ms")]
    pub summarize_threshold_ms: u64,

    /// How often the background reaper sweeps expired entries, in seconds
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
}

fn default_budget_chars() -> usize {
    2048
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_summarize_threshold_ms() -> u64 {
    50
}
fn default_reaper_interval_secs() -> u64 {
    60
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_chars: default_budget_chars(),
            cache_ttl_secs: default_cache_ttl_secs(),
            summarize_threshold_ms: default_summarize_threshold_ms(),
            reaper_interval_secs: default_reaper_interval_secs(),
        }
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Default per-task timeout, in milliseconds (handlers may override)
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Whole-graph timeout, in milliseconds; must strictly exceed the
    /// largest per-task timeout
    #[serde(default = "default_graph_timeout_ms")]
    pub graph_timeout_ms: u64,

    /// Upper bound on tasks in one graph
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
}

fn default_task_timeout_ms() -> u64 {
    10_000
}
fn default_graph_timeout_ms() -> u64 {
    25_000
}
fn default_max_tasks() -> usize {
    16
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            task_timeout_ms: default_task_timeout_ms(),
            graph_timeout_ms: default_graph_timeout_ms(),
            max_tasks: default_max_tasks(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            profiles: default_profiles(),
            router: RouterConfig::default(),
            context: ContextConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            history_turns: default_history_turns(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, apply env overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
        let mut config: AppConfig =
            toml::from_str(&raw).map_err(|e| format!("Invalid config: {e}"))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus env overrides, validated.
    pub fn load_default() -> Result<Self, String> {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("CONFAB_API_KEY") {
            if !key.is_empty() {
                self.backend.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("CONFAB_BASE_URL") {
            if !url.is_empty() {
                self.backend.base_url = url;
            }
        }
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.router.tie_margin) {
            return Err(format!(
                "router.tie_margin must be in [0, 1], got {}",
                self.router.tie_margin
            ));
        }
        for name in [
            &self.router.conversational_profile,
            &self.router.precise_profile,
        ] {
            if !self.profiles.contains_key(name) {
                return Err(format!("router references unknown profile '{name}'"));
            }
        }
        for (name, profile) in &self.profiles {
            if !(0.0..=2.0).contains(&profile.temperature) {
                return Err(format!(
                    "profile '{name}' temperature must be in [0, 2], got {}",
                    profile.temperature
                ));
            }
            if profile.model.is_empty() {
                return Err(format!("profile '{name}' has an empty model"));
            }
        }
        if self.context.budget_chars == 0 {
            return Err("context.budget_chars must be non-zero".into());
        }
        if self.orchestrator.graph_timeout_ms <= self.orchestrator.task_timeout_ms {
            return Err(format!(
                "orchestrator.graph_timeout_ms ({}) must exceed task_timeout_ms ({})",
                self.orchestrator.graph_timeout_ms, self.orchestrator.task_timeout_ms
            ));
        }
        if self.orchestrator.max_tasks == 0 {
            return Err("orchestrator.max_tasks must be non-zero".into());
        }
        if self.history_turns == 0 {
            return Err("history_turns must be non-zero".into());
        }
        Ok(())
    }

    /// Resolve a profile name into the domain type.
    pub fn profile(&self, name: &str) -> Option<ModelProfile> {
        self.profiles.get(name).map(|p| ModelProfile {
            name: name.to_string(),
            model: p.model.clone(),
            temperature: p.temperature,
            max_tokens: p.max_tokens,
        })
    }

    /// The profile serving a given intent class. Falls back to the first
    /// profile alphabetically if the mapping points at a missing entry
    /// (cannot happen after `validate`).
    pub fn profile_for(&self, intent: IntentClass) -> ModelProfile {
        let name = self.router.profile_name_for(intent);
        if let Some(profile) = self.profile(name) {
            return profile;
        }
        let mut names: Vec<&String> = self.profiles.keys().collect();
        names.sort();
        names
            .first()
            .and_then(|n| self.profile(n))
            .unwrap_or_else(|| ModelProfile::new("fallback", "small-fast", 0.7, 1024))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn conversational_maps_to_chat_profile() {
        let config = AppConfig::default();
        let profile = config.profile_for(IntentClass::Conversational);
        assert_eq!(profile.name, "chat");
        assert!(profile.temperature > 0.5);

        let profile = config.profile_for(IntentClass::FactualLookup);
        assert_eq!(profile.name, "precise");
        assert!(profile.temperature < 0.5);
    }

    #[test]
    fn graph_timeout_must_exceed_task_timeout() {
        let mut config = AppConfig::default();
        config.orchestrator.graph_timeout_ms = config.orchestrator.task_timeout_ms;
        let err = config.validate().unwrap_err();
        assert!(err.contains("graph_timeout_ms"));
    }

    #[test]
    fn unknown_profile_reference_rejected() {
        let mut config = AppConfig::default();
        config.router.precise_profile = "missing".into();
        let err = config.validate().unwrap_err();
        assert!(err.contains("missing"));
    }

    #[test]
    fn tie_margin_bounds() {
        let mut config = AppConfig::default();
        config.router.tie_margin = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let raw = r#"
            [backend]
            base_url = "http://localhost:9999/v1"

            [profiles.chat]
            model = "tiny"

            [profiles.precise]
            model = "big"
            temperature = 0.1
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:9999/v1");
        assert_eq!(config.profiles["precise"].model, "big");
        // Defaults fill the rest
        assert!((config.profiles["chat"].temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.backend.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confab.toml");
        std::fs::write(&path, "history_turns = 4\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.history_turns, 4);
    }

    #[test]
    fn load_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confab.toml");
        std::fs::write(&path, "history_turns = 0\n").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
