//! Configuration schema for the withme kernel.

use serde::{Deserialize, Serialize};

/// Root config for the kernel and CLI.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KernelConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub thought_loop: ThoughtLoopConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl KernelConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::new()
    }
}

/// Builder for assembling a `KernelConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct KernelConfigBuilder {
    config: KernelConfig,
}

impl KernelConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: KernelConfig::default(),
        }
    }

    /// Replace the model provider configuration.
    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.config.provider = provider;
        self
    }

    /// Replace the chat pipeline configuration.
    pub fn chat(mut self, chat: ChatConfig) -> Self {
        self.config.chat = chat;
        self
    }

    /// Replace the thought-loop window configuration.
    pub fn thought_loop(mut self, thought_loop: ThoughtLoopConfig) -> Self {
        self.config.thought_loop = thought_loop;
        self
    }

    /// Replace companion defaults.
    pub fn companion(mut self, companion: CompanionConfig) -> Self {
        self.config.companion = companion;
        self
    }

    /// Replace the store configuration.
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    /// Finalize and return the built `KernelConfig`.
    pub fn build(self) -> KernelConfig {
        self.config
    }
}

/// OpenAI-compatible chat-completions gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Explicit key; takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable the CLI reads the key from.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_key_env() -> String {
    "AI_GATEWAY_API_KEY".to_string()
}

/// Default model identifier reported by `status`.
fn default_model() -> String {
    "google/gemini-3-flash-preview".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Chat pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Number of most recent turns forwarded to the model.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Request streamed completions from the provider.
    #[serde(default)]
    pub stream: bool,
    /// Maximum number of memories rendered into the system prompt.
    #[serde(default = "default_memory_context_limit")]
    pub memory_context_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            stream: false,
            memory_context_limit: default_memory_context_limit(),
        }
    }
}

fn default_history_window() -> usize {
    20
}

fn default_memory_context_limit() -> usize {
    12
}

/// Bounded thought-loop window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtLoopConfig {
    #[serde(default = "default_thought_loop_capacity")]
    pub capacity: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for ThoughtLoopConfig {
    fn default() -> Self {
        Self {
            capacity: default_thought_loop_capacity(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_thought_loop_capacity() -> usize {
    20
}

fn default_snippet_chars() -> usize {
    200
}

/// Defaults applied to sessions that have not customized the companion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default = "default_companion_name")]
    pub default_name: String,
    #[serde(default = "default_region")]
    pub default_region: String,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            default_name: default_companion_name(),
            default_region: default_region(),
        }
    }
}

fn default_companion_name() -> String {
    "Still".to_string()
}

fn default_region() -> String {
    "US".to_string()
}

/// Durable store location.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Root directory for session rollouts; `~/.withme/store` when unset.
    #[serde(default)]
    pub path: Option<String>,
}
