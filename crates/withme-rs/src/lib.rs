//! Public SDK surface for the withme governance kernel.
//!
//! This crate re-exports the kernel building blocks and provides the small
//! helpers the `withme` binary uses to assemble a kernel.

/// Re-export for convenience.
pub use withme_rs_config as config;
pub use withme_rs_core as core;
/// Re-export for convenience.
pub use withme_rs_protocol as protocol;
/// Re-export for convenience.
pub use withme_rs_store as store;

use log::debug;
use std::path::Path;
use withme_rs_config::{ConfigError, KernelConfig, LayeredConfigOptions};
use withme_rs_protocol::KernelRequest;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}

/// Load the layered config, with an optional runtime layer and store
/// directory override applied on top.
pub fn load_config(
    mut options: LayeredConfigOptions,
    runtime_path: Option<&Path>,
    store_dir: Option<&Path>,
) -> Result<KernelConfig, ConfigError> {
    if let Some(path) = runtime_path {
        options = options.with_runtime_path(path);
    }
    let layered = KernelConfig::load_layered_with_options(options)?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    let mut config = layered.config;
    if let Some(dir) = store_dir {
        config.store.path = Some(dir.display().to_string());
    }
    Ok(config)
}

/// Fill `provider.api_key` from the configured environment variable when no
/// explicit key is set. Returns whether a key is available afterwards.
pub fn resolve_api_key(
    config: &mut KernelConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> bool {
    if config.provider.api_key.is_none() {
        config.provider.api_key = lookup(&config.provider.api_key_env)
            .filter(|value| !value.trim().is_empty());
    }
    config.provider.api_key.is_some()
}

/// Decode one request envelope from JSON text.
pub fn parse_request(contents: &str) -> serde_json::Result<KernelRequest> {
    serde_json::from_str(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn env_key_fills_missing_api_key() {
        let mut config = KernelConfig::default();
        let env_name = config.provider.api_key_env.clone();
        let found = resolve_api_key(&mut config, |name| {
            (name == env_name).then(|| "sk-test".to_string())
        });
        assert!(found);
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn explicit_api_key_wins_over_env() {
        let mut config = KernelConfig::default();
        config.provider.api_key = Some("from-config".to_string());
        assert!(resolve_api_key(&mut config, |_| Some("from-env".to_string())));
        assert_eq!(config.provider.api_key.as_deref(), Some("from-config"));
    }

    #[test]
    fn blank_env_key_is_ignored() {
        let mut config = KernelConfig::default();
        assert!(!resolve_api_key(&mut config, |_| Some("  ".to_string())));
        assert_eq!(config.provider.api_key, None);
    }

    #[test]
    fn runtime_layer_and_store_override_apply() {
        let dir = tempdir().expect("tempdir");
        let runtime = dir.path().join("runtime.json5");
        fs::write(&runtime, "{ provider: { model: 'gpt-test' }, chat: { stream: true } }")
            .expect("write runtime");
        let store = dir.path().join("store");

        let mut options = LayeredConfigOptions::new(dir.path());
        options.system_config_path = None;
        options.user_config_path = None;
        options.requirements_path = None;

        let config = load_config(options, Some(&runtime), Some(&store)).expect("config");
        assert_eq!(config.provider.model, "gpt-test");
        assert!(config.chat.stream);
        assert_eq!(config.store_root(), Some(store));
    }

    #[test]
    fn request_envelope_parses_camel_case() {
        let request = parse_request(
            &json!({
                "action": "chat",
                "sessionId": "6f1c8e8e-1c50-4a55-9b44-0c0f8f1b8c11",
                "payload": { "text": "hello" }
            })
            .to_string(),
        )
        .expect("request");
        assert_eq!(request.action, "chat");
        assert_eq!(
            request.session_id.as_deref(),
            Some("6f1c8e8e-1c50-4a55-9b44-0c0f8f1b8c11")
        );
        assert_eq!(request.payload["text"], json!("hello"));
    }
}
