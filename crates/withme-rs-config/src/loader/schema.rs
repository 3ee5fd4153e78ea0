//! Schema validation for kernel JSON5 configuration layers.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &[
            "$schema",
            "provider",
            "chat",
            "thought_loop",
            "companion",
            "store",
        ],
        layer,
        "",
    )?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("provider") {
        validate_provider(value, layer, "provider")?;
    }
    if let Some(value) = map.get("chat") {
        validate_chat(value, layer, "chat")?;
    }
    if let Some(value) = map.get("thought_loop") {
        validate_thought_loop(value, layer, "thought_loop")?;
    }
    if let Some(value) = map.get("companion") {
        validate_companion(value, layer, "companion")?;
    }
    if let Some(value) = map.get("store") {
        validate_store(value, layer, "store")?;
    }
    Ok(())
}

/// Validate the "provider" block.
fn validate_provider(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "base_url",
            "api_key",
            "api_key_env",
            "model",
            "max_tokens",
            "temperature",
            "connect_timeout_secs",
            "request_timeout_secs",
        ],
        layer,
        path,
    )?;
    for key in ["base_url", "api_key_env", "model"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("api_key") {
        expect_optional_string(value, layer, &join_path(path, "api_key"))?;
    }
    for key in ["max_tokens", "connect_timeout_secs", "request_timeout_secs"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("temperature") {
        expect_f64(value, layer, &join_path(path, "temperature"))?;
    }
    Ok(())
}

/// Validate the "chat" block.
fn validate_chat(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["history_window", "stream", "memory_context_limit"],
        layer,
        path,
    )?;
    if let Some(value) = map.get("history_window") {
        expect_u64(value, layer, &join_path(path, "history_window"))?;
    }
    if let Some(value) = map.get("stream") {
        expect_bool(value, layer, &join_path(path, "stream"))?;
    }
    if let Some(value) = map.get("memory_context_limit") {
        expect_u64(value, layer, &join_path(path, "memory_context_limit"))?;
    }
    Ok(())
}

/// Validate the "thought_loop" block.
fn validate_thought_loop(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["capacity", "snippet_chars"], layer, path)?;
    for key in ["capacity", "snippet_chars"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "companion" block.
fn validate_companion(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["default_name", "default_region"], layer, path)?;
    for key in ["default_name", "default_region"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "store" block.
fn validate_store(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["path"], layer, path)?;
    if let Some(value) = map.get("path") {
        expect_optional_string(value, layer, &join_path(path, "path"))?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_optional_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() || value.is_null() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string or null"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_number() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
