//! Tests for layered configuration loading.

use super::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Options with no system/user/requirements layers so tests stay hermetic.
fn isolated_options(cwd: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(cwd);
    options.system_config_path = None;
    options.user_config_path = None;
    options.requirements_path = None;
    options
}

#[test]
fn parse_minimal_config() {
    let config = KernelConfig::load_from_str("{}").expect("config");
    assert_eq!(config.provider.model, "google/gemini-3-flash-preview");
    assert_eq!(config.thought_loop.capacity, 20);
    assert_eq!(config.thought_loop.snippet_chars, 200);
    assert_eq!(config.companion.default_name, "Still");
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = KernelConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("config:unexpected"));
    assert!(msg.contains("unknown key"));
}

#[test]
fn rejects_wrong_type_in_nested_block() {
    let err = KernelConfig::load_from_str(r#"{ chat: { stream: "yes" } }"#).unwrap_err();
    assert!(format!("{err}").contains("chat.stream"));
}

#[test]
fn rejects_zero_thought_loop_capacity() {
    let err = KernelConfig::load_from_str(r#"{ thought_loop: { capacity: 0 } }"#).unwrap_err();
    assert!(format!("{err}").contains("thought_loop.capacity"));
}

#[test]
fn rejects_temperature_out_of_range() {
    let err = KernelConfig::load_from_str(r#"{ provider: { temperature: 3.5 } }"#).unwrap_err();
    assert!(format!("{err}").contains("provider.temperature"));
}

#[test]
fn explicit_store_path_wins() {
    let config = KernelConfig::load_from_str(r#"{ store: { path: "/var/lib/withme" } }"#)
        .expect("config");
    assert_eq!(
        config.store_root(),
        Some(std::path::PathBuf::from("/var/lib/withme"))
    );
}

#[test]
fn layered_config_prefers_repo_over_cwd() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let project_root = root.join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");

    let user_config = root.join("user.json5");
    write_json5(&user_config, "{ companion: { default_name: \"user\" } }");
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ companion: { default_name: \"project\" } }",
    );
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        "{ companion: { default_name: \"cwd\" } }",
    );
    write_json5(
        &project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
        "{ companion: { default_name: \"repo\" } }",
    );

    let mut options = isolated_options(&cwd);
    options.user_config_path = Some(user_config);

    let layered = KernelConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.companion.default_name, "repo");
    let sources = layered
        .layers
        .iter()
        .map(|layer| layer.source)
        .collect::<Vec<_>>();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Repo,
        ]
    );
}

#[test]
fn requirements_lock_overrides() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("work");
    fs::create_dir_all(&cwd).expect("cwd");

    let requirements = root.join("requirements.json5");
    write_json5(&requirements, "{ thought_loop: { capacity: 10 } }");
    let runtime_config = root.join("runtime.json5");
    write_json5(
        &runtime_config,
        "{ thought_loop: { capacity: 50, snippet_chars: 80 } }",
    );

    let mut options = isolated_options(&cwd);
    options.requirements_path = Some(requirements);
    options.runtime_paths = vec![runtime_config];

    let layered = KernelConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.thought_loop.capacity, 10);
    assert_eq!(layered.config.thought_loop.snippet_chars, 80);
}

#[test]
fn runtime_override_wins_without_constraints() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("work");
    fs::create_dir_all(&cwd).expect("cwd");

    let system_config = root.join("system.json5");
    write_json5(&system_config, "{ provider: { model: \"system-model\" } }");
    let runtime_config = root.join("runtime.json5");
    write_json5(&runtime_config, "{ provider: { model: \"runtime-model\" } }");

    let mut options = isolated_options(&cwd).with_runtime_path(&runtime_config);
    options.system_config_path = Some(system_config);

    let layered = KernelConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.provider.model, "runtime-model");
}

#[test]
fn invalid_layer_reports_layer_label() {
    let temp = TempDir::new().expect("tmp");
    let cwd = temp.path().join("work");
    fs::create_dir_all(&cwd).expect("cwd");
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ store: { root: \"x\" } }");

    let err = KernelConfig::load_layered_with_options(isolated_options(&cwd)).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("cwd("));
    assert!(msg.contains("store.root"));
}
