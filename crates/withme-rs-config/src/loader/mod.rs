//! Layered configuration loader with requirement constraints.
//!
//! Discovers configuration layers (system/user/project/etc), validates schema,
//! merges them under optional locked requirements, and produces a final
//! `KernelConfig`.

mod layer_io;
mod merge;
mod schema;
mod utils;

#[cfg(test)]
mod tests;

use crate::{ConfigError, KernelConfig};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "withme.json5";
/// Default config directory under user or repo roots.
const DEFAULT_CONFIG_DIR: &str = ".withme";
/// Default store directory name under the user config directory.
const DEFAULT_STORE_DIR: &str = "store";
/// Marker files/dirs that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

#[cfg(unix)]
/// Default system config path on Unix.
const SYSTEM_CONFIG_PATH: &str = "/etc/withme/withme.json5";
#[cfg(unix)]
/// Default requirements path on Unix.
const SYSTEM_REQUIREMENTS_PATH: &str = "/etc/withme/requirements.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\withme\\withme.json5";
#[cfg(windows)]
const SYSTEM_REQUIREMENTS_PATH: &str = "C:\\ProgramData\\withme\\requirements.json5";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: KernelConfig,
    /// Metadata for each layer that contributed, lowest precedence first.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Locked constraints that later layers cannot override.
    Requirements,
    System,
    User,
    /// Nearest ancestor holding a project marker.
    Project,
    Cwd,
    /// `.withme/` directory inside the project root.
    Repo,
    /// Explicit override paths (highest precedence).
    Runtime,
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to locate local layers.
    pub cwd: PathBuf,
    /// Optional system config path (defaults to `/etc/withme/withme.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// Optional user config path (defaults to `~/.withme/withme.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Optional requirements path for locked settings.
    pub requirements_path: Option<PathBuf>,
    /// Runtime override config paths applied last.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker files/dirs used to detect the project root.
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_system_config_path(),
            user_config_path: layer_io::default_user_config_path(),
            requirements_path: layer_io::default_requirements_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl KernelConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations and overrides.
    ///
    /// Layer precedence (low -> high): system, user, project, cwd, repo,
    /// runtime overrides. Keys present in the requirements layer are locked.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        debug!("normalized cwd for config load: {}", cwd.display());
        let mut layers = Vec::new();
        let mut merge_layers = Vec::new();
        let mut seen_paths = HashSet::new();

        let requirements = layer_io::load_optional_layer(
            ConfigLayerSource::Requirements,
            options.requirements_path.as_deref(),
        )?;
        let requirements_value = requirements.as_ref().map(|layer| layer.value.clone());
        if let Some(layer) = requirements {
            debug!("loaded requirements layer");
            layers.push(layer.meta);
        }

        let mut candidates = Vec::new();
        if let Some(path) = options.system_config_path.clone() {
            candidates.push((ConfigLayerSource::System, path));
        }
        if let Some(path) = options.user_config_path.clone() {
            candidates.push((ConfigLayerSource::User, path));
        }
        match utils::find_project_root(&cwd, &options.project_root_markers) {
            Some(project_root) => {
                debug!("resolved project root: {}", project_root.display());
                candidates.push((
                    ConfigLayerSource::Project,
                    project_root.join(DEFAULT_CONFIG_FILE),
                ));
                candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));
                candidates.push((
                    ConfigLayerSource::Repo,
                    project_root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
                ));
            }
            None => {
                debug!("project root not found; skipping project/repo layers");
                candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));
            }
        }

        for (source, path) in candidates {
            if !seen_paths.insert(utils::unique_path(&path)) {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            if let Some(layer) = layer_io::load_optional_layer(source, Some(&path))? {
                debug!("loaded layer (source={:?}, path={})", source, path.display());
                layers.push(layer.meta.clone());
                merge_layers.push(layer);
            }
        }

        for runtime_path in &options.runtime_paths {
            let loaded = layer_io::load_required_layer(ConfigLayerSource::Runtime, runtime_path)?;
            debug!("loaded runtime layer (path={})", runtime_path.display());
            layers.push(loaded.meta.clone());
            merge_layers.push(loaded);
        }

        let mut merged = Value::Object(serde_json::Map::new());
        if let Some(requirements_value) = &requirements_value {
            merge::merge_json_values(&mut merged, requirements_value);
        }
        for layer in merge_layers {
            merge::merge_json_with_constraints(
                &mut merged,
                &layer.value,
                requirements_value.as_ref(),
            );
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate range invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.model.trim().is_empty() {
            return Err(out_of_range("provider.model", "must not be empty"));
        }
        if self.provider.max_tokens == 0 {
            return Err(out_of_range("provider.max_tokens", "must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(out_of_range("provider.temperature", "must be within [0, 2]"));
        }
        if self.chat.history_window == 0 {
            return Err(out_of_range("chat.history_window", "must be greater than zero"));
        }
        if self.thought_loop.capacity == 0 {
            return Err(out_of_range("thought_loop.capacity", "must be greater than zero"));
        }
        if self.thought_loop.snippet_chars == 0 {
            return Err(out_of_range(
                "thought_loop.snippet_chars",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Resolve the store root: the configured path, else `~/.withme/store`.
    pub fn store_root(&self) -> Option<PathBuf> {
        match self.store.path.as_deref() {
            Some(path) => Some(PathBuf::from(path)),
            None => layer_io::default_user_dir().map(|dir| dir.join(DEFAULT_STORE_DIR)),
        }
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<KernelConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: KernelConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}

fn out_of_range(path: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        path: path.to_string(),
        message: message.to_string(),
    }
}
