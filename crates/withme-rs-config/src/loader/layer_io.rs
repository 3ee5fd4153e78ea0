//! IO helpers for reading config layers from disk.

use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer,
    SYSTEM_CONFIG_PATH, SYSTEM_REQUIREMENTS_PATH, schema,
};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Load an optional layer if the provided path exists.
pub(super) fn load_optional_layer(
    source: ConfigLayerSource,
    path: Option<&Path>,
) -> Result<Option<LoadedLayer>, ConfigError> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.exists() {
        debug!(
            "optional layer missing (source={:?}, path={})",
            source,
            path.display()
        );
        return Ok(None);
    }
    Ok(Some(load_required_layer(source, path)?))
}

/// Load and schema-check a required layer from disk.
pub(super) fn load_required_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let value: Value = json5::from_str(&contents)?;
    schema::validate_layer_schema(&value, &layer_label(source, path))?;
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: path.to_path_buf(),
        },
        value,
    })
}

/// Label used as the prefix of schema validation errors.
fn layer_label(source: ConfigLayerSource, path: &Path) -> String {
    let name = match source {
        ConfigLayerSource::Requirements => "requirements",
        ConfigLayerSource::System => "system",
        ConfigLayerSource::User => "user",
        ConfigLayerSource::Project => "project",
        ConfigLayerSource::Cwd => "cwd",
        ConfigLayerSource::Repo => "repo",
        ConfigLayerSource::Runtime => "runtime",
    };
    format!("{name}({})", path.display())
}

pub(super) fn default_system_config_path() -> Option<PathBuf> {
    #[cfg(any(unix, windows))]
    {
        Some(PathBuf::from(SYSTEM_CONFIG_PATH))
    }
    #[cfg(not(any(unix, windows)))]
    {
        None
    }
}

pub(super) fn default_requirements_path() -> Option<PathBuf> {
    #[cfg(any(unix, windows))]
    {
        Some(PathBuf::from(SYSTEM_REQUIREMENTS_PATH))
    }
    #[cfg(not(any(unix, windows)))]
    {
        None
    }
}

/// `~/.withme`, when a home directory is known.
pub(super) fn default_user_dir() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().join(DEFAULT_CONFIG_DIR))
}

pub(super) fn default_user_config_path() -> Option<PathBuf> {
    default_user_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
}
