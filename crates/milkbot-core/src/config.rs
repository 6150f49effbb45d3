//! Router configuration loader.
//!
//! Reads a `router.toml` and deserializes it into [`RouterConfig`]. A missing
//! file means "use the defaults"; a file that exists but cannot be read or
//! parsed is an error for the strict loader and a logged fallback for the
//! lenient one.

use std::path::{Path, PathBuf};

use milkbot_types::config::RouterConfig;
use thiserror::Error;

/// File name looked up inside a config directory.
pub const CONFIG_FILE_NAME: &str = "router.toml";

/// Errors that can occur while loading router configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load router configuration from `path`.
///
/// - Missing file: returns [`RouterConfig::default()`].
/// - Unreadable or malformed file: returns a [`ConfigError`].
///
/// Zero values are normalized to their defaults.
pub async fn load_router_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No router config at {}, using defaults", path.display());
            return Ok(RouterConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config = toml::from_str::<RouterConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config.normalized())
}

/// Like [`load_router_config`], but logs a warning and falls back to the
/// defaults on any error.
pub async fn load_router_config_or_default(path: &Path) -> RouterConfig {
    match load_router_config(path).await {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            RouterConfig::default()
        }
    }
}
