use std::{fs::read_to_string, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use colored::Colorize;
use directories::ProjectDirs;
use log::info;
use serde::{Deserialize, Serialize};

use crate::options::TimerOptions;

/// Process-wide timer defaults
///
/// Tickr's configuration is stored in a TOML file in the current user's
/// config directory, which is `~/.config/tickr/config.toml` by default.
///
/// A config can be loaded from a file with [`Config::load`].
/// You can also use [`Config::init`] or [`Config::init_default`] to create
/// a default config file if one does not exist at the given path.
///
/// To save a config to the filesystem, use [`Config::save`]. To put it to
/// use, build a [`Registry`](crate::Registry) with
/// [`Registry::from_config`](crate::Registry::from_config).
///
/// ## File Format
///
/// ```toml
/// store = true
///
/// [options]
/// format_output = "HH:MM:SS"
/// pad_raw = false
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Whether new timers join the registry unless their options say otherwise
    ///
    /// Default is `false`.
    #[serde(default)]
    pub store: bool,
    /// Options applied to every timer created through a registry
    ///
    /// Options passed when creating a timer take precedence.
    #[serde(default)]
    pub options: TimerOptions,
}

impl Config {
    /// Returns the current config, creating a default config file if one does not exist
    pub fn init(config_path: &Path) -> Result<Self> {
        if let Some(conf) = Config::load(config_path)? {
            Ok(conf)
        } else {
            let conf = Config::default();

            info!(
                "Creating config file at {}",
                config_path.display().to_string().cyan()
            );

            conf.save(config_path)?;

            Ok(conf)
        }
    }

    /// Returns the current config from the default location, and creates the file if one does not exist
    pub fn init_default() -> Result<Self> {
        let path = default_config_path()?;
        Self::init(&path)
    }

    /// Reads a TOML config file
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let config_str = read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let config: Config =
            toml::from_str(&config_str).with_context(|| "Failed to parse config from TOML")?;

        config
            .options
            .validate()
            .with_context(|| format!("Invalid timer options in {}", path.display()))?;

        Ok(Some(config))
    }

    /// Write this config file to the filesystem
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string(&self)
            .with_context(|| "Unable to format config as TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create config directory {}", parent.display()))?;
        }

        std::fs::write(path, toml)
            .with_context(|| format!("Unable to write config TOML to path {}", path.display()))
    }
}

/// Get the default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    let conf_path = ProjectDirs::from("dev", "Cosmicrose", "Tickr")
        .with_context(|| "Unable to determine XDG directories")?
        .config_dir()
        .join("config.toml");

    Ok(conf_path)
}
