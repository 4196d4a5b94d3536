//! Config handling: logging setup and the settings file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::log::LevelFilter;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::json::to_pretty_vec;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// What we remember between runs.
///
/// Unknown keys in the file are ignored and missing keys take their defaults,
/// so older and newer files keep loading.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OpenAI API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Settings {
    /// Settings holding just this API key, trimmed.
    pub fn with_api_key(api_key: impl AsRef<str>) -> Self {
        let api_key = api_key.as_ref().trim();
        Self {
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
        }
    }

    /// The stored API key, if it isn't blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Result of reading the settings file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Loaded {
    /// The file was read and parsed.
    Stored(Settings),
    /// There was nothing to read, defaults apply.
    Defaulted,
}

impl Loaded {
    /// The settings, defaults when nothing was stored.
    pub fn into_settings(self) -> Settings {
        match self {
            Self::Stored(settings) => settings,
            Self::Defaulted => Settings::default(),
        }
    }
}

/// Reads and writes [`Settings`] as JSON at a fixed path.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the settings file.
    ///
    /// A missing or blank file is [`Loaded::Defaulted`]; anything else that
    /// can't be read or parsed is an error.
    pub fn load(&self) -> Result<Loaded, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Loaded::Defaulted),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(Loaded::Defaulted);
        }

        serde_json::from_str(&raw)
            .map(Loaded::Stored)
            .map_err(|source| ConfigError::Malformed {
                path: self.path.clone(),
                source,
            })
    }

    /// Reads the settings file, falling back to defaults on any problem.
    pub fn load_or_default(&self) -> Settings {
        match self.load() {
            Ok(Loaded::Stored(settings)) => {
                debug!("Loaded settings from {}", self.path.display());
                settings
            }
            Ok(Loaded::Defaulted) => {
                debug!("No settings at {}, using defaults", self.path.display());
                Settings::default()
            }
            Err(err) => {
                warn!("Ignoring unreadable settings: {err}");
                Settings::default()
            }
        }
    }

    /// Replaces the settings file with `settings`.
    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let bytes = to_pretty_vec(settings).map_err(|source| ConfigError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, bytes).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Saves the settings, logging instead of failing. Returns whether the
    /// file was written.
    pub fn save_or_warn(&self, settings: &Settings) -> bool {
        match self.save(settings) {
            Ok(()) => {
                debug!("Saved settings to {}", self.path.display());
                true
            }
            Err(err) => {
                warn!("Couldn't save settings: {err}");
                false
            }
        }
    }
}
