//! Site configuration for `bib-pages.toml`.
//!
//! Every key is optional; a missing file means all defaults.
//!
//! ```toml
//! bibliography = "reference.bib"
//! includes_dir = "_includes"
//! pages_dir = "publications"
//! assets_dir = "cv"
//! highlight_author = "Jane Doe"
//! detail_pages = true
//! lint_header = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Name of the configuration file looked up in the site root.
pub const CONFIG_FILE: &str = "bib-pages.toml";

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in '{}': {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("configuration error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bibliography file
    pub bibliography: PathBuf,
    /// Directory receiving the category partials
    pub includes_dir: PathBuf,
    /// Directory receiving one `<key>/index.qmd` page per publication
    pub pages_dir: PathBuf,
    /// Directory that `file` fields are relative to
    pub assets_dir: Option<PathBuf>,
    /// Author name emphasised in author lists
    pub highlight_author: Option<String>,
    /// Generate and link publication detail pages
    pub detail_pages: bool,
    /// Prefix partials with a markdownlint-disable comment
    pub lint_header: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bibliography: PathBuf::from("reference.bib"),
            includes_dir: PathBuf::from("_includes"),
            pages_dir: PathBuf::from("publications"),
            assets_dir: None,
            highlight_author: None,
            detail_pages: true,
            lint_header: true,
        }
    }
}

impl Config {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Toml { source, .. } => ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given (it must exist), otherwise `<root>/bib-pages.toml`
    /// when present, otherwise the defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = root.join(CONFIG_FILE);
        if default_path.is_file() {
            Self::load(&default_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bibliography.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "`bibliography` must not be empty".to_string(),
            ));
        }
        if self.detail_pages && self.pages_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "`pages_dir` must not be empty when `detail_pages` is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
