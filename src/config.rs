//! Migration layout configuration
//!
//! Every location the migrator reads or writes is relative to a working
//! directory. The defaults reproduce the conventional layout of a legacy
//! deployment directory; an optional TOML file can override them:
//!
//! ```toml
//! source = "settings.py"
//! scratch = "settings_tmp.py"
//! secrets_dir = "secrets"
//! secrets_file = "django.env"
//! env_file = ".env"
//! base_settings_module = "openslides.global_settings"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main migration configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrateConfig {
    /// Legacy settings module to migrate
    pub source: PathBuf,

    /// Sanitized copy of the source, removed after the run
    pub scratch: PathBuf,

    /// Directory holding the secrets file
    pub secrets_dir: PathBuf,

    /// Secrets file name inside `secrets_dir`
    pub secrets_file: String,

    /// Environment file that receives the non-secret settings
    pub env_file: PathBuf,

    /// Dotted module path of the legacy base settings import
    pub base_settings_module: String,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("settings.py"),
            scratch: PathBuf::from("settings_tmp.py"),
            secrets_dir: PathBuf::from("secrets"),
            secrets_file: "django.env".to_string(),
            env_file: PathBuf::from(".env"),
            base_settings_module: "openslides.global_settings".to_string(),
        }
    }
}

impl MigrateConfig {
    /// Load a configuration file, falling back to defaults for missing keys
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("Loaded layout configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.secrets_file.is_empty() {
            return Err(Error::Config("secrets_file must not be empty".to_string()));
        }
        if self.secrets_file.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "secrets_file must be a bare file name, got '{}'",
                self.secrets_file
            )));
        }
        if self.source == self.scratch {
            return Err(Error::Config(
                "scratch must differ from source, the scratch file is deleted after the run"
                    .to_string(),
            ));
        }
        if self.base_settings_module.is_empty() {
            return Err(Error::Config(
                "base_settings_module must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve every location against a working directory
    pub fn layout(&self, root: &Path) -> Layout {
        let secrets_dir = root.join(&self.secrets_dir);
        Layout {
            source: root.join(&self.source),
            scratch: root.join(&self.scratch),
            secrets_file: secrets_dir.join(&self.secrets_file),
            secrets_dir,
            env_file: root.join(&self.env_file),
        }
    }
}

/// Resolved file locations for a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub source: PathBuf,
    pub scratch: PathBuf,
    pub secrets_dir: PathBuf,
    pub secrets_file: PathBuf,
    pub env_file: PathBuf,
}
