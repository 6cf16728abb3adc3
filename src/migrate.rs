//! The settings migration procedure
//!
//! ```text
//! settings.py ──sanitize──▶ settings_tmp.py ──load──▶ Namespace
//!                                                        │ extract
//!                                                        ▼
//!                       secrets/django.env ◀── secret ── ExtractedValues
//!                       .env (append)      ◀── rest ─────┘
//! ```
//!
//! The steps run strictly in sequence. Any failure aborts the run and
//! leaves already written output files as they are. The scratch file is
//! removed on every exit path.

use crate::config::{Layout, MigrateConfig};
use crate::error::{Error, Result};
use crate::legacy::{sanitize, Namespace, StatementClassifier};
use crate::output;
use crate::variables::ExtractedValues;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Summary of a completed migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Settings appended to the environment file, in written order
    pub env_keys: Vec<String>,
    /// Recognized variables the legacy settings did not define
    pub missing: Vec<&'static str>,
    /// Base settings imports replaced during sanitizing
    pub neutralized_imports: usize,
    /// Whether the secrets directory was created by this run
    pub created_secrets_dir: bool,
    pub secrets_file: PathBuf,
    pub env_file: PathBuf,
}

/// Migrates one legacy settings module
pub struct Migrator {
    layout: Layout,
    base_module: String,
    classifier: StatementClassifier,
}

impl Migrator {
    /// Create a migrator for the working directory `root`
    pub fn new(config: &MigrateConfig, root: &Path) -> Result<Self> {
        Ok(Self {
            layout: config.layout(root),
            base_module: config.base_settings_module.clone(),
            classifier: StatementClassifier::new()?,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Run the migration
    pub fn run(&self) -> Result<MigrationReport> {
        let layout = &self.layout;
        tracing::info!("Migrating {}", layout.source.display());

        let source = fs::read_to_string(&layout.source)
            .map(Zeroizing::new)
            .map_err(|source| Error::Read {
                path: layout.source.clone(),
                source,
            })?;
        let sanitized = sanitize(&source, &self.base_module, &self.classifier)?;
        let text = Zeroizing::new(sanitized.text);

        let scratch = ScratchFile::create(&layout.scratch, &text)?;
        let namespace = Namespace::load(&scratch.read()?, &self.classifier)?;

        let extracted = ExtractedValues::from_namespace(namespace)?;
        let missing = extracted.missing();
        let (secret, env_values) = extracted.split_secret()?;

        let created_secrets_dir = output::ensure_dir(&layout.secrets_dir)?;
        output::write_secrets(&layout.secrets_file, &secret)?;
        output::append_env(&layout.env_file, &env_values)?;

        scratch.remove()?;

        Ok(MigrationReport {
            env_keys: env_values.keys(),
            missing,
            neutralized_imports: sanitized.replaced,
            created_secrets_dir,
            secrets_file: layout.secrets_file.clone(),
            env_file: layout.env_file.clone(),
        })
    }
}

/// The sanitized copy of the legacy settings. Deleted on drop unless
/// [`ScratchFile::remove`] already did so.
struct ScratchFile {
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    fn create(path: &Path, content: &str) -> Result<Self> {
        fs::write(path, content).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Wrote sanitized settings to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            removed: false,
        })
    }

    fn read(&self) -> Result<Zeroizing<String>> {
        fs::read_to_string(&self.path)
            .map(Zeroizing::new)
            .map_err(|source| Error::Read {
                path: self.path.clone(),
                source,
            })
    }

    fn remove(mut self) -> Result<()> {
        self.removed = true;
        fs::remove_file(&self.path)?;
        tracing::debug!("Removed {}", self.path.display());
        Ok(())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}
