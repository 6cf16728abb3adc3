//! settings-migrate - Legacy settings to env-file migration
//!
//! Reads `settings.py` from the working directory and writes
//! `secrets/django.env` and `.env` next to it.

use anyhow::{Context, Result};
use clap::Parser;
use settings_migrate::{MigrateConfig, Migrator};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "settings-migrate")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Migrate a legacy settings module into env files")]
struct Cli {
    /// Working directory holding the legacy settings
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Layout configuration file path
    #[arg(short, long, env = "SETTINGS_MIGRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("settings_migrate={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => MigrateConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => MigrateConfig::default(),
    };

    let migrator = Migrator::new(&config, &cli.dir)?;
    let report = migrator
        .run()
        .with_context(|| format!("Failed to migrate {}", migrator.layout().source.display()))?;

    tracing::info!(
        "Migration complete: secret key -> {}, {} settings -> {}",
        report.secrets_file.display(),
        report.env_keys.len(),
        report.env_file.display()
    );
    if !report.missing.is_empty() {
        tracing::info!("Not defined in legacy settings: {}", report.missing.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["settings-migrate"]).unwrap();
        assert_eq!(cli.dir, PathBuf::from("."));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "settings-migrate",
            "--dir",
            "/srv/legacy",
            "--config",
            "layout.toml",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.dir, PathBuf::from("/srv/legacy"));
        assert_eq!(cli.config, Some(PathBuf::from("layout.toml")));
        assert!(cli.verbose);
    }
}
