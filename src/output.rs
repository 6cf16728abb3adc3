//! Writers for the migrated configuration files
//!
//! - The secrets file is rewritten on every run and holds a single
//!   `DJANGO_SECRET_KEY='...'` line.
//! - The environment file is only ever appended to, one `NAME=value` line
//!   per setting, so repeated runs accumulate lines.
//!
//! Values are interpolated verbatim. A value containing a line break or `=`
//! produces a line that env loaders will misread; such values are written
//! anyway and reported with a warning.

use crate::error::{Error, Result};
use crate::secrets::SecretString;
use crate::variables::{ExtractedValues, SECRET_KEY_EXPORT};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use zeroize::Zeroizing;

/// Create the secrets directory. Returns whether it had to be created.
pub fn ensure_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path)?;
    tracing::debug!("Created directory {}", path.display());
    Ok(true)
}

/// Render the secrets file line
pub fn secret_line(secret: &SecretString) -> Zeroizing<String> {
    Zeroizing::new(format!(
        "{}='{}'\n",
        SECRET_KEY_EXPORT,
        secret.expose_secret()
    ))
}

/// Create or overwrite the secrets file
pub fn write_secrets(path: &Path, secret: &SecretString) -> Result<()> {
    if secret.expose_secret().contains(['\n', '\'']) {
        tracing::warn!(
            "{} contains a quote or line break; {} will not parse cleanly",
            SECRET_KEY_EXPORT,
            path.display()
        );
    }
    let line = secret_line(secret);
    fs::write(path, line.as_bytes()).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Wrote {} to {}", SECRET_KEY_EXPORT, path.display());
    Ok(())
}

/// Render one environment file line
pub fn env_line(name: &str, value: &str) -> String {
    format!("{}={}\n", name, value)
}

/// Append the settings to the environment file, sorted by name.
/// Returns the number of lines written.
pub fn append_env(path: &Path, values: &ExtractedValues) -> Result<usize> {
    let mut content = String::new();
    for (name, value) in values.iter() {
        let rendered = value.to_string();
        if rendered.contains(['\n', '\r', '=']) {
            tracing::warn!(
                "Value of {} contains a line break or '='; the line in {} may be misread",
                name,
                path.display()
            );
        }
        content.push_str(&env_line(name, &rendered));
    }

    let write_error = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_error)?;
    file.write_all(content.as_bytes()).map_err(write_error)?;

    tracing::info!("Appended {} settings to {}", values.len(), path.display());
    Ok(values.len())
}
