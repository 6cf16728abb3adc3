//! In-memory handling of the legacy secret key
//!
//! The secret key is the only sensitive value the migrator touches. Once
//! extracted it is moved into a [`SecretString`], which is zeroized on drop
//! and printed as `[REDACTED]` by `Debug` and `Display`.
//!
//! The migrator also zeroizes the buffers holding the legacy source text.
//! Copies made along the way (reallocations while reading, the literal
//! parser's working strings) are not tracked.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that zeroizes its contents on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Wrap a secret value
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    /// Borrow the secret value.
    ///
    /// Only the secrets file writer should call this.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
