//! The recognized variable set and the values extracted for it

use crate::error::{Error, Result};
use crate::legacy::{Binding, Namespace, SettingValue};
use crate::secrets::SecretString;
use std::collections::BTreeMap;

/// Name of the secret key in the legacy settings
pub const SECRET_KEY: &str = "SECRET_KEY";

/// Name the secret key is exported under in the secrets file
pub const SECRET_KEY_EXPORT: &str = "DJANGO_SECRET_KEY";

/// Every legacy setting the migrator carries over, in declaration order
pub const RECOGNIZED_VARIABLES: [&str; 6] = [
    SECRET_KEY,
    "ENABLE_SAML",
    "ENABLE_ELECTRONIC_VOTING",
    "JITSI_DOMAIN",
    "JITSI_ROOM_NAME",
    "JITSI_ROOM_PASSWORD",
];

/// Recognized variables found in a namespace, ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedValues {
    values: BTreeMap<String, SettingValue>,
}

impl ExtractedValues {
    /// Move every recognized variable out of the namespace.
    ///
    /// A recognized variable bound to an opaque expression, or only bound
    /// conditionally, is an error: its value cannot be known without
    /// executing the module.
    pub fn from_namespace(mut namespace: Namespace) -> Result<Self> {
        let mut values = BTreeMap::new();
        for name in RECOGNIZED_VARIABLES {
            let Some(entry) = namespace.take(name) else {
                continue;
            };
            match entry.binding {
                Binding::Value(value) => {
                    values.insert(name.to_string(), value);
                }
                Binding::Opaque(expression) => {
                    return Err(Error::UnsupportedValue {
                        name: name.to_string(),
                        line: entry.line,
                        expression,
                    });
                }
                Binding::Conditional => {
                    return Err(Error::ConditionalValue {
                        name: name.to_string(),
                        line: entry.line,
                    });
                }
            }
        }
        Ok(Self { values })
    }

    /// Recognized variables the namespace did not define
    pub fn missing(&self) -> Vec<&'static str> {
        RECOGNIZED_VARIABLES
            .into_iter()
            .filter(|name| !self.values.contains_key(*name))
            .collect()
    }

    /// Remove the secret key, leaving only environment settings.
    ///
    /// Fails when the legacy settings never defined it.
    pub fn split_secret(mut self) -> Result<(SecretString, ExtractedValues)> {
        let secret = match self.values.remove(SECRET_KEY) {
            Some(SettingValue::Str(text)) => text,
            Some(other) => other.to_string(),
            None => return Err(Error::MissingSecretKey(SECRET_KEY.to_string())),
        };
        Ok((SecretString::new(secret), self))
    }

    /// Values in ascending name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}
