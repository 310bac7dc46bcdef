use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropertiesError {
    #[error("failed to read properties file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed property `{0}`, expected key=value")]
    Malformed(String),

    #[error("invalid value `{value}` for property `{key}`")]
    InvalidValue { key: String, value: String },
}

/// Flat string properties handed to a binding's `init`, in the style of
/// YCSB's `-p`/`-P` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` lines. Blank lines and lines starting with `#` or
    /// `!` are ignored.
    pub fn parse(text: &str) -> Result<Self, PropertiesError> {
        let mut props = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            props.set_pair(line)?;
        }
        Ok(props)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PropertiesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PropertiesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Apply a single `key=value` override.
    pub fn set_pair(&mut self, pair: &str) -> Result<(), PropertiesError> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| PropertiesError::Malformed(pair.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(PropertiesError::Malformed(pair.to_string()));
        }
        self.set(key, value.trim());
        Ok(())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Typed lookup falling back to `default` when the key is absent.
    pub fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, PropertiesError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| PropertiesError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Entries of `other` win over entries already present.
    pub fn merge(&mut self, other: Properties) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
