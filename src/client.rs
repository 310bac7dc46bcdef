use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::properties::PropertiesError;

/// Field name to value mapping stored under one key.
pub type Record = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("key `{0}` not found")]
    NotFound(String),

    #[error("record at `{0}` is empty")]
    EmptyRecord(String),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("configuration error: {0}")]
    Config(#[from] PropertiesError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("failed to decode record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("concurrent modification of `{0}`")]
    Conflict(String),

    #[error("unresolved siblings for `{key}` ({count} values)")]
    Siblings { key: String, count: usize },
}

/// Outcome of one benchmark operation. `code()` collapses every failure to 1
/// while the variants keep not-found apart from other failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Status {
    Ok,
    NotFound,
    Error,
    NotImplemented,
}

impl Status {
    pub fn code(&self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::NotFound | Status::Error | Status::NotImplemented => 1,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == Status::Ok
    }

    pub fn name(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "NOT_FOUND",
            Status::Error => "ERROR",
            Status::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&ClientError> for Status {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::NotFound(_) | ClientError::EmptyRecord(_) => Status::NotFound,
            ClientError::NotImplemented(_) => Status::NotImplemented,
            _ => Status::Error,
        }
    }
}

impl<T> From<&Result<T, ClientError>> for Status {
    fn from(result: &Result<T, ClientError>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(err) => Status::from(err),
        }
    }
}

/// Generic key-value benchmark contract. One instance is owned by one worker.
#[async_trait]
pub trait Client: Send + Sync {
    /// Insert a record under `key` in `table`
    async fn insert(&self, table: &str, key: &str, values: &Record) -> Result<(), ClientError>;

    /// Read a record. `fields` selects a subset, `None` means all fields
    async fn read(
        &self,
        table: &str,
        key: &str,
        fields: Option<&HashSet<String>>,
    ) -> Result<Record, ClientError>;

    /// Overwrite the given fields of an existing record
    async fn update(&self, table: &str, key: &str, values: &Record) -> Result<(), ClientError>;

    /// Delete a record
    async fn delete(&self, table: &str, key: &str) -> Result<(), ClientError>;

    /// Read up to `record_count` records starting at `start_key`
    async fn scan(
        &self,
        table: &str,
        start_key: &str,
        record_count: usize,
        fields: Option<&HashSet<String>>,
    ) -> Result<Vec<Record>, ClientError>;
}
