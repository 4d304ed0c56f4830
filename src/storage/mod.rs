//! Pluggable statement storage
//!
//! A [`Storage`] owns the authoritative set of statements behind a model.
//! Backends are selected by [`StorageKind`] through the factories registered
//! on a [`World`]; `memory` is the indexed reference backend, `hashes` a
//! simple hash-table store, `file` and `uri` load (and for `file`, save)
//! RDF documents around an in-memory store.
//!
//! All backends keep set semantics: inserting a statement equal to one
//! already stored is a no-op reported as `false`.

mod dictionary;
mod file;
mod hashes;
mod memory;

pub use file::{FileStorage, UriStorage};
pub use hashes::HashesStorage;
pub use memory::MemoryStorage;

use crate::rdf::Statement;
use crate::World;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Unknown backend name
    #[error("Unknown storage kind: {0}")]
    UnknownKind(String),

    /// No factory registered for the backend kind
    #[error("Storage backend not available: {0}")]
    BackendUnavailable(StorageKind),

    /// Backend construction failed
    #[error("Storage initialization failed: {0}")]
    InitFailed(String),

    /// Backend option has an unusable value
    #[error("Invalid storage option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    /// Mutation on a read-only store
    #[error("Storage is read-only")]
    ReadOnly,

    /// The node dictionary ran out of identifiers
    #[error("Storage capacity exceeded")]
    CapacityExceeded,

    /// Transaction already started
    #[error("Transaction already active")]
    TransactionAlreadyActive,

    /// Commit or rollback without a transaction
    #[error("No active transaction")]
    NoActiveTransaction,

    /// Backend does not support transactions
    #[error("Transactions not supported by {0} storage")]
    TransactionsUnsupported(StorageKind),

    /// Loading or saving the backing document failed
    #[error("Document error: {0}")]
    Document(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Hashes,
    File,
    Uri,
    Tstore,
    Mysql,
    Sqlite,
    Postgresql,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::Hashes => "hashes",
            StorageKind::File => "file",
            StorageKind::Uri => "uri",
            StorageKind::Tstore => "tstore",
            StorageKind::Mysql => "mysql",
            StorageKind::Sqlite => "sqlite",
            StorageKind::Postgresql => "postgresql",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "hashes" => Ok(StorageKind::Hashes),
            "file" => Ok(StorageKind::File),
            "uri" => Ok(StorageKind::Uri),
            "tstore" => Ok(StorageKind::Tstore),
            "mysql" => Ok(StorageKind::Mysql),
            "sqlite" => Ok(StorageKind::Sqlite),
            "postgresql" => Ok(StorageKind::Postgresql),
            _ => Err(StorageError::UnknownKind(s.to_string())),
        }
    }
}

/// Backend option value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(true) => f.write_str("yes"),
            OptionValue::Bool(false) => f.write_str("no"),
            OptionValue::Integer(i) => write!(f, "{}", i),
            OptionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<i64> for OptionValue {
    fn from(i: i64) -> Self {
        OptionValue::Integer(i)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Text(s)
    }
}

/// Storage configuration: backend kind, optional name and backend options
///
/// Deserializable, so callers can keep it in their own JSON or YAML files:
///
/// ```yaml
/// kind: file
/// name: /var/lib/app/graph.rdf
/// options:
///   format: turtle
///   new: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub name: Option<String>,
    pub options: BTreeMap<String, OptionValue>,
}

impl StorageConfig {
    pub fn new(kind: StorageKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self::new(StorageKind::Memory)
    }

    pub fn hashes() -> Self {
        Self::new(StorageKind::Hashes).with_option("hash_type", "memory")
    }

    /// File-backed store; `path` is the document location
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(StorageKind::File).with_name(path)
    }

    /// Read-only store loaded from a `file:` URI
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::new(StorageKind::Uri).with_name(uri)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Look up an option; `-` and `_` in keys are interchangeable
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        let wanted = key.replace('-', "_");
        self.options
            .iter()
            .find(|(k, _)| k.replace('-', "_") == wanted)
            .map(|(_, v)| v)
    }

    /// Boolean option; accepts `true`/`false` and `yes`/`no` text
    pub fn bool_option(&self, key: &str) -> StorageResult<Option<bool>> {
        match self.option(key) {
            None => Ok(None),
            Some(OptionValue::Bool(b)) => Ok(Some(*b)),
            Some(OptionValue::Text(s)) => match s.to_ascii_lowercase().as_str() {
                "yes" | "true" => Ok(Some(true)),
                "no" | "false" => Ok(Some(false)),
                _ => Err(StorageError::InvalidOption {
                    key: key.to_string(),
                    reason: format!("expected yes or no, got '{}'", s),
                }),
            },
            Some(OptionValue::Integer(_)) => Err(StorageError::InvalidOption {
                key: key.to_string(),
                reason: "expected a boolean".to_string(),
            }),
        }
    }

    /// Option rendered as text
    pub fn text_option(&self, key: &str) -> Option<String> {
        self.option(key).map(|v| v.to_string())
    }

    /// Options in `key='value'` form: underscores in keys become dashes and
    /// booleans become `yes`/`no`
    pub fn to_options_string(&self) -> String {
        self.options
            .iter()
            .map(|(key, value)| format!("{}='{}'", key.replace('_', "-"), value))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Resume token for pattern scans
///
/// The value inside `After` is defined by the backend that produced it and
/// is only meaningful when handed back to the same backend with the same
/// pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Start,
    After(u128),
}

/// Statement storage backend
///
/// Implementations must keep set semantics, reject statements failing
/// [`Statement::is_insertable`] by returning `Ok(false)`, and return matches
/// from [`Storage::next_match`] in an order that is stable for a given store
/// and pattern, so that a scan resumed from a [`Position`] never yields the
/// same statement twice.
pub trait Storage: Send + Sync + fmt::Debug {
    fn kind(&self) -> StorageKind;

    /// Insert a complete statement; `false` for duplicates and invalid statements
    fn insert(&mut self, statement: &Statement) -> StorageResult<bool>;

    /// Remove an exact statement; `false` if it was not stored
    fn remove(&mut self, statement: &Statement) -> StorageResult<bool>;

    fn contains(&self, statement: &Statement) -> bool;

    /// Exact statement count, or `None` when only enumeration can tell
    fn count(&self) -> Option<usize>;

    /// First match of `pattern` after `position`, with the position to
    /// resume from
    fn next_match(&self, pattern: &Statement, position: Position) -> Option<(Statement, Position)>;

    /// All statements matching `pattern`
    fn find_matching(&self, pattern: Statement) -> Box<dyn Iterator<Item = Statement> + '_> {
        let mut position = Position::Start;
        Box::new(std::iter::from_fn(move || {
            let (statement, next) = self.next_match(&pattern, position)?;
            position = next;
            Some(statement)
        }))
    }

    fn all_statements(&self) -> Box<dyn Iterator<Item = Statement> + '_> {
        self.find_matching(Statement::new())
    }

    fn supports_transactions(&self) -> bool {
        false
    }

    fn transaction_start(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn transaction_commit(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn transaction_rollback(&mut self) -> StorageResult<()> {
        Ok(())
    }

    /// Release backend resources; called once when the owning model drops
    fn close(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

pub(crate) fn register_builtin_backends(world: &World) {
    world.register_backend(StorageKind::Memory, |_world, config| {
        Ok(Box::new(MemoryStorage::from_config(config)?) as Box<dyn Storage>)
    });
    world.register_backend(StorageKind::Hashes, |_world, config| {
        Ok(Box::new(HashesStorage::from_config(config)?) as Box<dyn Storage>)
    });
    world.register_backend(StorageKind::File, |world, config| {
        Ok(Box::new(FileStorage::open(world, config)?) as Box<dyn Storage>)
    });
    world.register_backend(StorageKind::Uri, |world, config| {
        Ok(Box::new(UriStorage::open(world, config)?) as Box<dyn Storage>)
    });
}
