//! Hash-table storage
//!
//! A plain hash set of statements with insertion-sequence numbers. It has
//! no secondary indexes, so every pattern lookup is a linear scan, and it
//! does not report a count; models size it by enumeration.

use super::{Position, Storage, StorageConfig, StorageError, StorageKind, StorageResult};
use crate::rdf::{Node, Statement};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::ops::Bound;

type Triple = (Node, Node, Node);

/// Hash-table statement store
#[derive(Debug, Default)]
pub struct HashesStorage {
    by_seq: BTreeMap<u64, Triple>,
    seq_of: FxHashMap<Triple, u64>,
    next_seq: u64,
}

impl HashesStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a `hashes` configuration
    ///
    /// Only the in-memory hash type is available; `hash_type` defaults to
    /// `memory`.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        match config.text_option("hash_type").as_deref() {
            None | Some("memory") => Ok(Self::new()),
            Some(other) => Err(StorageError::InvalidOption {
                key: "hash-type".to_string(),
                reason: format!("unsupported hash type '{}'", other),
            }),
        }
    }

    fn key(statement: &Statement) -> Option<Triple> {
        let (s, p, o) = statement.as_triple()?;
        Some((s.clone(), p.clone(), o.clone()))
    }
}

impl Storage for HashesStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Hashes
    }

    fn insert(&mut self, statement: &Statement) -> StorageResult<bool> {
        if !statement.is_insertable() {
            return Ok(false);
        }
        let Some(triple) = Self::key(statement) else {
            return Ok(false);
        };
        if self.seq_of.contains_key(&triple) {
            return Ok(false);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_of.insert(triple.clone(), seq);
        self.by_seq.insert(seq, triple);
        Ok(true)
    }

    fn remove(&mut self, statement: &Statement) -> StorageResult<bool> {
        let Some(triple) = Self::key(statement) else {
            return Ok(false);
        };
        match self.seq_of.remove(&triple) {
            Some(seq) => {
                self.by_seq.remove(&seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn contains(&self, statement: &Statement) -> bool {
        Self::key(statement)
            .map(|triple| self.seq_of.contains_key(&triple))
            .unwrap_or(false)
    }

    fn count(&self) -> Option<usize> {
        None
    }

    fn next_match(&self, pattern: &Statement, position: Position) -> Option<(Statement, Position)> {
        let start = match position {
            Position::Start => Bound::Unbounded,
            Position::After(seq) => Bound::Excluded(u64::try_from(seq).ok()?),
        };
        self.by_seq
            .range((start, Bound::Unbounded))
            .map(|(seq, (s, p, o))| (Statement::from_stored(s.clone(), p.clone(), o.clone()), *seq))
            .find(|(statement, _)| pattern.matches(statement))
            .map(|(statement, seq)| (statement, Position::After(u128::from(seq))))
    }
}
