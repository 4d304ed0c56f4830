//! Indexed in-memory storage
//!
//! Nodes are interned in a [`Dictionary`] and each statement is kept as
//! three packed id triples, one per index ordering:
//!
//! - SPO: subject, predicate, object
//! - POS: predicate, object, subject
//! - OSP: object, subject, predicate
//!
//! Every pattern with at least one bound part maps onto a prefix range of
//! one of these orderings, so lookups never scan statements that cannot
//! match.
//!
//! Dictionary ids are reference counted by the statements using them. An id
//! that becomes unused is freed straight away, or at the end of the open
//! transaction so journal keys stay resolvable until then.

use super::dictionary::{Dictionary, TermId};
use super::{Position, Storage, StorageConfig, StorageError, StorageKind, StorageResult};
use crate::rdf::{Node, Statement};
use std::collections::BTreeSet;
use std::ops::Bound;
use tracing::{debug, warn};

type Key = u128;

const MAX_ID: u32 = u32::MAX;

fn pack(a: TermId, b: TermId, c: TermId) -> Key {
    (u128::from(a.0) << 64) | (u128::from(b.0) << 32) | u128::from(c.0)
}

fn unpack(key: Key) -> (TermId, TermId, TermId) {
    (
        TermId((key >> 64) as u32),
        TermId((key >> 32) as u32),
        TermId(key as u32),
    )
}

/// Index ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Spo,
    Pos,
    Osp,
}

impl Order {
    /// Key of an (s, p, o) triple in this ordering
    fn key(self, s: TermId, p: TermId, o: TermId) -> Key {
        match self {
            Order::Spo => pack(s, p, o),
            Order::Pos => pack(p, o, s),
            Order::Osp => pack(o, s, p),
        }
    }

    /// Inverse of [`Order::key`]
    fn triple(self, key: Key) -> (TermId, TermId, TermId) {
        let (a, b, c) = unpack(key);
        match self {
            Order::Spo => (a, b, c),
            Order::Pos => (c, a, b),
            Order::Osp => (b, c, a),
        }
    }
}

/// Index and key range a pattern is answered from
#[derive(Debug, Clone, Copy)]
enum Plan {
    /// Every part bound: membership test on SPO
    Exact(Key),
    Range { order: Order, low: Key, high: Key },
}

impl Plan {
    fn prefix1(order: Order, a: TermId) -> Self {
        let zero = TermId(0);
        let max = TermId(MAX_ID);
        Plan::Range {
            order,
            low: pack(a, zero, zero),
            high: pack(a, max, max),
        }
    }

    fn prefix2(order: Order, a: TermId, b: TermId) -> Self {
        Plan::Range {
            order,
            low: pack(a, b, TermId(0)),
            high: pack(a, b, TermId(MAX_ID)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum JournalEntry {
    Inserted(Key),
    Removed(Key),
}

/// Indexed in-memory statement store
///
/// Transactions are supported through an undo journal: rollback restores
/// the statement set exactly as it was at `transaction_start`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    dictionary: Dictionary,
    spo: BTreeSet<Key>,
    pos: BTreeSet<Key>,
    osp: BTreeSet<Key>,
    journal: Option<Vec<JournalEntry>>,
    /// Ids that lost their last reference during the open transaction
    unreferenced: Vec<TermId>,
    read_only: bool,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store honoring the `read_only` option
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let mut storage = Self::new();
        storage.read_only = config.bool_option("read_only")?.unwrap_or(false);
        Ok(storage)
    }

    /// Number of stored statements
    pub fn len(&self) -> usize {
        self.spo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spo.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn index(&self, order: Order) -> &BTreeSet<Key> {
        match order {
            Order::Spo => &self.spo,
            Order::Pos => &self.pos,
            Order::Osp => &self.osp,
        }
    }

    fn ids(&self, statement: &Statement) -> Option<(TermId, TermId, TermId)> {
        let (s, p, o) = statement.as_triple()?;
        Some((
            self.dictionary.lookup(s)?,
            self.dictionary.lookup(p)?,
            self.dictionary.lookup(o)?,
        ))
    }

    fn add_key(&mut self, spo: Key) -> bool {
        let (s, p, o) = unpack(spo);
        if !self.spo.insert(spo) {
            return false;
        }
        self.pos.insert(Order::Pos.key(s, p, o));
        self.osp.insert(Order::Osp.key(s, p, o));
        for id in [s, p, o] {
            self.dictionary.acquire(id);
        }
        true
    }

    fn remove_key(&mut self, spo: Key) -> bool {
        let (s, p, o) = unpack(spo);
        if !self.spo.remove(&spo) {
            return false;
        }
        self.pos.remove(&Order::Pos.key(s, p, o));
        self.osp.remove(&Order::Osp.key(s, p, o));
        for id in [s, p, o] {
            if self.dictionary.unref(id) {
                self.discard(id);
            }
        }
        true
    }

    /// Free an unreferenced id, or defer it while a transaction is open
    fn discard(&mut self, id: TermId) {
        if self.journal.is_some() {
            self.unreferenced.push(id);
        } else {
            self.dictionary.release(id);
        }
    }

    /// Free the ids deferred during a transaction that are still unused
    fn sweep(&mut self) {
        let freed = self
            .unreferenced
            .drain(..)
            .filter(|&id| self.dictionary.release(id))
            .count();
        if freed > 0 {
            debug!("Released {} unused dictionary ids", freed);
        }
    }

    /// Intern all three nodes; ids interned before a failure are discarded
    fn intern_triple(&mut self, s: &Node, p: &Node, o: &Node) -> StorageResult<Key> {
        let mut ids = Vec::with_capacity(3);
        for node in [s, p, o] {
            match self.dictionary.intern(node) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    for id in ids {
                        self.discard(id);
                    }
                    return Err(e);
                }
            }
        }
        Ok(pack(ids[0], ids[1], ids[2]))
    }

    fn record(&mut self, entry: JournalEntry) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(entry);
        }
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Choose the index for a pattern; `None` if a bound node was never
    /// stored, in which case nothing can match
    fn plan(&self, pattern: &Statement) -> Option<Plan> {
        let id = |node: Option<&Node>| -> Option<Option<TermId>> {
            match node {
                None => Some(None),
                Some(node) => self.dictionary.lookup(node).map(Some),
            }
        };
        let s = id(pattern.subject())?;
        let p = id(pattern.predicate())?;
        let o = id(pattern.object())?;

        let plan = match (s, p, o) {
            (Some(s), Some(p), Some(o)) => Plan::Exact(pack(s, p, o)),
            (Some(s), Some(p), None) => Plan::prefix2(Order::Spo, s, p),
            (Some(s), None, None) => Plan::prefix1(Order::Spo, s),
            (None, Some(p), Some(o)) => Plan::prefix2(Order::Pos, p, o),
            (None, Some(p), None) => Plan::prefix1(Order::Pos, p),
            (Some(s), None, Some(o)) => Plan::prefix2(Order::Osp, o, s),
            (None, None, Some(o)) => Plan::prefix1(Order::Osp, o),
            (None, None, None) => Plan::Range {
                order: Order::Spo,
                low: 0,
                high: Key::MAX,
            },
        };
        Some(plan)
    }

    fn materialize(&self, (s, p, o): (TermId, TermId, TermId)) -> Option<Statement> {
        Some(Statement::from_stored(
            self.dictionary.resolve(s)?.clone(),
            self.dictionary.resolve(p)?.clone(),
            self.dictionary.resolve(o)?.clone(),
        ))
    }
}

impl Storage for MemoryStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    fn insert(&mut self, statement: &Statement) -> StorageResult<bool> {
        self.check_writable()?;
        if !statement.is_insertable() {
            return Ok(false);
        }
        if let Some((s, p, o)) = self.ids(statement) {
            if self.spo.contains(&pack(s, p, o)) {
                return Ok(false);
            }
        }
        let Some((s, p, o)) = statement.as_triple() else {
            return Ok(false);
        };
        let key = self.intern_triple(s, p, o)?;
        let inserted = self.add_key(key);
        if inserted {
            self.record(JournalEntry::Inserted(key));
        }
        Ok(inserted)
    }

    fn remove(&mut self, statement: &Statement) -> StorageResult<bool> {
        self.check_writable()?;
        let Some((s, p, o)) = self.ids(statement) else {
            return Ok(false);
        };
        let key = pack(s, p, o);
        let removed = self.remove_key(key);
        if removed {
            self.record(JournalEntry::Removed(key));
        }
        Ok(removed)
    }

    fn contains(&self, statement: &Statement) -> bool {
        self.ids(statement)
            .map(|(s, p, o)| self.spo.contains(&pack(s, p, o)))
            .unwrap_or(false)
    }

    fn count(&self) -> Option<usize> {
        Some(self.len())
    }

    fn next_match(&self, pattern: &Statement, position: Position) -> Option<(Statement, Position)> {
        match self.plan(pattern)? {
            Plan::Exact(key) => {
                if position != Position::Start || !self.spo.contains(&key) {
                    return None;
                }
                let statement = self.materialize(unpack(key))?;
                Some((statement, Position::After(key)))
            }
            Plan::Range { order, low, high } => {
                let start = match position {
                    Position::Start => Bound::Included(low),
                    Position::After(key) if key >= high => return None,
                    Position::After(key) if key < low => Bound::Included(low),
                    Position::After(key) => Bound::Excluded(key),
                };
                let key = *self.index(order).range((start, Bound::Included(high))).next()?;
                let statement = self.materialize(order.triple(key))?;
                Some((statement, Position::After(key)))
            }
        }
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn transaction_start(&mut self) -> StorageResult<()> {
        if self.journal.is_some() {
            return Err(StorageError::TransactionAlreadyActive);
        }
        self.journal = Some(Vec::new());
        debug!("Memory storage transaction started");
        Ok(())
    }

    fn transaction_commit(&mut self) -> StorageResult<()> {
        let journal = self.journal.take().ok_or(StorageError::NoActiveTransaction)?;
        self.sweep();
        debug!("Memory storage transaction committed ({} changes)", journal.len());
        Ok(())
    }

    fn transaction_rollback(&mut self) -> StorageResult<()> {
        // The journal stays open while replaying so freed ids are deferred
        let journal = self
            .journal
            .as_mut()
            .map(std::mem::take)
            .ok_or(StorageError::NoActiveTransaction)?;
        let changes = journal.len();
        for entry in journal.into_iter().rev() {
            match entry {
                JournalEntry::Inserted(key) => {
                    self.remove_key(key);
                }
                JournalEntry::Removed(key) => {
                    self.add_key(key);
                }
            }
        }
        self.journal = None;
        self.sweep();
        debug!("Memory storage transaction rolled back ({} changes undone)", changes);
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        if self.journal.take().is_some() {
            warn!("Closing memory storage with an open transaction; uncommitted changes are kept");
            self.sweep();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(uri: &str) -> Node {
        Node::iri(uri).unwrap()
    }

    fn stmt(s: &str, p: &str, o: impl Into<Node>) -> Statement {
        Statement::triple(iri(s), iri(p), o)
    }

    fn sample() -> MemoryStorage {
        let mut storage = MemoryStorage::new();
        for p in ["http://ex.org/p1", "http://ex.org/p2", "http://ex.org/p3"] {
            storage.insert(&stmt("http://ex.org/s1", p, "v")).unwrap();
        }
        storage.insert(&stmt("http://ex.org/s2", "http://ex.org/p1", "v")).unwrap();
        storage.insert(&stmt("http://ex.org/s2", "http://ex.org/p2", 7i64)).unwrap();
        storage
    }

    #[test]
    fn test_insert_and_duplicates() {
        let mut storage = MemoryStorage::new();
        let s = stmt("http://ex.org/s", "http://ex.org/p", "hello");

        assert!(storage.insert(&s).unwrap());
        assert!(!storage.insert(&s).unwrap());
        assert_eq!(storage.count(), Some(1));
        assert!(storage.contains(&s));
    }

    #[test]
    fn test_invalid_statements_rejected() {
        let mut storage = MemoryStorage::new();

        let literal_subject = Statement::triple("s", iri("http://ex.org/p"), "o");
        assert!(!storage.insert(&literal_subject).unwrap());

        let pattern = Statement::new().with_subject(iri("http://ex.org/s"));
        assert!(!storage.insert(&pattern).unwrap());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut storage = sample();
        let s = stmt("http://ex.org/s1", "http://ex.org/p2", "v");

        assert!(storage.remove(&s).unwrap());
        assert!(!storage.remove(&s).unwrap());
        assert!(!storage.contains(&s));
        assert_eq!(storage.len(), 4);
        assert_eq!(storage.find_matching(Statement::new().with_predicate(iri("http://ex.org/p2"))).count(), 1);
    }

    #[test]
    fn test_find_by_each_plan() {
        let storage = sample();
        let count = |pattern: Statement| storage.find_matching(pattern).count();

        assert_eq!(count(Statement::new()), 5);
        assert_eq!(count(Statement::new().with_subject(iri("http://ex.org/s1"))), 3);
        assert_eq!(
            count(Statement::new().with_subject(iri("http://ex.org/s1")).with_predicate(iri("http://ex.org/p2"))),
            1
        );
        assert_eq!(count(Statement::new().with_predicate(iri("http://ex.org/p1"))), 2);
        assert_eq!(count(Statement::new().with_object("v")), 4);
        assert_eq!(
            count(Statement::new().with_predicate(iri("http://ex.org/p2")).with_object(7i64)),
            1
        );
        assert_eq!(
            count(Statement::new().with_subject(iri("http://ex.org/s2")).with_object("v")),
            1
        );
        assert_eq!(count(stmt("http://ex.org/s2", "http://ex.org/p2", 7i64)), 1);
        assert_eq!(count(Statement::new().with_object("never stored")), 0);
    }

    #[test]
    fn test_resume_skips_removed_statements() {
        let mut storage = sample();
        let pattern = Statement::new().with_subject(iri("http://ex.org/s1"));

        let (first, position) = storage.next_match(&pattern, Position::Start).unwrap();
        storage.remove(&first).unwrap();

        let rest: Vec<_> = std::iter::successors(storage.next_match(&pattern, position), |(_, pos)| {
            storage.next_match(&pattern, *pos)
        })
        .map(|(s, _)| s)
        .collect();
        assert_eq!(rest.len(), 2);
        assert!(!rest.contains(&first));
    }

    #[test]
    fn test_rollback_restores_state() {
        let mut storage = sample();
        let before: Vec<_> = storage.all_statements().collect();

        storage.transaction_start().unwrap();
        storage.insert(&stmt("http://ex.org/s3", "http://ex.org/p1", "new")).unwrap();
        storage.remove(&stmt("http://ex.org/s1", "http://ex.org/p1", "v")).unwrap();
        storage.transaction_rollback().unwrap();

        let after: Vec<_> = storage.all_statements().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut storage = MemoryStorage::new();
        storage.transaction_start().unwrap();
        assert!(matches!(storage.transaction_start(), Err(StorageError::TransactionAlreadyActive)));
        storage.insert(&stmt("http://ex.org/s", "http://ex.org/p", "o")).unwrap();
        storage.transaction_commit().unwrap();

        assert_eq!(storage.len(), 1);
        assert!(matches!(storage.transaction_rollback(), Err(StorageError::NoActiveTransaction)));
    }

    #[test]
    fn test_dictionary_shrinks_after_removal() {
        let mut storage = MemoryStorage::new();
        for round in 0..3 {
            for i in 0..500i64 {
                storage
                    .insert(&stmt("http://ex.org/s", "http://ex.org/p", round * 1000 + i))
                    .unwrap();
            }
            assert_eq!(storage.dictionary.len(), 502);
            for statement in storage.all_statements().collect::<Vec<_>>() {
                storage.remove(&statement).unwrap();
            }
            assert!(storage.is_empty());
            assert_eq!(storage.dictionary.len(), 0);
        }
    }

    #[test]
    fn test_shared_nodes_stay_interned() {
        let mut storage = sample();
        storage.remove(&stmt("http://ex.org/s2", "http://ex.org/p2", 7i64)).unwrap();

        assert_eq!(storage.dictionary.lookup(&Node::from(7i64)), None);
        assert!(storage.dictionary.lookup(&iri("http://ex.org/s2")).is_some());
        assert!(storage.dictionary.lookup(&iri("http://ex.org/p2")).is_some());
        assert_eq!(storage.find_matching(Statement::new().with_subject(iri("http://ex.org/s2"))).count(), 1);
    }

    #[test]
    fn test_rollback_after_removing_last_use() {
        let mut storage = MemoryStorage::new();
        let original = stmt("http://ex.org/s", "http://ex.org/p", "only");
        storage.insert(&original).unwrap();

        storage.transaction_start().unwrap();
        storage.remove(&original).unwrap();
        // Reuse the now unreferenced subject, then drop it again
        let other = stmt("http://ex.org/s", "http://ex.org/q", "other");
        storage.insert(&other).unwrap();
        storage.remove(&other).unwrap();
        storage.transaction_rollback().unwrap();

        assert_eq!(storage.all_statements().collect::<Vec<_>>(), vec![original]);
        assert_eq!(storage.dictionary.len(), 3);

        storage.transaction_start().unwrap();
        storage.insert(&other).unwrap();
        storage.transaction_rollback().unwrap();
        assert_eq!(storage.dictionary.len(), 3);
    }

    #[test]
    fn test_read_only() {
        let config = StorageConfig::memory().with_option("read_only", true);
        let mut storage = MemoryStorage::from_config(&config).unwrap();

        let result = storage.insert(&stmt("http://ex.org/s", "http://ex.org/p", "o"));
        assert!(matches!(result, Err(StorageError::ReadOnly)));
    }
}
