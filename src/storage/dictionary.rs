//! Node dictionary: interns nodes as compact integer ids

use super::{StorageError, StorageResult};
use crate::rdf::Node;
use rustc_hash::FxHashMap;

/// Interned node id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TermId(pub(crate) u32);

#[derive(Debug)]
struct Entry {
    node: Node,
    refs: u32,
}

/// Reference-counted node dictionary
///
/// Each id counts the stored statement positions that use it. An id whose
/// count drops to zero stays resolvable until [`Dictionary::release`] frees
/// it; freed ids are handed out again by later interns.
#[derive(Debug, Default)]
pub(crate) struct Dictionary {
    ids: FxHashMap<Node, TermId>,
    entries: Vec<Option<Entry>>,
    free: Vec<u32>,
}

impl Dictionary {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Id for `node`, interning it if unseen
    ///
    /// A fresh id starts with no references.
    pub(crate) fn intern(&mut self, node: &Node) -> StorageResult<TermId> {
        if let Some(id) = self.lookup(node) {
            return Ok(id);
        }
        let entry = Some(Entry {
            node: node.clone(),
            refs: 0,
        });
        let id = match self.free.pop() {
            Some(slot) => {
                self.entries[slot as usize] = entry;
                TermId(slot)
            }
            None => {
                let slot = u32::try_from(self.entries.len()).map_err(|_| StorageError::CapacityExceeded)?;
                self.entries.push(entry);
                TermId(slot)
            }
        };
        self.ids.insert(node.clone(), id);
        Ok(id)
    }

    /// Id for an already interned node
    pub(crate) fn lookup(&self, node: &Node) -> Option<TermId> {
        self.ids.get(node).copied()
    }

    pub(crate) fn resolve(&self, id: TermId) -> Option<&Node> {
        self.entry(id).map(|entry| &entry.node)
    }

    pub(crate) fn acquire(&mut self, id: TermId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.refs += 1;
        }
    }

    /// Drop one reference; true once nothing references `id`
    pub(crate) fn unref(&mut self, id: TermId) -> bool {
        match self.entry_mut(id) {
            Some(entry) => {
                entry.refs = entry.refs.saturating_sub(1);
                entry.refs == 0
            }
            None => false,
        }
    }

    /// Free `id` if it is still unreferenced
    pub(crate) fn release(&mut self, id: TermId) -> bool {
        let unused = matches!(self.entry(id), Some(entry) if entry.refs == 0);
        if !unused {
            return false;
        }
        if let Some(entry) = self.entries[id.0 as usize].take() {
            self.ids.remove(&entry.node);
            self.free.push(id.0);
        }
        true
    }

    /// Number of live ids
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    fn entry(&self, id: TermId) -> Option<&Entry> {
        self.entries.get(id.0 as usize)?.as_ref()
    }

    fn entry_mut(&mut self, id: TermId) -> Option<&mut Entry> {
        self.entries.get_mut(id.0 as usize)?.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut dict = Dictionary::new();
        let a = dict.intern(&Node::from("a")).unwrap();
        let b = dict.intern(&Node::blank("a")).unwrap();
        let a2 = dict.intern(&Node::from("a")).unwrap();

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.resolve(b), Some(&Node::blank("a")));
        assert_eq!(dict.lookup(&Node::from("missing")), None);
    }

    #[test]
    fn test_release_frees_and_reuses_ids() {
        let mut dict = Dictionary::new();
        let a = dict.intern(&Node::from("a")).unwrap();
        dict.acquire(a);
        dict.acquire(a);

        assert!(!dict.unref(a));
        assert!(!dict.release(a));
        assert!(dict.unref(a));
        assert!(dict.release(a));
        assert_eq!(dict.len(), 0);
        assert_eq!(dict.resolve(a), None);
        assert_eq!(dict.lookup(&Node::from("a")), None);

        let b = dict.intern(&Node::from("b")).unwrap();
        assert_eq!(b, a);
        assert_eq!(dict.resolve(b), Some(&Node::from("b")));
    }
}
