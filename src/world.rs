//! Engine context
//!
//! A [`World`] owns the state shared by the models created from it: the
//! blank node identifier generator and the registry of storage backend
//! factories. Worlds are explicit values, cheap to clone, and independent of
//! one another; nothing here is process-global except the counter handing
//! out world ids.

use crate::rdf::{Node, Statement};
use crate::storage::{self, Storage, StorageConfig, StorageError, StorageKind, StorageResult};
use rustc_hash::FxHashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// Constructor for a storage backend
pub type BackendFactory = Arc<dyn Fn(&World, &StorageConfig) -> StorageResult<Box<dyn Storage>> + Send + Sync>;

/// Explicit engine context
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

struct WorldInner {
    id: u64,
    blank_counter: AtomicU64,
    backends: RwLock<HashMap<StorageKind, BackendFactory>>,
}

impl World {
    /// Create a world with the built-in `memory`, `hashes`, `file` and `uri`
    /// backends registered
    pub fn new() -> Self {
        let id = NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed);
        let world = Self {
            inner: Arc::new(WorldInner {
                id,
                blank_counter: AtomicU64::new(0),
                backends: RwLock::new(HashMap::new()),
            }),
        };
        storage::register_builtin_backends(&world);
        debug!("Created world {}", id);
        world
    }

    /// Process-unique id of this world
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Fresh blank node identifier, unique across every world in the process
    pub fn blank_id(&self) -> String {
        let n = self.inner.blank_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("r{}r{}", self.inner.id, n)
    }

    /// Fresh blank node
    pub fn blank_node(&self) -> Node {
        Node::blank(self.blank_id())
    }

    /// Register (or replace) the factory for a backend kind
    pub fn register_backend<F>(&self, kind: StorageKind, factory: F)
    where
        F: Fn(&World, &StorageConfig) -> StorageResult<Box<dyn Storage>> + Send + Sync + 'static,
    {
        let mut backends = self.inner.backends.write().unwrap_or_else(PoisonError::into_inner);
        backends.insert(kind, Arc::new(factory));
    }

    /// Whether a factory is registered for the kind
    pub fn has_backend(&self, kind: StorageKind) -> bool {
        let backends = self.inner.backends.read().unwrap_or_else(PoisonError::into_inner);
        backends.contains_key(&kind)
    }

    /// Construct the storage described by `config`
    pub fn open_storage(&self, config: &StorageConfig) -> StorageResult<Box<dyn Storage>> {
        let factory = {
            let backends = self.inner.backends.read().unwrap_or_else(PoisonError::into_inner);
            backends
                .get(&config.kind)
                .cloned()
                .ok_or(StorageError::BackendUnavailable(config.kind))?
        };
        let storage = factory(self, config)?;
        info!(
            "Opened {} storage {} ({})",
            config.kind,
            config.name.as_deref().unwrap_or("<unnamed>"),
            config.to_options_string()
        );
        Ok(storage)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backends = self.inner.backends.read().unwrap_or_else(PoisonError::into_inner);
        let mut kinds: Vec<_> = backends.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("World")
            .field("id", &self.inner.id)
            .field("backends", &kinds)
            .finish()
    }
}

impl PartialEq for World {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Maps foreign blank identifiers onto fresh ones from a world
///
/// The same foreign identifier always maps to the same fresh node within one
/// relabeler, so the shape of the imported graph is kept.
pub(crate) struct BlankRelabeler {
    world: World,
    labels: FxHashMap<String, String>,
}

impl BlankRelabeler {
    pub(crate) fn new(world: &World) -> Self {
        Self {
            world: world.clone(),
            labels: FxHashMap::default(),
        }
    }

    pub(crate) fn relabel(&mut self, node: Node) -> Node {
        match node {
            Node::Blank(id) => {
                let world = &self.world;
                let fresh = self.labels.entry(id).or_insert_with(|| world.blank_id());
                Node::Blank(fresh.clone())
            }
            other => other,
        }
    }

    /// Relabel the blank parts of a complete statement
    pub(crate) fn relabel_statement(&mut self, statement: &Statement) -> Option<Statement> {
        let (s, p, o) = statement.as_triple()?;
        Some(Statement::from_stored(
            self.relabel(s.clone()),
            p.clone(),
            self.relabel(o.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_ids_are_unique() {
        let a = World::new();
        let b = World::new();

        let ids = [a.blank_id(), a.blank_id(), b.blank_id(), b.blank_id()];
        for (i, x) in ids.iter().enumerate() {
            assert!(x.starts_with('r'));
            assert!(x[1..].starts_with(|c: char| c.is_ascii_digit()));
            for y in &ids[i + 1..] {
                assert_ne!(x, y);
            }
        }
        assert!(a.blank_node().is_blank());
    }

    #[test]
    fn test_builtin_backends() {
        let world = World::new();
        for kind in [StorageKind::Memory, StorageKind::Hashes, StorageKind::File, StorageKind::Uri] {
            assert!(world.has_backend(kind), "{} should be built in", kind);
        }
        assert!(!world.has_backend(StorageKind::Sqlite));

        let err = world.open_storage(&StorageConfig::new(StorageKind::Postgresql)).unwrap_err();
        assert!(matches!(err, StorageError::BackendUnavailable(StorageKind::Postgresql)));
    }

    #[test]
    fn test_register_backend() {
        let world = World::new();
        world.register_backend(StorageKind::Sqlite, |_world, config| {
            Ok(Box::new(storage::MemoryStorage::from_config(config)?) as Box<dyn Storage>)
        });

        let storage = world
            .open_storage(&StorageConfig::new(StorageKind::Sqlite).with_name("test"))
            .unwrap();
        assert_eq!(storage.count(), Some(0));
    }

    #[test]
    fn test_relabeler_is_consistent() {
        let world = World::new();
        let mut relabeler = BlankRelabeler::new(&world);

        let a1 = relabeler.relabel(Node::blank("a"));
        let a2 = relabeler.relabel(Node::blank("a"));
        let b = relabeler.relabel(Node::blank("b"));

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_ne!(a1, Node::blank("a"));
        assert_eq!(relabeler.relabel(Node::from("x")), Node::from("x"));
    }
}
