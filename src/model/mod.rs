//! Models: a storage backend plus transaction control
//!
//! A [`Model`] exclusively owns its [`Storage`]. Statement collections
//! borrow the model; cursors and statements returned by a model keep only a
//! weak [`ModelHandle`], so they never keep a dropped model alive and fail
//! with [`ModelError::DanglingReference`] instead.
//!
//! A model is `Send + Sync`; its storage sits behind an `RwLock`, and each
//! operation takes the lock only for its own duration. Transactions give no
//! isolation from other threads using the same model.

mod cursor;
mod statements;

pub use cursor::{Cursor, CursorState};
pub use statements::{Found, SearchScope, StatementCollection};

use crate::io::{ParseError, Parser, SerializeError, Serializer, Syntax};
use crate::query::{QueryEngine, QueryOptions, QueryResult, QueryResults, SparqlEngine};
use crate::rdf::{NodeError, Statement, Uri};
use crate::storage::{MemoryStorage, Position, Storage, StorageConfig, StorageError, StorageKind, StorageResult};
use crate::world::{BlankRelabeler, World};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    /// Storage construction or operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Node construction failed
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    /// Statement cannot be stored
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    /// Exact statement required, got a pattern
    #[error("Statement has unbound parts: {0}")]
    IncompleteStatement(String),

    /// Unknown find scope
    #[error("Invalid search scope: {0}")]
    InvalidSearchScope(String),

    /// Strict transaction operation failed
    #[error("Transaction failure: {0}")]
    TransactionFailure(String),

    /// Cursor has no current statement
    #[error("Cursor is exhausted")]
    CursorExhausted,

    /// The model behind a statement or cursor has been dropped
    #[error("Model no longer exists")]
    DanglingReference,

    /// Parsing into the model failed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Serializing the model failed
    #[error("Serialize error: {0}")]
    Serialize(#[from] SerializeError),
}

pub type ModelResult<T> = Result<T, ModelError>;

pub(crate) struct ModelState {
    pub(crate) storage: Box<dyn Storage>,
    in_transaction: bool,
}

pub(crate) struct ModelInner {
    world: World,
    state: RwLock<ModelState>,
}

impl Drop for ModelInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = state.storage.close() {
            warn!("Failed to close {} storage: {}", state.storage.kind(), e);
        } else {
            debug!("Closed {} storage", state.storage.kind());
        }
    }
}

/// Non-owning reference to a model
#[derive(Debug, Clone)]
pub struct ModelHandle {
    inner: Weak<ModelInner>,
}

impl ModelHandle {
    /// Whether the model is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub(crate) fn upgrade(&self) -> Option<Model> {
        self.inner.upgrade().map(|inner| Model { inner })
    }
}

/// RDF model
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Create a model in a fresh world
    pub fn new(config: StorageConfig) -> ModelResult<Self> {
        Self::with_world(&World::new(), config)
    }

    /// Create a model whose storage is built by `world`'s backend registry
    pub fn with_world(world: &World, config: StorageConfig) -> ModelResult<Self> {
        let storage = world.open_storage(&config)?;
        Ok(Self::from_storage(world, storage))
    }

    /// Create a model over an already constructed storage
    pub fn from_storage(world: &World, storage: Box<dyn Storage>) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                world: world.clone(),
                state: RwLock::new(ModelState {
                    storage,
                    in_transaction: false,
                }),
            }),
        }
    }

    /// Create an empty in-memory model
    pub fn in_memory() -> Self {
        Self::from_storage(&World::new(), Box::new(MemoryStorage::new()))
    }

    pub fn world(&self) -> &World {
        &self.inner.world
    }

    /// Backend kind of the model's storage
    pub fn kind(&self) -> StorageKind {
        self.read().storage.kind()
    }

    pub(crate) fn handle(&self) -> ModelHandle {
        ModelHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ModelState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ModelState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Statement collection of this model
    pub fn statements(&self) -> StatementCollection<'_> {
        StatementCollection::new(self)
    }

    /// Number of statements
    ///
    /// Backends that cannot count cheaply are counted by enumeration.
    pub fn size(&self) -> usize {
        let state = self.read();
        match state.storage.count() {
            Some(count) => count,
            None => state.storage.all_statements().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        let state = self.read();
        match state.storage.count() {
            Some(count) => count == 0,
            None => state.storage.all_statements().next().is_none(),
        }
    }

    /// Whether an exact statement is stored
    pub fn contains(&self, statement: &Statement) -> bool {
        self.read().storage.contains(statement)
    }

    pub(crate) fn insert(&self, statement: &Statement) -> StorageResult<bool> {
        self.write().storage.insert(statement)
    }

    pub(crate) fn remove(&self, statement: &Statement) -> StorageResult<bool> {
        self.write().storage.remove(statement)
    }

    pub(crate) fn next_match(&self, pattern: &Statement, position: Position) -> Option<(Statement, Position)> {
        self.read().storage.next_match(pattern, position)
    }

    /// All matches of `pattern`, collected under one read lock
    pub(crate) fn snapshot(&self, pattern: &Statement) -> Vec<Statement> {
        self.read().storage.find_matching(pattern.clone()).collect()
    }

    /// Add every statement of `other` to this model
    ///
    /// Blank nodes from `other` are given fresh identifiers from this model's
    /// world (one per distinct blank node), so they are never conflated with
    /// blank nodes already here. Duplicates are skipped. Merging a model into
    /// itself does nothing.
    ///
    /// Relabeling happens per call: merging the same source twice adds its
    /// blank-node statements twice, under different identifiers. Statements
    /// made only of resources and literals are added once.
    pub fn merge(&self, other: &Model) -> ModelResult<&Self> {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return Ok(self);
        }

        let incoming = other.snapshot(&Statement::new());
        let mut relabeler = BlankRelabeler::new(self.world());
        let mut added = 0;
        {
            let mut state = self.write();
            for statement in &incoming {
                let Some(statement) = relabeler.relabel_statement(statement) else {
                    continue;
                };
                if state.storage.insert(&statement)? {
                    added += 1;
                }
            }
        }

        info!("Merged {} of {} statements", added, incoming.len());
        Ok(self)
    }

    /// Whether the storage backend provides real transactions
    ///
    /// Backends without them accept start, commit and rollback as no-ops:
    /// [`Model::transaction`] still runs, but changes made before a failure
    /// are not undone.
    pub fn supports_transactions(&self) -> bool {
        self.read().storage.supports_transactions()
    }

    pub fn in_transaction(&self) -> bool {
        self.read().in_transaction
    }

    /// Start a transaction; `false` if the backend refused
    pub fn transaction_start(&self) -> bool {
        self.transaction_start_checked().is_ok()
    }

    /// Commit the active transaction; `false` if the backend refused
    pub fn transaction_commit(&self) -> bool {
        self.transaction_commit_checked().is_ok()
    }

    /// Roll back the active transaction; `false` if the backend refused
    pub fn transaction_rollback(&self) -> bool {
        self.transaction_rollback_checked().is_ok()
    }

    pub fn transaction_start_checked(&self) -> ModelResult<()> {
        let mut state = self.write();
        state
            .storage
            .transaction_start()
            .map_err(|e| ModelError::TransactionFailure(format!("start: {}", e)))?;
        state.in_transaction = true;
        debug!("Transaction started");
        Ok(())
    }

    pub fn transaction_commit_checked(&self) -> ModelResult<()> {
        let mut state = self.write();
        state
            .storage
            .transaction_commit()
            .map_err(|e| ModelError::TransactionFailure(format!("commit: {}", e)))?;
        state.in_transaction = false;
        debug!("Transaction committed");
        Ok(())
    }

    pub fn transaction_rollback_checked(&self) -> ModelResult<()> {
        let mut state = self.write();
        state
            .storage
            .transaction_rollback()
            .map_err(|e| ModelError::TransactionFailure(format!("rollback: {}", e)))?;
        state.in_transaction = false;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Run `body` inside a transaction
    ///
    /// Commits when `body` returns `Ok`. When it returns `Err` (or panics)
    /// the transaction is rolled back and the error is returned unchanged.
    ///
    /// ```rust
    /// use redstore::{Model, ModelError, Node};
    ///
    /// let model = Model::in_memory();
    /// let s = Node::iri("http://ex.org/s").unwrap();
    /// let p = Node::iri("http://ex.org/p").unwrap();
    ///
    /// let result: Result<(), ModelError> = model.transaction(|m| {
    ///     m.statements().create((s, p, "draft"));
    ///     Err(ModelError::TransactionFailure("abandoned".to_string()))
    /// });
    ///
    /// assert!(result.is_err());
    /// assert_eq!(model.size(), 0);
    /// ```
    pub fn transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&Model) -> Result<T, E>,
        E: From<ModelError>,
    {
        self.transaction_start_checked()?;
        let mut guard = RollbackGuard { model: self, armed: true };

        let result = body(self);
        guard.armed = false;

        match result {
            Ok(value) => {
                self.transaction_commit_checked()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.transaction_rollback_checked() {
                    warn!("Rollback after failed transaction body also failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Run a query with the built-in SPARQL engine
    pub fn query(&self, text: &str, options: &QueryOptions) -> QueryResult<QueryResults> {
        self.query_with(&SparqlEngine::new(), text, options)
    }

    /// Run a query with a caller-supplied engine
    pub fn query_with(&self, engine: &dyn QueryEngine, text: &str, options: &QueryOptions) -> QueryResult<QueryResults> {
        engine.execute(self, text, options)
    }

    /// Parse `content` into this model; returns the number of statements added
    pub fn from_str(&self, content: &str, syntax: Syntax, base_uri: Option<&Uri>) -> ModelResult<usize> {
        Ok(Parser::with_world(syntax, self.world()).parse_into(self, content, base_uri)?)
    }

    /// Parse `content`, adding only the statements `filter` accepts
    pub fn from_str_filtered<F>(
        &self,
        content: &str,
        syntax: Syntax,
        base_uri: Option<&Uri>,
        filter: F,
    ) -> ModelResult<usize>
    where
        F: FnMut(&Statement) -> bool,
    {
        Ok(Parser::with_world(syntax, self.world()).parse_into_filtered(self, content, base_uri, filter)?)
    }

    /// Parse a file into this model
    pub fn from_path(&self, path: impl AsRef<Path>, syntax: Syntax, base_uri: Option<&Uri>) -> ModelResult<usize> {
        Ok(Parser::with_world(syntax, self.world()).parse_file_into(self, path, base_uri)?)
    }

    /// Parse the document at a `file:` URI into this model; the URI is also
    /// the base URI
    pub fn from_uri(&self, uri: &Uri, syntax: Syntax) -> ModelResult<usize> {
        Ok(Parser::with_world(syntax, self.world()).parse_uri_into(self, uri)?)
    }

    /// Serialize the whole model
    pub fn to_string_as(&self, syntax: Syntax) -> ModelResult<String> {
        Ok(Serializer::new(syntax).serialize(self)?)
    }

    /// Serialize the whole model to a file
    pub fn to_file(&self, path: impl AsRef<Path>, syntax: Syntax) -> ModelResult<()> {
        Ok(Serializer::new(syntax).serialize_to_file(self, path)?)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("world", &self.inner.world.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Rolls back if dropped while armed, i.e. when the body panics
struct RollbackGuard<'m> {
    model: &'m Model,
    armed: bool,
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.armed && !self.model.transaction_rollback() {
            warn!("Rollback during unwind failed");
        }
    }
}
