//! Statement collection: the queryable view of a model's statements

use super::{Cursor, Model, ModelError, ModelResult};
use crate::rdf::Statement;
use std::str::FromStr;
use tracing::{info, warn};

/// How many matches [`StatementCollection::find`] returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    First,
    All,
}

impl FromStr for SearchScope {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(SearchScope::First),
            "all" => Ok(SearchScope::All),
            other => Err(ModelError::InvalidSearchScope(other.to_string())),
        }
    }
}

/// Result of [`StatementCollection::find`]
#[derive(Debug, Clone, PartialEq)]
pub enum Found {
    First(Option<Statement>),
    All(Vec<Statement>),
}

impl Found {
    /// Flatten into a list of statements
    pub fn into_vec(self) -> Vec<Statement> {
        match self {
            Found::First(first) => first.into_iter().collect(),
            Found::All(all) => all,
        }
    }
}

/// Statements of a model
///
/// A lightweight view borrowing the model; every call to
/// [`Model::statements`] returns a fresh one over the same storage.
/// Statements handed out are bound to the model, so
/// [`Statement::destroy`] can remove them later.
#[derive(Debug, Clone, Copy)]
pub struct StatementCollection<'m> {
    model: &'m Model,
}

impl<'m> StatementCollection<'m> {
    pub(crate) fn new(model: &'m Model) -> Self {
        Self { model }
    }

    /// Add a statement
    ///
    /// Returns `false` for duplicates and invalid statements, and when the
    /// backend refuses the write (logged). On success the statement is bound
    /// to the model.
    pub fn add(&self, statement: &mut Statement) -> bool {
        match self.try_add(statement) {
            Ok(added) => added,
            Err(ModelError::InvalidStatement(_)) => false,
            Err(e) => {
                warn!("Statement {} not added: {}", statement, e);
                false
            }
        }
    }

    /// Add a statement, failing on invalid statements and backend errors
    ///
    /// `Ok(false)` means an equal statement was already stored.
    pub fn try_add(&self, statement: &mut Statement) -> ModelResult<bool> {
        if !statement.is_valid() {
            return Err(ModelError::InvalidStatement(statement.to_string()));
        }
        let added = self.model.insert(statement)?;
        if added {
            statement.bind(self.model.handle());
        }
        Ok(added)
    }

    /// Build a statement from its parts and add it
    ///
    /// `None` if the statement is invalid or already stored.
    pub fn create(&self, parts: impl Into<Statement>) -> Option<Statement> {
        let mut statement = parts.into();
        self.add(&mut statement).then_some(statement)
    }

    /// Delete one exact statement
    ///
    /// Patterns with unbound parts are rejected; use
    /// [`StatementCollection::delete_all`] for those.
    pub fn delete(&self, statement: &Statement) -> ModelResult<bool> {
        if !statement.is_complete() {
            return Err(ModelError::IncompleteStatement(statement.to_string()));
        }
        Ok(self.model.remove(statement)?)
    }

    /// Delete every statement matching `pattern`; returns how many
    ///
    /// Matches are collected before anything is removed, under a single
    /// write lock.
    pub fn delete_all(&self, pattern: &Statement) -> ModelResult<usize> {
        let mut state = self.model.write();
        let matches: Vec<Statement> = state.storage.find_matching(pattern.clone()).collect();

        let mut deleted = 0;
        for statement in &matches {
            if state.storage.remove(statement)? {
                deleted += 1;
            }
        }

        info!("Deleted {} statements matching {}", deleted, pattern);
        Ok(deleted)
    }

    pub fn size(&self) -> usize {
        self.model.size()
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    /// Lazy cursor over the statements matching `pattern`
    pub fn each(&self, pattern: Statement) -> Cursor {
        Cursor::open(self.model, pattern)
    }

    /// Lazy cursor over every statement
    pub fn iter(&self) -> Cursor {
        self.each(Statement::new())
    }

    pub fn find(&self, scope: SearchScope, pattern: Statement) -> Found {
        match scope {
            SearchScope::First => Found::First(self.first(pattern)),
            SearchScope::All => Found::All(self.all(pattern)),
        }
    }

    /// First statement matching `pattern`
    pub fn first(&self, pattern: Statement) -> Option<Statement> {
        self.each(pattern).next()
    }

    /// Every statement matching `pattern`
    pub fn all(&self, pattern: Statement) -> Vec<Statement> {
        let handle = self.model.handle();
        self.model
            .snapshot(&pattern)
            .into_iter()
            .map(|mut statement| {
                statement.bind(handle.clone());
                statement
            })
            .collect()
    }

    /// Whether any statement matches `pattern`
    pub fn exists(&self, pattern: Statement) -> bool {
        self.model.next_match(&pattern, Default::default()).is_some()
    }

    /// Whether an exact statement is stored
    pub fn contains(&self, statement: &Statement) -> bool {
        self.model.contains(statement)
    }
}

impl Extend<Statement> for StatementCollection<'_> {
    fn extend<I: IntoIterator<Item = Statement>>(&mut self, iter: I) {
        for mut statement in iter {
            self.add(&mut statement);
        }
    }
}

impl<'m> IntoIterator for StatementCollection<'m> {
    type Item = Statement;
    type IntoIter = Cursor;

    fn into_iter(self) -> Cursor {
        self.iter()
    }
}
