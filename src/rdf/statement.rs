//! RDF statements (triples) and triple patterns

use super::node::Node;
use crate::model::{ModelError, ModelHandle, ModelResult};
use std::fmt;
use std::hash::{Hash, Hasher};

const INVALID: &str = "is invalid";

/// RDF statement
///
/// A complete statement has subject, predicate and object set and is the
/// unit stored in a model. Any part left unset acts as a wildcard when the
/// statement is used as a pattern.
///
/// Nodes are moved (or cloned) into the statement on assignment, so a node
/// value is never shared between two statements.
///
/// Equality and hashing consider the three nodes only; the owning model and
/// the validation errors are ignored.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    subject: Option<Node>,
    predicate: Option<Node>,
    object: Option<Node>,
    errors: Vec<String>,
    model: Option<ModelHandle>,
}

impl Statement {
    /// Create an empty statement (matches everything as a pattern)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a complete statement
    pub fn triple(subject: impl Into<Node>, predicate: impl Into<Node>, object: impl Into<Node>) -> Self {
        Self::new()
            .with_subject(subject)
            .with_predicate(predicate)
            .with_object(object)
    }

    pub fn with_subject(mut self, subject: impl Into<Node>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<Node>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn with_object(mut self, object: impl Into<Node>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn subject(&self) -> Option<&Node> {
        self.subject.as_ref()
    }

    pub fn predicate(&self) -> Option<&Node> {
        self.predicate.as_ref()
    }

    pub fn object(&self) -> Option<&Node> {
        self.object.as_ref()
    }

    pub fn set_subject(&mut self, subject: impl Into<Node>) {
        self.subject = Some(subject.into());
    }

    pub fn set_predicate(&mut self, predicate: impl Into<Node>) {
        self.predicate = Some(predicate.into());
    }

    pub fn set_object(&mut self, object: impl Into<Node>) {
        self.object = Some(object.into());
    }

    /// All three parts are set
    pub fn is_complete(&self) -> bool {
        self.subject.is_some() && self.predicate.is_some() && self.object.is_some()
    }

    /// Complete, with a resource or blank subject and a resource predicate
    ///
    /// This is exactly the condition a storage backend checks on insert.
    pub fn is_insertable(&self) -> bool {
        let subject_ok = matches!(self.subject, Some(Node::Resource(_)) | Some(Node::Blank(_)));
        let predicate_ok = matches!(self.predicate, Some(Node::Resource(_)));
        subject_ok && predicate_ok && self.object.is_some()
    }

    /// Validate the statement, recording the outcome in [`Statement::errors`]
    pub fn is_valid(&mut self) -> bool {
        if self.is_insertable() {
            self.errors.clear();
            true
        } else {
            if !self.errors.iter().any(|e| e == INVALID) {
                self.errors.push(INVALID.to_string());
            }
            false
        }
    }

    /// Errors recorded by the last [`Statement::is_valid`] call
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Whether `statement` agrees with every part set on this pattern
    pub fn matches(&self, statement: &Statement) -> bool {
        fn part(pattern: &Option<Node>, node: &Option<Node>) -> bool {
            match pattern {
                None => true,
                Some(p) => node.as_ref() == Some(p),
            }
        }
        part(&self.subject, &statement.subject)
            && part(&self.predicate, &statement.predicate)
            && part(&self.object, &statement.object)
    }

    /// Whether the statement was returned by a model that is still alive
    pub fn model_bound(&self) -> bool {
        self.model.as_ref().map(ModelHandle::is_alive).unwrap_or(false)
    }

    /// Remove this statement from the model that returned it
    ///
    /// Returns `Ok(false)` for a statement that was never bound to a model
    /// and `DanglingReference` when that model has been dropped.
    pub fn destroy(&mut self) -> ModelResult<bool> {
        let Some(handle) = self.model.take() else {
            return Ok(false);
        };
        let model = handle.upgrade().ok_or(ModelError::DanglingReference)?;
        model.statements().delete(self)
    }

    pub(crate) fn bind(&mut self, model: ModelHandle) {
        self.model = Some(model);
    }

    /// Assemble a stored triple (storage layer only)
    pub(crate) fn from_stored(subject: Node, predicate: Node, object: Node) -> Self {
        Self {
            subject: Some(subject),
            predicate: Some(predicate),
            object: Some(object),
            errors: Vec::new(),
            model: None,
        }
    }

    /// Split into parts; `None` unless complete
    pub(crate) fn as_triple(&self) -> Option<(&Node, &Node, &Node)> {
        match (&self.subject, &self.predicate, &self.object) {
            (Some(s), Some(p), Some(o)) => Some((s, p, o)),
            _ => None,
        }
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject && self.predicate == other.predicate && self.object == other.object
    }
}

impl Eq for Statement {}

impl Hash for Statement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subject.hash(state);
        self.predicate.hash(state);
        self.object.hash(state);
    }
}

impl<S, P, O> From<(S, P, O)> for Statement
where
    S: Into<Node>,
    P: Into<Node>,
    O: Into<Node>,
{
    fn from((subject, predicate, object): (S, P, O)) -> Self {
        Statement::triple(subject, predicate, object)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |node: &Option<Node>| match node {
            Some(node) => node.to_string(),
            None => "(null)".to_string(),
        };
        write!(
            f,
            "{{{}, {}, {}}}",
            part(&self.subject),
            part(&self.predicate),
            part(&self.object)
        )
    }
}
