//! Query execution against a model
//!
//! A [`QueryEngine`] receives a model, query text and [`QueryOptions`] and
//! returns one of three result kinds: a boolean, a graph (a new model) or a
//! sequence of variable bindings. Callers branch on the kind before
//! consuming it.
//!
//! # Example
//!
//! ```rust
//! use redstore::query::{QueryOptions, QueryResults};
//! use redstore::{Model, Node};
//!
//! let model = Model::in_memory();
//! model.statements().create((
//!     Node::iri("http://example.org/alice").unwrap(),
//!     Node::iri("http://xmlns.com/foaf/0.1/name").unwrap(),
//!     "Alice",
//! ));
//!
//! let query = r#"
//!     PREFIX foaf: <http://xmlns.com/foaf/0.1/>
//!     SELECT ?name WHERE { ?person foaf:name ?name . }
//! "#;
//!
//! match model.query(query, &QueryOptions::default()).unwrap() {
//!     QueryResults::Bindings(solutions) => {
//!         let names: Vec<_> = solutions.map(|s| s.get("name").cloned()).collect();
//!         assert_eq!(names, vec![Some(Node::from("Alice"))]);
//!     }
//!     other => panic!("expected bindings, got {:?}", other),
//! }
//! ```

mod executor;

pub use executor::SparqlEngine;

use crate::model::Model;
use crate::rdf::{Node, NodeError, Uri};
use crate::storage::StorageError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Query errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Query text does not parse
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Unrecognized language name or URI
    #[error("Unknown query language: {0}")]
    UnknownLanguage(String),

    /// Language or query feature the engine does not evaluate
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Query term is not a valid node
    #[error("Invalid term: {0}")]
    Term(#[from] NodeError),

    /// The model refused an update
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Query language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryLanguage {
    #[default]
    Sparql10,
    Sparql,
    Sparql11Query,
    Sparql11Update,
    Laqrs,
    Rdql,
}

impl QueryLanguage {
    pub fn name(&self) -> &'static str {
        match self {
            QueryLanguage::Sparql10 => "sparql10",
            QueryLanguage::Sparql => "sparql",
            QueryLanguage::Sparql11Query => "sparql11-query",
            QueryLanguage::Sparql11Update => "sparql11-update",
            QueryLanguage::Laqrs => "laqrs",
            QueryLanguage::Rdql => "rdql",
        }
    }

    /// Identifying URI of the language
    pub fn uri(&self) -> &'static str {
        match self {
            QueryLanguage::Sparql10 | QueryLanguage::Sparql => "http://www.w3.org/TR/rdf-sparql-query/",
            QueryLanguage::Sparql11Query => "http://www.w3.org/TR/2013/REC-sparql11-query-20130321/",
            QueryLanguage::Sparql11Update => "http://www.w3.org/TR/2013/REC-sparql11-update-20130321/",
            QueryLanguage::Laqrs => "http://www.dajobe.org/2007/04/laqrs/",
            QueryLanguage::Rdql => "http://jena.hpl.hp.com/2003/07/query/RDQL",
        }
    }

    const ALL: [QueryLanguage; 6] = [
        QueryLanguage::Sparql10,
        QueryLanguage::Sparql,
        QueryLanguage::Sparql11Query,
        QueryLanguage::Sparql11Update,
        QueryLanguage::Laqrs,
        QueryLanguage::Rdql,
    ];

    /// Language identified by `uri`
    pub fn from_uri(uri: &Uri) -> QueryResult<Self> {
        Self::ALL
            .into_iter()
            .find(|language| language.uri() == uri.as_str())
            .ok_or_else(|| QueryError::UnknownLanguage(uri.to_string()))
    }
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueryLanguage {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|language| language.name() == lower)
            .ok_or_else(|| QueryError::UnknownLanguage(s.to_string()))
    }
}

/// Query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub language: QueryLanguage,
    /// Overrides `language` when set
    pub language_uri: Option<Uri>,
    /// Base for relative URIs in the query
    pub base_uri: Option<Uri>,
}

impl QueryOptions {
    pub fn new(language: QueryLanguage) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }

    pub fn with_base_uri(mut self, base_uri: Uri) -> Self {
        self.base_uri = Some(base_uri);
        self
    }

    pub fn with_language_uri(mut self, language_uri: Uri) -> Self {
        self.language_uri = Some(language_uri);
        self
    }

    /// The language in effect after applying `language_uri`
    pub fn effective_language(&self) -> QueryResult<QueryLanguage> {
        match &self.language_uri {
            Some(uri) => QueryLanguage::from_uri(uri),
            None => Ok(self.language),
        }
    }
}

/// Query solution (variable bindings)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QuerySolution {
    /// Variable name → node bindings
    pub bindings: BTreeMap<String, Node>,
}

impl QuerySolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, variable: &str) -> Option<&Node> {
        self.bindings.get(variable)
    }

    pub fn bind(&mut self, variable: impl Into<String>, node: Node) {
        self.bindings.insert(variable.into(), node);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Sequence of solutions from a SELECT query
#[derive(Debug)]
pub struct Solutions {
    variables: Vec<String>,
    rows: std::vec::IntoIter<QuerySolution>,
}

impl Solutions {
    pub(crate) fn new(variables: Vec<String>, rows: Vec<QuerySolution>) -> Self {
        Self {
            variables,
            rows: rows.into_iter(),
        }
    }

    /// Projected variable names, in query order
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

impl Iterator for Solutions {
    type Item = QuerySolution;

    fn next(&mut self) -> Option<QuerySolution> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

/// Query results
#[derive(Debug)]
pub enum QueryResults {
    /// ASK result, or `true` for a successful update
    Boolean(bool),
    /// CONSTRUCT result
    Graph(Model),
    /// SELECT result
    Bindings(Solutions),
}

impl QueryResults {
    pub fn is_boolean(&self) -> bool {
        matches!(self, QueryResults::Boolean(_))
    }

    pub fn is_graph(&self) -> bool {
        matches!(self, QueryResults::Graph(_))
    }

    pub fn is_bindings(&self) -> bool {
        matches!(self, QueryResults::Bindings(_))
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            QueryResults::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn into_graph(self) -> Option<Model> {
        match self {
            QueryResults::Graph(model) => Some(model),
            _ => None,
        }
    }

    pub fn into_bindings(self) -> Option<Solutions> {
        match self {
            QueryResults::Bindings(solutions) => Some(solutions),
            _ => None,
        }
    }
}

/// Query collaborator
pub trait QueryEngine {
    fn execute(&self, model: &Model, query: &str, options: &QueryOptions) -> QueryResult<QueryResults>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_names() {
        assert_eq!(QueryLanguage::default(), QueryLanguage::Sparql10);
        assert_eq!("SPARQL11-Update".parse::<QueryLanguage>().unwrap(), QueryLanguage::Sparql11Update);
        assert!(matches!("xquery".parse::<QueryLanguage>(), Err(QueryError::UnknownLanguage(_))));
    }

    #[test]
    fn test_language_uri_overrides_name() {
        let uri = Uri::new(QueryLanguage::Sparql11Update.uri()).unwrap();
        let options = QueryOptions::new(QueryLanguage::Rdql).with_language_uri(uri);
        assert_eq!(options.effective_language().unwrap(), QueryLanguage::Sparql11Update);

        let unknown = QueryOptions::default().with_language_uri(Uri::new("http://ex.org/lang").unwrap());
        assert!(unknown.effective_language().is_err());
    }

    #[test]
    fn test_query_solution() {
        let mut solution = QuerySolution::new();
        assert!(solution.is_empty());

        solution.bind("name", Node::from("Alice"));
        assert_eq!(solution.get("name"), Some(&Node::from("Alice")));
        assert_eq!(solution.len(), 1);
    }

    #[test]
    fn test_result_kinds() {
        let results = QueryResults::Boolean(true);
        assert!(results.is_boolean());
        assert_eq!(results.as_boolean(), Some(true));
        assert!(results.into_graph().is_none());

        let bindings = QueryResults::Bindings(Solutions::new(vec!["x".to_string()], Vec::new()));
        assert!(bindings.is_bindings());
        assert_eq!(bindings.into_bindings().unwrap().variables(), ["x"]);
    }
}
