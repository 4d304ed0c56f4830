//! Redstore RDF Triple Store
//!
//! An in-process RDF graph store: statements (subject, predicate, object
//! triples) held in a pluggable storage backend, with indexed pattern
//! matching, transactional mutation, streaming cursors, bulk load and
//! serialization in several syntaxes, and SPARQL query execution.
//!
//! # Architecture
//!
//! - [`world`]: shared registry of storage backends and blank-node identifiers
//! - [`rdf`]: nodes, literals with XML Schema datatype coercion, statements
//! - [`storage`]: backend trait plus the `memory` (interned, SPO/POS/OSP
//!   indexed), `hashes`, `file` and `uri` backends
//! - [`model`]: a storage backend with transactions, the statement
//!   collection and cursors
//! - [`io`]: parsers (RDF/XML, Turtle, N-Triples) and serializers (those
//!   plus RDF/JSON and Graphviz dot)
//! - [`query`]: the query collaborator contract and a SPARQL engine
//!
//! ## Example Usage
//!
//! ```rust
//! use redstore::{Model, Node, Statement};
//!
//! let model = Model::in_memory();
//! let alice = Node::iri("http://example.org/alice").unwrap();
//! let name = Node::iri("http://xmlns.com/foaf/0.1/name").unwrap();
//!
//! // Add a statement
//! model.statements().create((alice.clone(), name.clone(), "Alice"));
//! assert_eq!(model.size(), 1);
//!
//! // Match by pattern (unset positions are wildcards)
//! let pattern = Statement::new().with_subject(alice);
//! let found = model.statements().first(pattern).unwrap();
//! assert_eq!(found.object(), Some(&Node::from("Alice")));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod io;
pub mod model;
pub mod query;
pub mod rdf;
pub mod storage;
pub mod world;

// Re-export main types for convenience
pub use io::{ParseError, Parser, SerializeError, Serializer, Syntax};
pub use model::{Cursor, Found, Model, ModelError, ModelResult, SearchScope, StatementCollection};
pub use query::{QueryEngine, QueryError, QueryLanguage, QueryOptions, QueryResults, SparqlEngine};
pub use rdf::{Literal, NamespaceManager, Node, NodeError, Statement, Uri, Value};
pub use storage::{StorageConfig, StorageError, StorageKind};
pub use world::World;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.4.0");
    }
}
