//! RDF value model
//!
//! This module holds the values a store is made of:
//! - URIs (absolute, validated)
//! - nodes: resources, blank nodes and literals
//! - the native value coercion table for literals
//! - statements, complete or used as wildcard patterns
//! - namespace prefixes for compact notation
//!
//! # Example
//!
//! ```rust
//! use redstore::rdf::{Node, Statement, Value};
//!
//! let alice = Node::iri("http://example.org/alice").unwrap();
//! let age = Node::iri("http://xmlns.com/foaf/0.1/age").unwrap();
//!
//! let mut stmt = Statement::triple(alice, age, 42i64);
//! assert!(stmt.is_valid());
//! assert_eq!(stmt.object().unwrap().value(), Value::Integer(42));
//! ```

mod namespace;
mod node;
mod statement;
mod uri;
mod value;
pub mod vocab;

pub use namespace::{Namespace, NamespaceManager, PrefixError, PrefixResult};
pub use node::{Literal, Node, NodeError, NodeResult};
pub use statement::Statement;
pub use uri::Uri;
pub use value::Value;
