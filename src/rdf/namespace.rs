//! Namespace prefixes for compact URI notation
//!
//! Used by the serializers to shorten labels, and by callers to expand
//! `prefix:local` names into full URIs.

use super::node::Node;
use super::uri::Uri;
use super::vocab::{rdf, xsd};
use std::collections::BTreeMap;
use thiserror::Error;

/// Prefix errors
#[derive(Error, Debug)]
pub enum PrefixError {
    /// Unknown prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// Not of the form `prefix:local`, or expands to an invalid URI
    #[error("Invalid compact URI: {0}")]
    InvalidCompactUri(String),
}

pub type PrefixResult<T> = Result<T, PrefixError>;

/// Prefix → namespace URI mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}

/// Namespace manager seeded with the common vocabularies
#[derive(Debug, Clone)]
pub struct NamespaceManager {
    prefixes: BTreeMap<String, String>,
}

impl NamespaceManager {
    /// Create a manager with the common RDF vocabulary prefixes
    pub fn new() -> Self {
        let mut mgr = Self::empty();

        mgr.add_prefix("rdf", rdf::NAMESPACE);
        mgr.add_prefix("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
        mgr.add_prefix("xsd", xsd::NAMESPACE);
        mgr.add_prefix("owl", "http://www.w3.org/2002/07/owl#");
        mgr.add_prefix("foaf", "http://xmlns.com/foaf/0.1/");
        mgr.add_prefix("dc", "http://purl.org/dc/elements/1.1/");
        mgr.add_prefix("dcterms", "http://purl.org/dc/terms/");

        mgr
    }

    /// Create a manager with no prefixes
    pub fn empty() -> Self {
        Self {
            prefixes: BTreeMap::new(),
        }
    }

    pub fn add_prefix(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), uri.into());
    }

    /// Namespace URI bound to a prefix
    pub fn get_uri(&self, prefix: &str) -> PrefixResult<&str> {
        self.prefixes
            .get(prefix)
            .map(|s| s.as_str())
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))
    }

    /// Expand `prefix:local` to a full URI
    pub fn expand(&self, compact: &str) -> PrefixResult<Uri> {
        let (prefix, local) = compact
            .split_once(':')
            .ok_or_else(|| PrefixError::InvalidCompactUri(compact.to_string()))?;
        let namespace = self.get_uri(prefix)?;
        Uri::new(format!("{}{}", namespace, local))
            .map_err(|_| PrefixError::InvalidCompactUri(compact.to_string()))
    }

    /// Compact a URI using the longest matching namespace
    pub fn compact(&self, uri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, namespace)| uri.starts_with(namespace.as_str()))
            .max_by_key(|(_, namespace)| namespace.len())
            .map(|(prefix, namespace)| format!("{}:{}", prefix, &uri[namespace.len()..]))
    }

    /// Short label for a node: compacted URI when possible, otherwise its
    /// N-Triples form
    pub fn label(&self, node: &Node) -> String {
        match node {
            Node::Resource(uri) => self.compact(uri.as_str()).unwrap_or_else(|| uri.to_string()),
            Node::Literal(literal) if literal.language().is_none() => {
                match literal.datatype().and_then(|dt| self.compact(dt.as_str())) {
                    Some(datatype) if datatype == "xsd:string" => literal.lexical().to_string(),
                    Some(datatype) => format!("{}^^{}", literal.lexical(), datatype),
                    None => node.to_string(),
                }
            }
            other => other.to_string(),
        }
    }

    /// All registered prefixes, ordered by prefix
    pub fn prefixes(&self) -> Vec<Namespace> {
        self.prefixes
            .iter()
            .map(|(prefix, uri)| Namespace::new(prefix.clone(), uri.clone()))
            .collect()
    }
}

impl Default for NamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}
