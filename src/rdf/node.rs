//! RDF nodes: resources, blank nodes and literals

use super::uri::Uri;
use super::value::{Value, XsdLexical};
use super::vocab::xsd;
use std::fmt;
use thiserror::Error;

/// Node construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The text is not an absolute URI
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Malformed BCP 47 language tag
    #[error("Invalid language tag: {0}")]
    InvalidLanguageTag(String),

    /// The native value has no literal mapping
    #[error("Unsupported value type: {0}")]
    UnsupportedValueType(String),
}

pub type NodeResult<T> = Result<T, NodeError>;

/// Literal value
///
/// A literal carries either a datatype or a language tag, never both.
/// Plain literals are typed `xsd:string`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    lexical: String,
    datatype: Option<Uri>,
    language: Option<String>,
}

impl Literal {
    /// Create a plain string literal (`xsd:string`)
    pub fn simple(lexical: impl Into<String>) -> Self {
        Self::typed(lexical, Uri::new_unchecked(xsd::STRING))
    }

    /// Create a literal with an explicit datatype
    pub fn typed(lexical: impl Into<String>, datatype: Uri) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Some(datatype),
            language: None,
        }
    }

    /// Create a language-tagged literal; the tag is lower-cased
    pub fn lang_tagged(lexical: impl Into<String>, language: &str) -> NodeResult<Self> {
        if !is_valid_language_tag(language) {
            return Err(NodeError::InvalidLanguageTag(language.to_string()));
        }
        Ok(Self {
            lexical: lexical.into(),
            datatype: None,
            language: Some(language.to_ascii_lowercase()),
        })
    }

    /// Coerce a native value through the datatype table
    pub fn from_value(value: Value) -> NodeResult<Self> {
        if let Value::LangString { value, language } = value {
            return Self::lang_tagged(value, &language);
        }
        value
            .to_lexical()
            .map(|(lexical, datatype)| Self::typed(lexical, datatype))
            .ok_or_else(|| NodeError::UnsupportedValueType(value.type_name().to_string()))
    }

    /// Get the lexical form
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    /// Get the datatype (absent for language-tagged literals)
    pub fn datatype(&self) -> Option<&Uri> {
        self.datatype.as_ref()
    }

    /// Get the language tag if present
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Rebuild the native value
    pub fn value(&self) -> Value {
        match (&self.language, &self.datatype) {
            (Some(language), _) => Value::LangString {
                value: self.lexical.clone(),
                language: language.clone(),
            },
            (None, Some(datatype)) => Value::from_lexical(&self.lexical, datatype),
            (None, None) => Value::String(self.lexical.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", escape(&self.lexical))?;
        match (&self.language, &self.datatype) {
            (Some(language), _) => write!(f, "@{}", language),
            (None, Some(datatype)) => write!(f, "^^<{}>", datatype),
            (None, None) => Ok(()),
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn is_valid_language_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary_ok = parts
        .next()
        .map(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);
    primary_ok && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// RDF node
///
/// Structural equality and hashing: resources compare by URI, blank nodes
/// by identifier, literals by lexical form, datatype and language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    /// Named resource
    Resource(Uri),
    /// Anonymous node, identified only within its store
    Blank(String),
    /// Literal value
    Literal(Literal),
}

impl Node {
    /// Create a resource node
    pub fn resource(uri: Uri) -> Self {
        Node::Resource(uri)
    }

    /// Create a resource node from URI text
    pub fn iri(uri: &str) -> NodeResult<Self> {
        Uri::new(uri).map(Node::Resource)
    }

    /// Create a blank node with an explicit identifier
    ///
    /// Fresh identifiers come from [`crate::World::blank_node`].
    pub fn blank(id: impl Into<String>) -> Self {
        Node::Blank(id.into())
    }

    /// Create a literal node from a native value
    pub fn literal(value: impl Into<Value>) -> NodeResult<Self> {
        Literal::from_value(value.into()).map(Node::Literal)
    }

    /// Create a language-tagged literal node
    pub fn lang_literal(text: impl Into<String>, language: &str) -> NodeResult<Self> {
        Literal::lang_tagged(text, language).map(Node::Literal)
    }

    /// Create a literal node with an explicit datatype
    pub fn typed_literal(lexical: impl Into<String>, datatype: Uri) -> Self {
        Node::Literal(Literal::typed(lexical, datatype))
    }

    /// Create a node from a native value: URIs become resources, blank ids
    /// become blank nodes, everything else a literal
    pub fn from_value(value: Value) -> NodeResult<Self> {
        match value {
            Value::Uri(uri) => Ok(Node::Resource(uri)),
            Value::Blank(id) => Ok(Node::Blank(id)),
            other => Literal::from_value(other).map(Node::Literal),
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Node::Resource(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Blank(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }

    /// URI of a resource node
    pub fn uri(&self) -> Option<&Uri> {
        match self {
            Node::Resource(uri) => Some(uri),
            _ => None,
        }
    }

    /// Identifier of a blank node
    pub fn blank_id(&self) -> Option<&str> {
        match self {
            Node::Blank(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Node::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// Datatype URI of a literal node
    pub fn datatype(&self) -> Option<&Uri> {
        self.as_literal().and_then(Literal::datatype)
    }

    /// Language tag of a literal node
    pub fn language(&self) -> Option<&str> {
        self.as_literal().and_then(Literal::language)
    }

    /// Native value: the URI, the blank id, or the coerced literal value
    pub fn value(&self) -> Value {
        match self {
            Node::Resource(uri) => Value::Uri(uri.clone()),
            Node::Blank(id) => Value::Blank(id.clone()),
            Node::Literal(literal) => literal.value(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Resource(uri) => write!(f, "<{}>", uri),
            Node::Blank(id) => write!(f, "_:{}", id),
            Node::Literal(literal) => write!(f, "{}", literal),
        }
    }
}

impl From<Uri> for Node {
    fn from(uri: Uri) -> Self {
        Node::Resource(uri)
    }
}

impl From<&Uri> for Node {
    fn from(uri: &Uri) -> Self {
        Node::Resource(uri.clone())
    }
}

impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        Node::Literal(literal)
    }
}

impl From<&Node> for Node {
    fn from(node: &Node) -> Self {
        node.clone()
    }
}

/// Text becomes an `xsd:string` literal; use [`Node::iri`] for resources.
impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Literal(Literal::simple(text))
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Literal(Literal::simple(text))
    }
}

macro_rules! literal_node_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    let datatype = Uri::new_unchecked(<$ty as XsdLexical>::DATATYPE);
                    Node::typed_literal(value.to_xsd_lexical(), datatype)
                }
            }
        )*
    };
}

literal_node_from!(
    bool,
    i32,
    i64,
    u32,
    f32,
    f64,
    chrono::NaiveDate,
    chrono::NaiveTime,
    chrono::DateTime<chrono::FixedOffset>,
    chrono::DateTime<chrono::Utc>,
);

impl TryFrom<serde_json::Value> for Node {
    type Error = NodeError;

    fn try_from(json: serde_json::Value) -> NodeResult<Self> {
        Node::from_value(Value::try_from(json)?)
    }
}
