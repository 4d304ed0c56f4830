//! Parsing and serializing RDF documents
//!
//! Supports:
//! - RDF/XML (parse and serialize)
//! - N-Triples (parse and serialize)
//! - Turtle (parse and serialize)
//! - RDF/JSON (serialize)
//! - Graphviz dot (serialize)
//!
//! Parsers produce plain [`Statement`]s; [`Parser::parse_stream`] leaves it
//! to the caller whether each one goes into a model.

mod dot;
mod json;
mod rio;

use crate::model::Model;
use crate::rdf::{NodeError, Statement, Uri};
use crate::storage::StorageError;
use crate::world::{BlankRelabeler, World};
use percent_encoding::percent_decode_str;
use rio_turtle::TurtleError;
use rio_xml::RdfXmlError;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Document syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Syntax {
    #[default]
    RdfXml,
    NTriples,
    Turtle,
    /// RDF/JSON, serialize only
    Json,
    /// Graphviz, serialize only
    Dot,
}

impl Syntax {
    pub fn name(&self) -> &'static str {
        match self {
            Syntax::RdfXml => "rdfxml",
            Syntax::NTriples => "ntriples",
            Syntax::Turtle => "turtle",
            Syntax::Json => "json",
            Syntax::Dot => "dot",
        }
    }

    /// Whether documents in this syntax can be parsed
    pub fn can_parse(&self) -> bool {
        matches!(self, Syntax::RdfXml | Syntax::NTriples | Syntax::Turtle)
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Syntax {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rdfxml" | "rdf/xml" | "rdf" | "xml" => Ok(Syntax::RdfXml),
            "ntriples" | "n-triples" | "nt" => Ok(Syntax::NTriples),
            "turtle" | "ttl" => Ok(Syntax::Turtle),
            "json" => Ok(Syntax::Json),
            "dot" => Ok(Syntax::Dot),
            _ => Err(ParseError::UnknownSyntax(s.to_string())),
        }
    }
}

/// Parse errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Turtle or N-Triples syntax error
    #[error("Turtle syntax error: {0}")]
    Turtle(#[from] TurtleError),

    /// RDF/XML syntax error
    #[error("RDF/XML syntax error: {0}")]
    RdfXml(#[from] RdfXmlError),

    /// Parsed term is not a valid node
    #[error("Invalid term: {0}")]
    Term(#[from] NodeError),

    /// RDF-star and other terms with no node equivalent
    #[error("Unsupported term: {0}")]
    UnsupportedTerm(String),

    /// Unrecognized syntax name
    #[error("Unknown syntax: {0}")]
    UnknownSyntax(String),

    /// Syntax has no parser
    #[error("Syntax cannot be parsed: {0}")]
    NotParsable(Syntax),

    /// Base URI rejected by the parser
    #[error("Invalid base URI: {0}")]
    InvalidBaseUri(String),

    /// Only `file:` URIs can be read
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    /// `file:` URI path is not valid percent-encoded UTF-8
    #[error("Invalid file URI path: {0}")]
    InvalidFilePath(String),

    /// The target model refused a write
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Serialization errors
#[derive(Error, Debug)]
pub enum SerializeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Formatter rejected a statement
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// JSON encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SerializeResult<T> = Result<T, SerializeError>;

/// Lazy stream of parsed statements
///
/// Blank nodes come out relabelled with fresh identifiers from the parser's
/// world. After the first error the stream ends.
pub struct ParsedStatements {
    inner: Box<dyn Iterator<Item = ParseResult<Statement>>>,
    failed: bool,
}

impl Iterator for ParsedStatements {
    type Item = ParseResult<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?;
        self.failed = item.is_err();
        Some(item)
    }
}

/// RDF parser
#[derive(Debug, Clone)]
pub struct Parser {
    syntax: Syntax,
    world: World,
}

impl Parser {
    /// Parser whose blank nodes come from a fresh world
    pub fn new(syntax: Syntax) -> Self {
        Self::with_world(syntax, &World::new())
    }

    pub fn with_world(syntax: Syntax, world: &World) -> Self {
        Self {
            syntax,
            world: world.clone(),
        }
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Parse a document without adding it anywhere
    pub fn parse_stream(&self, content: impl Into<String>, base_uri: Option<&Uri>) -> ParseResult<ParsedStatements> {
        let reader = Cursor::new(content.into().into_bytes());
        self.parse_reader(reader, base_uri)
    }

    /// Parse a document from any buffered reader
    pub fn parse_reader<R>(&self, reader: R, base_uri: Option<&Uri>) -> ParseResult<ParsedStatements>
    where
        R: BufRead + 'static,
    {
        if !self.syntax.can_parse() {
            return Err(ParseError::NotParsable(self.syntax));
        }
        let relabeler = BlankRelabeler::new(&self.world);
        let inner = match self.syntax {
            // N-Triples requires a final newline; an extra one is harmless
            Syntax::NTriples => rio::parse(self.syntax, reader.chain(&b"\n"[..]), base_uri, relabeler)?,
            _ => rio::parse(self.syntax, reader, base_uri, relabeler)?,
        };
        Ok(ParsedStatements { inner, failed: false })
    }

    /// Parse a document into `model`; returns the number of statements added
    pub fn parse_into(&self, model: &Model, content: &str, base_uri: Option<&Uri>) -> ParseResult<usize> {
        self.parse_into_filtered(model, content, base_uri, |_| true)
    }

    /// Parse a document, adding only the statements `filter` accepts
    pub fn parse_into_filtered<F>(
        &self,
        model: &Model,
        content: &str,
        base_uri: Option<&Uri>,
        filter: F,
    ) -> ParseResult<usize>
    where
        F: FnMut(&Statement) -> bool,
    {
        let stream = self.parse_stream(content, base_uri)?;
        self.load(model, stream, filter)
    }

    /// Parse a file into `model`
    pub fn parse_file_into(&self, model: &Model, path: impl AsRef<Path>, base_uri: Option<&Uri>) -> ParseResult<usize> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        debug!("Parsing {} as {}", path.display(), self.syntax);
        let stream = self.parse_reader(reader, base_uri)?;
        self.load(model, stream, |_| true)
    }

    /// Parse the document at a `file:` URI into `model`, using the URI as
    /// base
    pub fn parse_uri_into(&self, model: &Model, uri: &Uri) -> ParseResult<usize> {
        let path = file_uri_path(uri)?;
        let reader = BufReader::new(File::open(&path)?);
        let stream = self.parse_reader(reader, Some(uri))?;
        self.load(model, stream, |_| true)
    }

    fn load<F>(&self, model: &Model, stream: ParsedStatements, mut filter: F) -> ParseResult<usize>
    where
        F: FnMut(&Statement) -> bool,
    {
        let mut parsed = 0;
        let mut added = 0;
        for statement in stream {
            let statement = statement?;
            parsed += 1;
            if filter(&statement) && model.insert(&statement)? {
                added += 1;
            }
        }
        info!("Parsed {} statements ({}), added {}", parsed, self.syntax, added);
        Ok(added)
    }
}

/// Local path of a `file:` URI
pub(crate) fn file_uri_path(uri: &Uri) -> ParseResult<std::path::PathBuf> {
    if uri.scheme() != "file" {
        return Err(ParseError::UnsupportedScheme(uri.to_string()));
    }
    let rest = &uri.as_str()["file:".len()..];
    let path = rest.strip_prefix("//localhost").or_else(|| rest.strip_prefix("//")).unwrap_or(rest);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| ParseError::InvalidFilePath(uri.to_string()))?;
    Ok(std::path::PathBuf::from(decoded.as_ref()))
}

/// RDF serializer
#[derive(Debug, Clone, Copy)]
pub struct Serializer {
    syntax: Syntax,
}

impl Serializer {
    pub fn new(syntax: Syntax) -> Self {
        Self { syntax }
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Serialize every statement of `model` to a string
    pub fn serialize(&self, model: &Model) -> SerializeResult<String> {
        let mut output = Vec::new();
        self.write_model(model, &mut output)?;
        String::from_utf8(output).map_err(|e| SerializeError::Serialize(e.to_string()))
    }

    /// Serialize every statement of `model` to a file
    pub fn serialize_to_file(&self, model: &Model, path: impl AsRef<Path>) -> SerializeResult<()> {
        let mut file = std::io::BufWriter::new(File::create(path.as_ref())?);
        self.write_model(model, &mut file)?;
        file.flush()?;
        Ok(())
    }

    fn write_model<W: Write>(&self, model: &Model, writer: W) -> SerializeResult<()> {
        let statements = model.snapshot(&Statement::new());
        self.write_statements(&statements, writer)
    }

    /// Serialize a list of complete statements
    pub fn write_statements<W: Write>(&self, statements: &[Statement], writer: W) -> SerializeResult<()> {
        debug!("Serializing {} statements as {}", statements.len(), self.syntax);
        match self.syntax {
            Syntax::RdfXml | Syntax::NTriples | Syntax::Turtle => rio::format(self.syntax, statements, writer),
            Syntax::Json => json::write(statements, writer),
            Syntax::Dot => dot::write(statements, writer),
        }
    }
}
