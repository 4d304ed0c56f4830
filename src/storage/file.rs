//! Document-backed storage
//!
//! Both backends keep their statements in a [`MemoryStorage`]. `file` loads
//! the document named by the configuration (if it exists) and writes it back
//! on close when anything changed; `uri` loads a `file:` URI once and is
//! read-only.

use super::{MemoryStorage, Position, Storage, StorageConfig, StorageError, StorageKind, StorageResult};
use crate::io::{file_uri_path, Parser, SerializeResult, Serializer, Syntax};
use crate::rdf::{Statement, Uri};
use crate::World;
use std::ffi::OsString;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn syntax_option(config: &StorageConfig) -> StorageResult<Syntax> {
    match config.text_option("format") {
        None => Ok(Syntax::default()),
        Some(name) => {
            let syntax: Syntax = name.parse().map_err(|_| StorageError::InvalidOption {
                key: "format".to_string(),
                reason: format!("unknown syntax '{}'", name),
            })?;
            if !syntax.can_parse() {
                return Err(StorageError::InvalidOption {
                    key: "format".to_string(),
                    reason: format!("'{}' documents cannot be loaded", syntax),
                });
            }
            Ok(syntax)
        }
    }
}

/// Parse a document into a fresh memory store
fn load(world: &World, path: &Path, syntax: Syntax, base_uri: Option<&Uri>) -> StorageResult<MemoryStorage> {
    let reader = BufReader::new(File::open(path)?);
    let statements = Parser::with_world(syntax, world)
        .parse_reader(reader, base_uri)
        .map_err(|e| StorageError::Document(e.to_string()))?;

    let mut storage = MemoryStorage::new();
    for statement in statements {
        let statement = statement.map_err(|e| StorageError::Document(e.to_string()))?;
        storage.insert(&statement)?;
    }
    info!("Loaded {} statements from {}", storage.len(), path.display());
    Ok(storage)
}

/// Replace the document at `path` once `render` has produced all of it
///
/// The bytes go to a sibling `.tmp` file that is renamed over `path`, so a
/// failed render or write leaves the previous document in place.
fn replace_document<F>(path: &Path, render: F) -> StorageResult<()>
where
    F: FnOnce(&mut Vec<u8>) -> SerializeResult<()>,
{
    let mut buffer = Vec::new();
    render(&mut buffer).map_err(|e| StorageError::Document(e.to_string()))?;

    let mut staging_name = path.file_name().map(OsString::from).unwrap_or_default();
    staging_name.push(".tmp");
    let staging = path.with_file_name(staging_name);
    std::fs::write(&staging, &buffer)?;
    if let Err(e) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }
    Ok(())
}

/// Memory store persisted to a document on close
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    syntax: Syntax,
    inner: MemoryStorage,
    dirty: bool,
}

impl FileStorage {
    /// Open the document named by `config.name`
    ///
    /// Options: `format` (syntax name, default `rdfxml`) and `new` (start
    /// empty even if the file exists).
    pub fn open(world: &World, config: &StorageConfig) -> StorageResult<Self> {
        let name = config
            .name
            .as_deref()
            .ok_or_else(|| StorageError::InitFailed("file storage requires a file name".to_string()))?;
        let path = PathBuf::from(name);
        let syntax = syntax_option(config)?;
        let fresh = config.bool_option("new")?.unwrap_or(false);

        let inner = if !fresh && path.exists() {
            load(world, &path, syntax, None)?
        } else {
            debug!("Starting empty file storage at {}", path.display());
            MemoryStorage::new()
        };

        Ok(Self {
            path,
            syntax,
            inner,
            dirty: fresh,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the document now if anything changed
    pub fn sync(&mut self) -> StorageResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let statements: Vec<Statement> = self.inner.all_statements().collect();
        let serializer = Serializer::new(self.syntax);
        replace_document(&self.path, |buffer| serializer.write_statements(&statements, buffer))?;
        self.dirty = false;
        info!("Saved {} statements to {}", statements.len(), self.path.display());
        Ok(())
    }
}

impl Storage for FileStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::File
    }

    fn insert(&mut self, statement: &Statement) -> StorageResult<bool> {
        let inserted = self.inner.insert(statement)?;
        self.dirty |= inserted;
        Ok(inserted)
    }

    fn remove(&mut self, statement: &Statement) -> StorageResult<bool> {
        let removed = self.inner.remove(statement)?;
        self.dirty |= removed;
        Ok(removed)
    }

    fn contains(&self, statement: &Statement) -> bool {
        self.inner.contains(statement)
    }

    fn count(&self) -> Option<usize> {
        self.inner.count()
    }

    fn next_match(&self, pattern: &Statement, position: Position) -> Option<(Statement, Position)> {
        self.inner.next_match(pattern, position)
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn transaction_start(&mut self) -> StorageResult<()> {
        self.inner.transaction_start()
    }

    fn transaction_commit(&mut self) -> StorageResult<()> {
        self.inner.transaction_commit()
    }

    fn transaction_rollback(&mut self) -> StorageResult<()> {
        self.inner.transaction_rollback()
    }

    fn close(&mut self) -> StorageResult<()> {
        self.inner.close()?;
        self.sync()
    }
}

/// Read-only store loaded from a `file:` URI
#[derive(Debug)]
pub struct UriStorage {
    uri: Uri,
    inner: MemoryStorage,
}

impl UriStorage {
    /// Load the document at `config.name`; the URI doubles as base URI
    pub fn open(world: &World, config: &StorageConfig) -> StorageResult<Self> {
        let name = config
            .name
            .as_deref()
            .ok_or_else(|| StorageError::InitFailed("uri storage requires a URI".to_string()))?;
        let uri = Uri::new(name).map_err(|e| StorageError::InitFailed(e.to_string()))?;
        let path = file_uri_path(&uri).map_err(|e| StorageError::InitFailed(e.to_string()))?;
        let syntax = syntax_option(config)?;

        let mut inner = load(world, &path, syntax, Some(&uri))?;
        inner.set_read_only(true);
        Ok(Self { uri, inner })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

impl Storage for UriStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Uri
    }

    fn insert(&mut self, _statement: &Statement) -> StorageResult<bool> {
        Err(StorageError::ReadOnly)
    }

    fn remove(&mut self, _statement: &Statement) -> StorageResult<bool> {
        Err(StorageError::ReadOnly)
    }

    fn contains(&self, statement: &Statement) -> bool {
        self.inner.contains(statement)
    }

    fn count(&self) -> Option<usize> {
        self.inner.count()
    }

    fn next_match(&self, pattern: &Statement, position: Position) -> Option<(Statement, Position)> {
        self.inner.next_match(pattern, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SerializeError;
    use crate::rdf::Node;

    const DOC: &str = "<http://ex.org/s> <http://ex.org/p> \"one\" .\n\
                       <http://ex.org/s> <http://ex.org/p> \"two\" .\n";

    fn stmt(o: &str) -> Statement {
        Statement::triple(
            Node::iri("http://ex.org/s").unwrap(),
            Node::iri("http://ex.org/p").unwrap(),
            o,
        )
    }

    #[test]
    fn test_file_storage_loads_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.nt");
        std::fs::write(&path, DOC).unwrap();
        let world = World::new();
        let config = StorageConfig::file(path.to_string_lossy()).with_option("format", "ntriples");

        let mut storage = FileStorage::open(&world, &config).unwrap();
        assert_eq!(storage.count(), Some(2));
        assert!(storage.insert(&stmt("three")).unwrap());
        assert!(storage.remove(&stmt("one")).unwrap());
        storage.close().unwrap();

        let reopened = FileStorage::open(&world, &config).unwrap();
        assert_eq!(reopened.count(), Some(2));
        assert!(reopened.contains(&stmt("three")));
        assert!(!reopened.contains(&stmt("one")));
    }

    #[test]
    fn test_failed_render_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.nt");
        std::fs::write(&path, DOC).unwrap();

        let result = replace_document(&path, |buffer| {
            buffer.extend_from_slice(b"<http://ex.org/s> ");
            Err(SerializeError::Serialize("literal subject".to_string()))
        });
        assert!(matches!(result, Err(StorageError::Document(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DOC);
        assert!(!dir.path().join("data.nt.tmp").exists());

        replace_document(&path, |buffer| {
            buffer.extend_from_slice(b"# empty\n");
            Ok(())
        })
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# empty\n");
        assert!(!dir.path().join("data.nt.tmp").exists());
    }

    #[test]
    fn test_new_option_ignores_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.nt");
        std::fs::write(&path, DOC).unwrap();

        let config = StorageConfig::file(path.to_string_lossy())
            .with_option("format", "ntriples")
            .with_option("new", true);
        let storage = FileStorage::open(&World::new(), &config).unwrap();
        assert_eq!(storage.count(), Some(0));
    }

    #[test]
    fn test_file_storage_rejects_bad_format() {
        let config = StorageConfig::file("/nonexistent/x.dot").with_option("format", "dot");
        assert!(matches!(
            FileStorage::open(&World::new(), &config),
            Err(StorageError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_uri_storage_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.nt");
        std::fs::write(&path, DOC).unwrap();
        let uri = format!("file://{}", path.display());

        let mut storage = UriStorage::open(
            &World::new(),
            &StorageConfig::uri(uri).with_option("format", "ntriples"),
        )
        .unwrap();
        assert_eq!(storage.count(), Some(2));
        assert!(matches!(storage.insert(&stmt("three")), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn test_uri_storage_requires_file_scheme() {
        let result = UriStorage::open(&World::new(), &StorageConfig::uri("http://ex.org/data.rdf"));
        assert!(matches!(result, Err(StorageError::InitFailed(_))));
    }
}
