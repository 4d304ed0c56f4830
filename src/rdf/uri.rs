//! Absolute URI values

use super::node::{NodeError, NodeResult};
use oxiri::Iri;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Immutable absolute URI
///
/// Equality is exact string comparison. The text is shared, so clones are
/// cheap; nodes copy their URIs freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri(Arc<str>);

impl Uri {
    /// Parse and validate an absolute URI
    pub fn new(uri: impl Into<String>) -> NodeResult<Self> {
        let uri = uri.into();
        Iri::parse(uri.as_str()).map_err(|e| NodeError::InvalidUri {
            uri: uri.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self(uri.into()))
    }

    /// Resolve a (possibly relative) reference against this URI
    pub fn resolve(&self, reference: &str) -> NodeResult<Self> {
        let base = Iri::parse(self.as_str()).map_err(|e| NodeError::InvalidUri {
            uri: self.to_string(),
            reason: e.to_string(),
        })?;
        let resolved = base.resolve(reference).map_err(|e| NodeError::InvalidUri {
            uri: reference.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(resolved.into_inner().into()))
    }

    /// Wrap a URI that a trusted collaborator already validated
    pub(crate) fn new_unchecked(uri: impl Into<Arc<str>>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme component, e.g. `http` or `file`
    pub fn scheme(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Uri {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::new(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = NodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Uri::new(value)
    }
}

impl TryFrom<&str> for Uri {
    type Error = NodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Uri::new(value)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.0.to_string()
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
