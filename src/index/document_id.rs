//! Document identifiers.
//!
//! Durable documents are keyed by file name (`policy:<basename>`), so the same
//! library file always maps to the same ID. Ephemeral uploads get a random ID
//! (`temp:<hex>`) that is never reused. The prefixes keep the two spaces apart.
//!
//! Chunk entries are stored as `<document_id>:<sequence>`, so a document ID
//! may not itself end in `:<digits>`.

use crate::error::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

pub const DURABLE_PREFIX: &str = "policy:";
pub const EPHEMERAL_PREFIX: &str = "temp:";

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// A named file in the policy library.
    Durable,
    /// An anonymous upload.
    Ephemeral,
}

/// Stable key of an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// ID of a library file, derived from its base name.
    pub fn durable(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                PolicyError::InvalidInput(format!("{} has no usable file name", path.display()))
            })?;
        let id = format!("{}{}", DURABLE_PREFIX, name);
        if shadows_chunk_id(&id) {
            return Err(PolicyError::InvalidInput(format!(
                "file name {} ends in ':<number>', rename it before indexing",
                name
            )));
        }
        Ok(Self(id))
    }

    /// A fresh ID with 122 bits of randomness (UUIDv4).
    pub fn ephemeral() -> Self {
        Self(format!("{}{}", EPHEMERAL_PREFIX, Uuid::new_v4().simple()))
    }

    /// Parse an ID received from a caller.
    pub fn parse(raw: &str) -> Result<Self> {
        if has_known_prefix(raw) && !shadows_chunk_id(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(PolicyError::InvalidInput(format!(
                "document id must start with '{}' or '{}' and not end in ':<number>': {}",
                DURABLE_PREFIX, EPHEMERAL_PREFIX, raw
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn provenance(&self) -> Provenance {
        if self.0.starts_with(EPHEMERAL_PREFIX) {
            Provenance::Ephemeral
        } else {
            Provenance::Durable
        }
    }
}

fn has_known_prefix(raw: &str) -> bool {
    [DURABLE_PREFIX, EPHEMERAL_PREFIX]
        .iter()
        .any(|prefix| raw.len() > prefix.len() && raw.starts_with(prefix))
}

/// Whether `id` reads as `<document_id>:<sequence>` for some other document.
fn shadows_chunk_id(id: &str) -> bool {
    match id.rsplit_once(':') {
        Some((head, tail)) => {
            !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) && has_known_prefix(head)
        }
        None => false,
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = PolicyError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl std::str::FromStr for DocumentId {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
