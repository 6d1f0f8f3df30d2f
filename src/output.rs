//! Data model: the files that go into a batch and the PDFs that come out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named byte blob awaiting normalisation.
///
/// `name` is `None` for synthetic inputs such as MIME parts without a
/// declared filename; the dispatcher treats those as email containers.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: Option<String>,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: Some(name.into()),
            bytes: bytes.into(),
        }
    }

    pub fn unnamed(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            bytes: bytes.into(),
        }
    }

    /// Split the name into `(stem, extension)`.
    ///
    /// The extension keeps its leading dot and is empty when the name has
    /// none. Only the final `.` of the last path component counts, and
    /// leading dots (`.hidden`) never start an extension.
    pub fn split_name(&self) -> (&str, &str) {
        match self.name.as_deref() {
            Some(name) => split_extension(name),
            None => ("", ""),
        }
    }

    /// The name used in logs and manifests.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    let base_start = name.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let base = &name[base_start..];
    let leading_dots = base.len() - base.trim_start_matches('.').len();

    match base[leading_dots..].rfind('.') {
        Some(i) => {
            let dot = base_start + leading_dots + i;
            (&name[..dot], &name[dot..])
        }
        None => (name, ""),
    }
}

/// One normalised output document.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPdf {
    /// Collision-free name, `<timestamp>-<sanitised stem>-<ordinal>.pdf`.
    pub unique_name: String,
    /// Name of the file this PDF was produced from.
    pub source_name: Option<String>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl fmt::Debug for CanonicalPdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalPdf")
            .field("unique_name", &self.unique_name)
            .field("source_name", &self.source_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Position of a file within the batch tree.
///
/// Top-level files have a single 1-based component. A file discovered at
/// nested position `j` inside the container at path `p` has path `p.j`,
/// which keeps names unique across sibling containers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrdinalPath(Vec<usize>);

impl OrdinalPath {
    pub fn root(ordinal: usize) -> Self {
        Self(vec![ordinal])
    }

    pub fn child(&self, ordinal: usize) -> Self {
        let mut path = self.0.clone();
        path.push(ordinal);
        Self(path)
    }

    /// Number of containers enclosing this file (0 for top-level files).
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn components(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for OrdinalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

/// Counters for one batch, snapshotted when it finishes.
///
/// `completed == dispatched` for every finished batch: each dispatched file
/// was fully processed before `collect` returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Files handed to the dispatcher, nested discoveries included.
    pub dispatched: usize,
    /// Dispatches that ran to completion (success or handled failure).
    pub completed: usize,
    /// `.pdf` inputs passed through unchanged.
    pub passthrough: usize,
    /// PDFs produced by the image or office converters.
    pub converted: usize,
    /// Inputs with an unrecognised extension.
    pub dropped: usize,
    /// Inputs excluded by policy (thumbnail-sized images).
    pub rejected: usize,
    /// Inputs that failed to decode, convert or extract.
    pub failed: usize,
    /// Containers skipped for exceeding the nesting limit.
    pub depth_exceeded: usize,
    /// Wall-clock time of the batch in milliseconds.
    pub duration_ms: u64,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectOutput {
    /// Canonical PDFs in completion order.
    pub pdfs: Vec<CanonicalPdf>,
    pub stats: BatchStats,
}
