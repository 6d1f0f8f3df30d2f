//! Error types for the edgequake-docnorm library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`NormalizeError`] is **fatal**. The batch cannot be started at all
//!   (unparseable receive time, invalid configuration). Returned as
//!   `Err(NormalizeError)` from the top-level `collect*` functions before any
//!   task is spawned.
//!
//! * [`FileError`] is **non-fatal**. A single input produced nothing (corrupt
//!   image, converter exited non-zero, archive would not open, file rejected
//!   by policy). Logged and counted in [`crate::output::BatchStats`]; the
//!   rest of the batch carries on.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docnorm library.
///
/// Per-file failures use [`FileError`] and never reach the caller of
/// [`crate::collect::collect`].
#[derive(Debug, Error)]
pub enum NormalizeError {
    // ── Batch preconditions ───────────────────────────────────────────────
    /// The batch receive time could not be parsed.
    #[error("Invalid batch timestamp '{input}': expected YYYY-MM-DDTHH:MM:SSZ or RFC 3339")]
    InvalidTimestamp { input: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a canonical PDF or the manifest.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single input yielded no canonical PDF.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FileError {
    /// Bytes could not be parsed as the expected image/email/PDF payload.
    #[error("decode failed: {detail}")]
    Decode { detail: String },

    /// The external converter could not be started or exited non-zero.
    #[error("'{command}' failed: {detail}")]
    ExternalProcess { command: String, detail: String },

    /// The converter succeeded but did not write the expected output file.
    #[error("converter produced no output '{expected}'")]
    MissingOutput { expected: String },

    /// The archive could not be opened or extracted.
    #[error("archive extraction failed: {detail}")]
    Archive { detail: String },

    /// Valid input intentionally excluded (e.g. thumbnail-sized image).
    #[error("rejected by policy: {reason}")]
    Rejected { reason: String },

    /// The extension is not handled by any converter.
    #[error("unsupported extension '{extension}'")]
    Unsupported { extension: String },

    /// A container was nested deeper than the configured limit.
    #[error("container nesting exceeds max depth {max_depth}")]
    DepthExceeded { max_depth: usize },

    /// Scoped temp-space I/O failed.
    #[error("temp I/O failed: {0}")]
    Io(String),
}

impl FileError {
    /// `true` for intentional exclusions that are not failures.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            FileError::Rejected { .. } | FileError::Unsupported { .. }
        )
    }
}

impl From<std::io::Error> for FileError {
    fn from(e: std::io::Error) -> Self {
        FileError::Io(e.to_string())
    }
}
