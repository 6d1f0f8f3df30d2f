//! # edgequake-docnorm
//!
//! Normalise a batch of heterogeneous inbound files (PDFs, office documents,
//! images, zip/rar archives and raw email messages) into a flat list of
//! canonical PDFs with unique, object-store-safe names.
//!
//! Containers are expanded recursively: an email yields its attachments, an
//! archive yields its members, and every member is normalised in turn. Files
//! that cannot be converted are logged and skipped; they never abort the
//! batch.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Vec<SourceFile>
//!  │
//!  ├─ 1. Collect   one tokio task per file, nested levels awaited in place
//!  ├─ 2. Route     case-sensitive extension match
//!  ├─ 3. Convert   passthrough / office / image / archive / email
//!  ├─ 4. Name      <timestamp>-<sanitised stem>-<ordinal path>.pdf
//!  └─ 5. Output    Vec<CanonicalPdf> + BatchStats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docnorm::{collect, SourceFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let files = vec![
//!         SourceFile::new("invoice.docx", std::fs::read("invoice.docx")?),
//!         SourceFile::new("scans.zip", std::fs::read("scans.zip")?),
//!     ];
//!     for pdf in collect(files, "2024-05-17T09:41:03Z").await? {
//!         println!("{} ({} bytes)", pdf.unique_name, pdf.bytes.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## External Tools
//!
//! | Concern | Default command | Configure via |
//! |---------|-----------------|---------------|
//! | Office → PDF | `soffice` | [`NormalizeConfigBuilder::office_command`] |
//! | rar extraction | `7z x -y -o{outdir} {archive}` | [`NormalizeConfigBuilder::archive_command`] |
//!
//! Zip archives, images and email are handled in-process.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docnorm` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! edgequake-docnorm = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod collect;
pub mod config;
pub mod error;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use collect::{collect, collect_sync, collect_with_config, write_outputs};
pub use config::{NormalizeConfig, NormalizeConfigBuilder};
pub use error::{FileError, NormalizeError};
pub use naming::{make_unique_name, sanitize, BatchTimestamp};
pub use output::{BatchStats, CanonicalPdf, CollectOutput, OrdinalPath, SourceFile};
pub use progress::{NoopProgressCallback, NormalizeProgressCallback, ProgressCallback};
