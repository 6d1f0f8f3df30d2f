//! Pipeline stages for document normalisation.
//!
//! Each submodule implements exactly one conversion. Leaves return plain
//! `Result<_, FileError>`; only [`dispatch`] knows about the batch, logging
//! and recursion, so every converter is independently testable.
//!
//! ## Data Flow
//!
//! ```text
//!                ┌─▶ .pdf ─────────────────────────────▶ CanonicalPdf
//!                ├─▶ image   ──▶ single-page PDF ─────▶ CanonicalPdf
//! SourceFile ─▶ dispatch ─▶ office  ──▶ soffice --convert-to ─▶ CanonicalPdf
//!                ├─▶ archive ──▶ members ─┐
//!                └─▶ email   ──▶ attachments ─┴─▶ collect (nested, concurrent)
//! ```
//!
//! 1. [`dispatch`]: route by extension, apply failure isolation
//! 2. [`image`]: decode, reject thumbnails, wrap into a PDF page
//! 3. [`office`]: external headless converter in a scoped temp dir
//! 4. [`archive`]: zip in-process, rar through an external extractor
//! 5. [`email`]: MIME parse, keep only `attachment` parts

pub mod archive;
pub mod dispatch;
pub mod email;
pub mod image;
pub mod office;
