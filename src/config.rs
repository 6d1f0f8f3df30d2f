//! Configuration types for document normalisation.
//!
//! All batch behaviour is controlled through [`NormalizeConfig`], built via
//! its [`NormalizeConfigBuilder`]. One config is shared by every task of a
//! batch (and by nested container batches), so it is cheap to clone and
//! holds no per-batch state.

use crate::error::NormalizeError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Placeholder replaced by the extraction output directory.
pub const OUTDIR_PLACEHOLDER: &str = "{outdir}";
/// Placeholder replaced by the archive file path.
pub const ARCHIVE_PLACEHOLDER: &str = "{archive}";

/// Configuration for a normalisation batch.
///
/// # Example
/// ```rust
/// use edgequake_docnorm::NormalizeConfig;
///
/// let config = NormalizeConfig::builder()
///     .office_command("/usr/bin/soffice")
///     .office_concurrency(2)
///     .max_depth(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct NormalizeConfig {
    /// Headless office converter executable. Default: `soffice`.
    ///
    /// Invoked as `<cmd> --headless --convert-to pdf --outdir <dir> <input>`
    /// and expected to write `<stem>.pdf` into `<dir>`.
    pub office_command: String,

    /// Maximum concurrent office converter processes. Default: unbounded.
    ///
    /// LibreOffice refuses to run twice against the same user profile, so
    /// hosts with a shared profile should set this to 1.
    pub office_concurrency: Option<usize>,

    /// Extraction tool for archives other than zip (rar). Default: `7z`.
    pub archive_command: String,

    /// Argument template for `archive_command`. Default: `x -y -o{outdir} {archive}`.
    ///
    /// Each whitespace-separated token is one argument; `{outdir}` and
    /// `{archive}` are substituted inside tokens.
    pub archive_args: Vec<String>,

    /// Images whose width and height are both at most this many pixels are
    /// rejected as thumbnails or tracking pixels. Default: 300.
    pub min_image_dimension: u32,

    /// How many container levels (archive or email) may be expanded. Default: 8.
    ///
    /// A top-level archive is level 1; an email inside it is level 2.
    pub max_depth: usize,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            office_command: "soffice".to_string(),
            office_concurrency: None,
            archive_command: "7z".to_string(),
            archive_args: default_archive_args(),
            min_image_dimension: 300,
            max_depth: 8,
            progress_callback: None,
        }
    }
}

fn default_archive_args() -> Vec<String> {
    split_args("x -y -o{outdir} {archive}")
}

fn split_args(template: &str) -> Vec<String> {
    template.split_whitespace().map(str::to_string).collect()
}

impl fmt::Debug for NormalizeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizeConfig")
            .field("office_command", &self.office_command)
            .field("office_concurrency", &self.office_concurrency)
            .field("archive_command", &self.archive_command)
            .field("archive_args", &self.archive_args)
            .field("min_image_dimension", &self.min_image_dimension)
            .field("max_depth", &self.max_depth)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn NormalizeProgressCallback>"),
            )
            .finish()
    }
}

impl NormalizeConfig {
    /// Create a new builder for `NormalizeConfig`.
    pub fn builder() -> NormalizeConfigBuilder {
        NormalizeConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`NormalizeConfig`].
#[derive(Debug)]
pub struct NormalizeConfigBuilder {
    config: NormalizeConfig,
}

impl NormalizeConfigBuilder {
    pub fn office_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.office_command = cmd.into();
        self
    }

    pub fn office_concurrency(mut self, n: usize) -> Self {
        self.config.office_concurrency = Some(n);
        self
    }

    pub fn archive_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.archive_command = cmd.into();
        self
    }

    /// Set the argument template, e.g. `"x -o{outdir} {archive}"`.
    pub fn archive_args(mut self, template: &str) -> Self {
        self.config.archive_args = split_args(template);
        self
    }

    pub fn min_image_dimension(mut self, px: u32) -> Self {
        self.config.min_image_dimension = px;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NormalizeConfig, NormalizeError> {
        let c = &self.config;
        if c.office_command.trim().is_empty() {
            return Err(NormalizeError::InvalidConfig(
                "office command must not be empty".into(),
            ));
        }
        if c.archive_command.trim().is_empty() {
            return Err(NormalizeError::InvalidConfig(
                "archive command must not be empty".into(),
            ));
        }
        if c.office_concurrency == Some(0) {
            return Err(NormalizeError::InvalidConfig(
                "office concurrency must be ≥ 1".into(),
            ));
        }
        for placeholder in [OUTDIR_PLACEHOLDER, ARCHIVE_PLACEHOLDER] {
            if !c.archive_args.iter().any(|a| a.contains(placeholder)) {
                return Err(NormalizeError::InvalidConfig(format!(
                    "archive args must contain {placeholder}, got {:?}",
                    c.archive_args
                )));
            }
        }
        Ok(self.config)
    }
}
