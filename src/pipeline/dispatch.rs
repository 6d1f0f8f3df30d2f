//! Extension routing and per-file failure isolation.
//!
//! [`dispatch`] is the unit of work the collector spawns for every file. It
//! never returns an error: whatever a converter reports is logged, counted
//! and forwarded to the progress callback, and the file simply contributes
//! no PDF.

use crate::batch::{ConversionBatch, Outcome};
use crate::collect::collect_nested;
use crate::error::FileError;
use crate::output::{OrdinalPath, SourceFile};
use crate::pipeline::{archive, email, image, office};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which converter handles a given extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Already a PDF.
    Passthrough,
    /// No extension: treated as a raw email message.
    Email,
    Archive,
    Office,
    Image,
    Unsupported,
}

/// Route by extension, matched case-sensitively (`".PDF"` is unsupported).
pub fn route(ext: &str) -> Route {
    match ext {
        ".pdf" => Route::Passthrough,
        "" => Route::Email,
        ".zip" | ".rar" => Route::Archive,
        ".doc" | ".docx" | ".xls" | ".xlsx" | ".csv" | ".txt" => Route::Office,
        ".jpg" | ".jpeg" | ".png" | ".bmp" | ".tiff" | ".tif" => Route::Image,
        _ => Route::Unsupported,
    }
}

enum Handled {
    /// One PDF was produced and appended to the batch.
    Produced(Outcome),
    /// A container whose members were collected.
    Expanded,
}

/// Process one file to completion, appending any PDF to `batch`.
pub(crate) async fn dispatch(file: SourceFile, ordinal: OrdinalPath, batch: Arc<ConversionBatch>) {
    let name = file.display_name().to_string();
    let ordinal_label = ordinal.to_string();
    let callback = batch.config().progress_callback.clone();

    debug!("Processing [{}] {}", ordinal_label, name);
    if let Some(ref cb) = callback {
        cb.on_file_start(&ordinal_label, &name);
    }

    match convert(file, &ordinal, &batch).await {
        Ok(handled) => {
            let (outcome, outputs) = match handled {
                Handled::Produced(outcome) => (outcome, 1),
                Handled::Expanded => (Outcome::Expanded, 0),
            };
            batch.record(outcome);
            if let Some(ref cb) = callback {
                cb.on_file_complete(&ordinal_label, &name, outputs);
            }
        }
        Err(err) => {
            if err.is_policy() {
                info!("Skipping [{}] {}: {}", ordinal_label, name, err);
            } else {
                warn!("Failed [{}] {}: {}", ordinal_label, name, err);
            }
            let outcome = match err {
                FileError::Unsupported { .. } => Outcome::Dropped,
                FileError::Rejected { .. } => Outcome::Rejected,
                FileError::DepthExceeded { .. } => Outcome::DepthExceeded,
                _ => Outcome::Failed,
            };
            batch.record(outcome);
            if let Some(ref cb) = callback {
                cb.on_file_error(&ordinal_label, &name, &err.to_string());
            }
        }
    }
}

async fn convert(
    file: SourceFile,
    ordinal: &OrdinalPath,
    batch: &Arc<ConversionBatch>,
) -> Result<Handled, FileError> {
    let config = batch.config();
    let (stem, ext) = file.split_name();
    let (stem, ext) = (stem.to_string(), ext.to_string());
    let SourceFile { name, bytes } = file;

    match route(&ext) {
        Route::Passthrough => {
            let pdf = batch.canonical(&stem, name.as_deref(), ordinal, bytes);
            batch.push(pdf).await;
            Ok(Handled::Produced(Outcome::Passthrough))
        }

        Route::Office => {
            let _permit = match batch.office_slots() {
                Some(slots) => Some(slots.acquire().await.map_err(|e| {
                    FileError::ExternalProcess {
                        command: config.office_command.clone(),
                        detail: e.to_string(),
                    }
                })?),
                None => None,
            };
            let bytes = office::office_to_pdf(&bytes, &stem, &ext, &config.office_command).await?;
            let pdf = batch.canonical(&stem, name.as_deref(), ordinal, bytes);
            batch.push(pdf).await;
            Ok(Handled::Produced(Outcome::Converted))
        }

        Route::Image => {
            let min = config.min_image_dimension;
            let bytes = tokio::task::spawn_blocking(move || image::image_to_pdf(&bytes, min))
                .await
                .map_err(|e| FileError::Decode {
                    detail: format!("image task panicked: {e}"),
                })??;
            let pdf = batch.canonical(&stem, name.as_deref(), ordinal, bytes);
            batch.push(pdf).await;
            Ok(Handled::Produced(Outcome::Converted))
        }

        Route::Archive => {
            check_depth(ordinal, batch)?;
            let filename = name.as_deref().unwrap_or_default();
            let members = archive::extract_archive(&bytes, filename, config).await?;
            collect_nested(members, ordinal, Arc::clone(batch)).await;
            Ok(Handled::Expanded)
        }

        Route::Email => {
            check_depth(ordinal, batch)?;
            let members = tokio::task::spawn_blocking(move || email::attachments(&bytes))
                .await
                .map_err(|e| FileError::Decode {
                    detail: format!("email task panicked: {e}"),
                })??;
            collect_nested(members, ordinal, Arc::clone(batch)).await;
            Ok(Handled::Expanded)
        }

        Route::Unsupported => Err(FileError::Unsupported { extension: ext }),
    }
}

/// Members of the container at `ordinal` would sit one level deeper.
fn check_depth(ordinal: &OrdinalPath, batch: &ConversionBatch) -> Result<(), FileError> {
    let max_depth = batch.config().max_depth;
    if ordinal.depth() + 1 > max_depth {
        return Err(FileError::DepthExceeded { max_depth });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_extension() {
        assert_eq!(route(".pdf"), Route::Passthrough);
        assert_eq!(route(""), Route::Email);
        assert_eq!(route(".zip"), Route::Archive);
        assert_eq!(route(".rar"), Route::Archive);
        for ext in [".doc", ".docx", ".xls", ".xlsx", ".csv", ".txt"] {
            assert_eq!(route(ext), Route::Office, "{ext}");
        }
        for ext in [".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".tif"] {
            assert_eq!(route(ext), Route::Image, "{ext}");
        }
    }

    #[test]
    fn routing_is_case_sensitive() {
        assert_eq!(route(".PDF"), Route::Unsupported);
        assert_eq!(route(".Jpg"), Route::Unsupported);
    }

    #[test]
    fn unknown_extensions_are_unsupported() {
        for ext in [".exe", ".html", ".eml", ".gz", "."] {
            assert_eq!(route(ext), Route::Unsupported, "{ext}");
        }
    }
}
