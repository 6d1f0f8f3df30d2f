//! Batch entry points: fan out one task per file, wait for all of them.
//!
//! Every file of a `collect` call is dispatched on its own tokio task. A
//! container (archive or email) expands into a nested level that is
//! collected the same way, and the container's task waits for that level to
//! finish. The top-level call therefore returns only once every task it
//! spawned, directly or through containers, has completed. Nothing keeps
//! running in the background afterwards.
//!
//! Output order follows completion, not input. Identify results by
//! `unique_name` and `source_name`.

use crate::batch::{ConversionBatch, Outcome};
use crate::config::NormalizeConfig;
use crate::error::NormalizeError;
use crate::naming::BatchTimestamp;
use crate::output::{CanonicalPdf, CollectOutput, OrdinalPath, SourceFile};
use crate::pipeline::dispatch::dispatch;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Normalise `files` into canonical PDFs with the default configuration.
///
/// `received_at` seeds every output name, e.g. `2024-05-17T09:41:03Z`.
///
/// # Errors
/// Only [`NormalizeError::InvalidTimestamp`], raised before any file is
/// touched. Individual files that fail to convert are logged and skipped.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docnorm::{collect, SourceFile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let files = vec![SourceFile::new("invoice.pdf", std::fs::read("invoice.pdf")?)];
/// for pdf in collect(files, "2024-05-17T09:41:03Z").await? {
///     println!("{} <- {:?}", pdf.unique_name, pdf.source_name);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn collect(
    files: Vec<SourceFile>,
    received_at: &str,
) -> Result<Vec<CanonicalPdf>, NormalizeError> {
    let timestamp = BatchTimestamp::parse(received_at)?;
    let output = collect_with_config(files, timestamp, &NormalizeConfig::default()).await;
    Ok(output.pdfs)
}

/// Normalise `files` with an explicit configuration, returning batch stats too.
pub async fn collect_with_config(
    files: Vec<SourceFile>,
    timestamp: BatchTimestamp,
    config: &NormalizeConfig,
) -> CollectOutput {
    info!("Starting batch {}: {} files", timestamp, files.len());
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(files.len());
    }

    let batch = ConversionBatch::new(timestamp, config.clone());
    collect_level(files, None, Arc::clone(&batch)).await;

    let pdfs = batch.take_results().await;
    let stats = batch.stats();
    info!(
        "Batch {} complete: {} pdfs from {} files ({} dropped, {} rejected, {} failed) in {}ms",
        batch.timestamp(),
        pdfs.len(),
        stats.dispatched,
        stats.dropped,
        stats.rejected,
        stats.failed,
        stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&stats);
    }

    CollectOutput { pdfs, stats }
}

/// Synchronous wrapper around [`collect_with_config`].
///
/// Creates a temporary tokio runtime internally; do not call from async code.
pub fn collect_sync(
    files: Vec<SourceFile>,
    timestamp: BatchTimestamp,
    config: &NormalizeConfig,
) -> Result<CollectOutput, NormalizeError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| NormalizeError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(runtime.block_on(collect_with_config(files, timestamp, config)))
}

/// Collect the members of the container at `parent`.
pub(crate) fn collect_nested(
    files: Vec<SourceFile>,
    parent: &OrdinalPath,
    batch: Arc<ConversionBatch>,
) -> BoxFuture<'static, ()> {
    collect_level(files, Some(parent.clone()), batch)
}

fn collect_level(
    files: Vec<SourceFile>,
    parent: Option<OrdinalPath>,
    batch: Arc<ConversionBatch>,
) -> BoxFuture<'static, ()> {
    async move {
        let mut tasks = JoinSet::new();
        for (index, file) in files.into_iter().enumerate() {
            let ordinal = match parent {
                Some(ref p) => p.child(index + 1),
                None => OrdinalPath::root(index + 1),
            };
            batch.record_dispatch();
            tasks.spawn(dispatch(file, ordinal, Arc::clone(&batch)));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Dispatch task did not finish: {}", e);
                batch.record(Outcome::Failed);
            }
        }
    }
    .boxed()
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    unique_name: &'a str,
    source_name: Option<&'a str>,
    size: usize,
}

/// Write every PDF to `dir` under its unique name, plus `manifest.json`.
///
/// Uses atomic writes (temp file + rename) so a crash never leaves a
/// truncated PDF behind. Returns the manifest path.
pub async fn write_outputs(
    pdfs: &[CanonicalPdf],
    dir: impl AsRef<Path>,
) -> Result<PathBuf, NormalizeError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| NormalizeError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    for pdf in pdfs {
        write_atomic(&dir.join(&pdf.unique_name), &pdf.bytes).await?;
    }

    let entries: Vec<ManifestEntry<'_>> = pdfs
        .iter()
        .map(|p| ManifestEntry {
            unique_name: &p.unique_name,
            source_name: p.source_name.as_deref(),
            size: p.bytes.len(),
        })
        .collect();
    let manifest = serde_json::to_vec_pretty(&entries)
        .map_err(|e| NormalizeError::Internal(format!("Failed to serialise manifest: {e}")))?;

    let manifest_path = dir.join("manifest.json");
    write_atomic(&manifest_path, &manifest).await?;
    Ok(manifest_path)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), NormalizeError> {
    let write_err = |source| NormalizeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> BatchTimestamp {
        BatchTimestamp::parse("2024-05-17T09:41:03Z").unwrap()
    }

    #[tokio::test]
    async fn invalid_timestamp_fails_before_dispatch() {
        let err = collect(vec![SourceFile::new("a.pdf", b"%PDF".to_vec())], "not a time")
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidTimestamp { .. }));
    }

    #[tokio::test]
    async fn empty_batch_returns_nothing() {
        let out = collect_with_config(Vec::new(), ts(), &NormalizeConfig::default()).await;
        assert!(out.pdfs.is_empty());
        assert_eq!(out.stats.dispatched, 0);
        assert_eq!(out.stats.completed, 0);
    }

    #[tokio::test]
    async fn pdf_passthrough_keeps_bytes() {
        let bytes = b"%PDF-1.7\n%".to_vec();
        assert_eq!(bytes.len(), 10);
        let files = vec![SourceFile::new("Bill 7.pdf", bytes.clone())];
        let pdfs = collect(files, "2024-05-17T09:41:03Z").await.unwrap();
        assert_eq!(pdfs.len(), 1);
        assert_eq!(pdfs[0].bytes, bytes);
        assert_eq!(pdfs[0].unique_name, "20240517094103-Bill_7-1.pdf");
        assert_eq!(pdfs[0].source_name.as_deref(), Some("Bill 7.pdf"));
    }

    #[tokio::test]
    async fn duplicate_names_get_distinct_ordinals() {
        let files = vec![
            SourceFile::new("scan.pdf", b"%PDF-a".to_vec()),
            SourceFile::new("scan.pdf", b"%PDF-b".to_vec()),
        ];
        let out = collect_with_config(files, ts(), &NormalizeConfig::default()).await;
        let mut names: Vec<_> = out.pdfs.iter().map(|p| p.unique_name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec!["20240517094103-scan-1.pdf", "20240517094103-scan-2.pdf"]
        );
    }

    #[tokio::test]
    async fn unsupported_files_are_dropped_silently() {
        let files = vec![
            SourceFile::new("setup.exe", b"MZ".to_vec()),
            SourceFile::new("ok.pdf", b"%PDF".to_vec()),
        ];
        let out = collect_with_config(files, ts(), &NormalizeConfig::default()).await;
        assert_eq!(out.pdfs.len(), 1);
        assert_eq!(out.stats.dropped, 1);
        assert_eq!(out.stats.completed, out.stats.dispatched);
    }

    #[tokio::test]
    async fn depth_limit_stops_expansion() {
        let config = NormalizeConfig::builder().max_depth(0).build().unwrap();
        let files = vec![SourceFile::unnamed(b"Subject: x\r\n\r\nbody".to_vec())];
        let out = collect_with_config(files, ts(), &config).await;
        assert!(out.pdfs.is_empty());
        assert_eq!(out.stats.depth_exceeded, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unvalidated_zero_office_concurrency_still_finishes() {
        let config = NormalizeConfig {
            office_command: "true".into(),
            office_concurrency: Some(0),
            ..NormalizeConfig::default()
        };
        let files = vec![SourceFile::new("a.txt", b"hello".to_vec())];
        let out = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            collect_with_config(files, ts(), &config),
        )
        .await
        .expect("batch must not wait on an empty semaphore");
        assert_eq!(out.stats.failed, 1);
        assert_eq!(out.stats.completed, out.stats.dispatched);
    }

    #[tokio::test]
    async fn write_outputs_creates_files_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let pdfs = vec![CanonicalPdf {
            unique_name: "20240517094103-a-1.pdf".into(),
            source_name: Some("a.pdf".into()),
            bytes: b"%PDF-a".to_vec(),
        }];
        let manifest = write_outputs(&pdfs, dir.path()).await.unwrap();

        let written = std::fs::read(dir.path().join("20240517094103-a-1.pdf")).unwrap();
        assert_eq!(written, b"%PDF-a");

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(manifest).unwrap()).unwrap();
        assert_eq!(json[0]["source_name"], "a.pdf");
        assert_eq!(json[0]["size"], 6);
    }

    #[test]
    fn collect_sync_runs_outside_runtime() {
        let out = collect_sync(
            vec![SourceFile::new("a.pdf", b"%PDF".to_vec())],
            ts(),
            &NormalizeConfig::default(),
        )
        .unwrap();
        assert_eq!(out.pdfs.len(), 1);
    }
}
