//! Archive → member files.
//!
//! Zip archives are unpacked in-process with the `zip` crate. Everything
//! else (rar) goes through the configured external extractor. Either way
//! the archive and its extracted tree live in a per-call temp directory, and
//! the tree is flattened: every regular file at any depth becomes one
//! [`SourceFile`] named by its base filename.

use crate::config::{NormalizeConfig, ARCHIVE_PLACEHOLDER, OUTDIR_PLACEHOLDER};
use crate::error::FileError;
use crate::naming::sanitize;
use crate::output::SourceFile;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

/// Extract `bytes` (an archive called `filename`) into its member files.
///
/// Members come back sorted by path so nested ordinals are reproducible.
/// Any failure returns an error and no members at all.
pub async fn extract_archive(
    bytes: &[u8],
    filename: &str,
    config: &NormalizeConfig,
) -> Result<Vec<SourceFile>, FileError> {
    let temp_dir = tempfile::Builder::new()
        .prefix("docnorm-archive-")
        .tempdir()?;

    let archive_path = temp_dir.path().join(temp_name(filename));
    let out_dir = temp_dir.path().join("extracted");
    tokio::fs::write(&archive_path, bytes).await?;
    tokio::fs::create_dir(&out_dir).await?;

    if is_zip(filename) {
        let (archive, out) = (archive_path.clone(), out_dir.clone());
        tokio::task::spawn_blocking(move || extract_zip(&archive, &out))
            .await
            .map_err(|e| FileError::Archive {
                detail: format!("zip task panicked: {e}"),
            })??;
    } else {
        run_extractor(config, &archive_path, &out_dir).await?;
    }

    let root = out_dir.clone();
    let members = tokio::task::spawn_blocking(move || read_tree(&root))
        .await
        .map_err(|e| FileError::Archive {
            detail: format!("walk task panicked: {e}"),
        })??;

    debug!("Extracted {} members from {}", members.len(), filename);
    Ok(members)
}

fn is_zip(filename: &str) -> bool {
    filename.ends_with(".zip")
}

fn temp_name(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let s = sanitize(&base);
    if s.is_empty() || s.chars().all(|c| c == '.') {
        "archive".to_string()
    } else {
        s
    }
}

fn extract_zip(archive: &Path, out_dir: &Path) -> Result<(), FileError> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| FileError::Archive {
        detail: e.to_string(),
    })?;
    zip.extract(out_dir).map_err(|e| FileError::Archive {
        detail: e.to_string(),
    })
}

/// Expand the argument template for one extraction.
fn extractor_args(template: &[String], archive: &Path, out_dir: &Path) -> Vec<String> {
    let archive = archive.to_string_lossy();
    let out_dir = out_dir.to_string_lossy();
    template
        .iter()
        .map(|arg| {
            arg.replace(OUTDIR_PLACEHOLDER, &out_dir)
                .replace(ARCHIVE_PLACEHOLDER, &archive)
        })
        .collect()
}

async fn run_extractor(
    config: &NormalizeConfig,
    archive: &Path,
    out_dir: &Path,
) -> Result<(), FileError> {
    let args = extractor_args(&config.archive_args, archive, out_dir);
    debug!("Running {} {:?}", config.archive_command, args);

    let output = Command::new(&config.archive_command)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| FileError::Archive {
            detail: format!("failed to run '{}': {e}", config.archive_command),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FileError::Archive {
            detail: format!(
                "'{}' exited with {}: {}",
                config.archive_command,
                output.status,
                stderr.trim()
            ),
        });
    }
    Ok(())
}

/// Read every regular file below `root`, discarding directory structure.
fn read_tree(root: &Path) -> Result<Vec<SourceFile>, FileError> {
    let mut members = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| FileError::Archive {
            detail: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let bytes = std::fs::read(entry.path())?;
        members.push(SourceFile::new(name, bytes));
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, FileOptions::default())
                .expect("start_file");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[tokio::test]
    async fn zip_members_are_flattened_and_sorted() {
        let zip = build_zip(&[
            ("invoices/2024/b.pdf", &b"%PDF-b"[..]),
            ("a.txt", &b"hello"[..]),
            ("invoices/c.png", &b"png?"[..]),
        ]);
        let members = extract_archive(&zip, "bundle.zip", &NormalizeConfig::default())
            .await
            .unwrap();

        let names: Vec<_> = members.iter().map(|m| m.display_name()).collect();
        assert_eq!(names, vec!["a.txt", "b.pdf", "c.png"]);
        assert_eq!(members[1].bytes, b"%PDF-b");
    }

    #[tokio::test]
    async fn corrupt_zip_is_archive_error() {
        let err = extract_archive(b"PK\x03\x04 not really", "bad.zip", &NormalizeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::Archive { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_extractor_is_archive_error() {
        let config = NormalizeConfig::builder()
            .archive_command("/nonexistent/7z")
            .build()
            .unwrap();
        let err = extract_archive(b"Rar!\x1a\x07\x00", "scan.rar", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::Archive { ref detail } if detail.contains("/nonexistent/7z")));
    }

    #[test]
    fn template_substitution() {
        let template = vec![
            "x".to_string(),
            "-y".to_string(),
            "-o{outdir}".to_string(),
            "{archive}".to_string(),
        ];
        let args = extractor_args(&template, Path::new("/tmp/a.rar"), Path::new("/tmp/out"));
        assert_eq!(args, vec!["x", "-y", "-o/tmp/out", "/tmp/a.rar"]);
    }

    #[test]
    fn temp_name_strips_directories() {
        assert_eq!(temp_name("../../etc/evil.rar"), "evil.rar");
        assert_eq!(temp_name("my scans.zip"), "my_scans.zip");
        assert_eq!(temp_name(""), "archive");
    }
}
