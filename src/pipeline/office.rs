//! Office document → PDF via an external headless converter.
//!
//! Every call gets its own [`tempfile::TempDir`], so concurrent conversions never see
//! each other's input or output files. The directory is removed when the
//! guard drops, on success, on failure, and on early return alike.

use crate::error::FileError;
use crate::naming::sanitize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Convert `bytes` (named `<stem><ext>`) to PDF with `command`.
///
/// The converter is invoked as
/// `<command> --headless --convert-to pdf --outdir <tmp> <tmp>/<stem><ext>`
/// and must write `<tmp>/<stem>.pdf`.
pub async fn office_to_pdf(
    bytes: &[u8],
    stem: &str,
    ext: &str,
    command: &str,
) -> Result<Vec<u8>, FileError> {
    convert_in(&std::env::temp_dir(), bytes, stem, ext, command).await
}

/// Run one conversion in a fresh directory below `scratch_root`.
async fn convert_in(
    scratch_root: &Path,
    bytes: &[u8],
    stem: &str,
    ext: &str,
    command: &str,
) -> Result<Vec<u8>, FileError> {
    let temp_dir = tempfile::Builder::new()
        .prefix("docnorm-office-")
        .tempdir_in(scratch_root)?;

    let stem = temp_stem(stem);
    let input_path = temp_dir.path().join(format!("{stem}{ext}"));
    let output_path = temp_dir.path().join(format!("{stem}.pdf"));
    tokio::fs::write(&input_path, bytes).await?;

    debug!("Running {} on {}", command, input_path.display());
    let output = Command::new(command)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(temp_dir.path())
        .arg(&input_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| FileError::ExternalProcess {
            command: command.to_string(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FileError::ExternalProcess {
            command: command.to_string(),
            detail: format!("{}: {}", output.status, stderr.trim()),
        });
    }

    read_output(&output_path).await
}

/// Keep temp names to a single safe path component.
fn temp_stem(stem: &str) -> String {
    let s = sanitize(stem);
    if s.is_empty() || s.chars().all(|c| c == '.') {
        "document".to_string()
    } else {
        s
    }
}

async fn read_output(output_path: &Path) -> Result<Vec<u8>, FileError> {
    match tokio::fs::read(output_path).await {
        Ok(pdf) => Ok(pdf),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FileError::MissingOutput {
            expected: output_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }),
        Err(e) => Err(e.into()),
    }
}
