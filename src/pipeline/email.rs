//! Raw email container → attachment files.
//!
//! Only parts whose `Content-Disposition` is `attachment` are kept. Bodies,
//! alternatives and inline images (signatures, logos) are skipped even when
//! they carry a filename.

use crate::error::FileError;
use crate::output::SourceFile;
use mailparse::{DispositionType, ParsedMail};
use tracing::warn;

/// Parse `bytes` as a MIME message and return its attachments.
pub fn attachments(bytes: &[u8]) -> Result<Vec<SourceFile>, FileError> {
    let mail = mailparse::parse_mail(bytes).map_err(|e| FileError::Decode {
        detail: format!("MIME parse failed: {e}"),
    })?;

    let mut files = Vec::new();
    walk(&mail, &mut files);
    Ok(files)
}

fn walk(part: &ParsedMail<'_>, files: &mut Vec<SourceFile>) {
    let disposition = part.get_content_disposition();
    if disposition.disposition == DispositionType::Attachment {
        let name = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned();

        match part.get_body_raw() {
            Ok(bytes) => files.push(SourceFile { name, bytes }),
            Err(e) => warn!(
                "Skipping attachment {:?}: payload decode failed: {}",
                name, e
            ),
        }
        return;
    }

    for sub in &part.subparts {
        walk(sub, files);
    }
}
