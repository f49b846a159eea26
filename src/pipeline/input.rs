//! Input validation: paths and uploaded bytes.
//!
//! pdfium requires a file-system path, so uploads are written to a managed
//! tempfile by the caller; this module only answers "is this a PDF we can
//! hand to pdfium at all?". Validating the `%PDF` magic up front gives
//! callers a meaningful error instead of a pdfium parse failure.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ParseError;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Validate a local PDF path: exists, readable, starts with `%PDF`.
pub fn resolve_pdf_path(path: &Path) -> Result<PathBuf, ParseError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(ParseError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
                return Err(ParseError::NotAPdf {
                    name: path.display().to_string(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ParseError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ParseError::FileNotFound { path });
        }
    }

    debug!("resolved local PDF: {}", path.display());
    Ok(path)
}

/// Validate uploaded bytes before writing them anywhere.
pub fn validate_pdf_bytes(name: &str, bytes: &[u8]) -> Result<(), ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyUpload {
            name: name.to_string(),
        });
    }
    if bytes.len() < 4 || &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ParseError::NotAPdf {
            name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rejects_missing_file() {
        let err = resolve_pdf_path(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ParseError::FileNotFound { .. }));
    }

    #[test]
    fn rejects_non_pdf_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"<html>not a pdf</html>").unwrap();
        let err = resolve_pdf_path(tmp.path()).unwrap_err();
        assert!(matches!(err, ParseError::NotAPdf { .. }));
    }

    #[test]
    fn accepts_pdf_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n%fake body").unwrap();
        assert!(resolve_pdf_path(tmp.path()).is_ok());
    }

    #[test]
    fn validates_upload_bytes() {
        assert!(validate_pdf_bytes("doc.pdf", b"%PDF-1.4 ...").is_ok());
        assert!(matches!(
            validate_pdf_bytes("doc.pdf", b""),
            Err(ParseError::EmptyUpload { .. })
        ));
        assert!(matches!(
            validate_pdf_bytes("doc.pdf", b"GIF89a"),
            Err(ParseError::NotAPdf { .. })
        ));
        assert!(matches!(
            validate_pdf_bytes("doc.pdf", b"%P"),
            Err(ParseError::NotAPdf { .. })
        ));
    }
}
