//! Input documents: loading from disk and local validation.
//!
//! Validation runs before any network call. A document is rejected when it
//! is missing or empty, when its extension is not allow-listed, when a
//! declared content type is not allow-listed, or when it exceeds the
//! configured size cap. Rejections are [`JobError::InvalidInput`].

use crate::config::ClientConfig;
use crate::error::{JobError, OratorError};
use std::path::Path;
use tracing::debug;

/// A document ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    /// Display name; its extension drives type validation.
    pub name: String,
    pub bytes: Vec<u8>,
    /// MIME type as declared by the caller, if known.
    pub content_type: Option<String>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a document from disk, inferring the content type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, OratorError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| OratorError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Loaded {} ({} bytes)", path.display(), bytes.len());

        let content_type = content_type_for(&name).map(str::to_string);
        Ok(Self {
            name,
            bytes,
            content_type,
        })
    }

    /// Like [`DocumentFile::from_path`], but refuses files larger than
    /// `max_bytes` by their metadata, before reading them.
    pub async fn from_path_with_limit(
        path: impl AsRef<Path>,
        max_bytes: u64,
    ) -> Result<Self, OratorError> {
        let path = path.as_ref();
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|source| OratorError::FileRead {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > max_bytes {
            return Err(OratorError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: max_bytes,
            });
        }
        Self::from_path(path).await
    }

    /// Lowercase extension without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// Content type to send on upload: declared, inferred, or octet-stream.
    pub fn effective_content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .or_else(|| content_type_for(&self.name))
            .unwrap_or("application/octet-stream")
    }
}

/// MIME type for the two supported document formats.
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "epub" => Some("application/epub+zip"),
        _ => None,
    }
}

/// Check a document against the configured allow-lists and size cap.
pub fn validate_document(
    file: Option<&DocumentFile>,
    config: &ClientConfig,
) -> Result<(), JobError> {
    let invalid = |reason: String| JobError::InvalidInput { reason };

    let file = file.ok_or_else(|| invalid("no file selected".into()))?;

    let ext = file.extension().unwrap_or_default();
    if !config.allowed_extensions.iter().any(|a| *a == ext) {
        return Err(invalid(format!(
            "unsupported file type '{}' (allowed: {})",
            file.name,
            config.allowed_extensions.join(", ")
        )));
    }

    if let Some(ct) = &file.content_type {
        let ct = ct.split(';').next().unwrap_or_default().trim();
        if !config
            .allowed_content_types
            .iter()
            .any(|a| a.eq_ignore_ascii_case(ct))
        {
            return Err(invalid(format!("unsupported content type '{ct}'")));
        }
    }

    if file.bytes.is_empty() {
        return Err(invalid(format!("'{}' is empty", file.name)));
    }

    let size = file.bytes.len() as u64;
    if size > config.max_file_size_bytes {
        return Err(invalid(format!(
            "'{}' is {} bytes, larger than the {} byte limit",
            file.name, size, config.max_file_size_bytes
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn reason(r: Result<(), JobError>) -> String {
        match r {
            Err(JobError::InvalidInput { reason }) => reason,
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn accepts_pdf_and_epub() {
        let cfg = ClientConfig::default();
        let pdf = DocumentFile::new("Book.PDF", b"%PDF-1.7".to_vec());
        let epub = DocumentFile::new("novel.epub", b"PK\x03\x04".to_vec())
            .with_content_type("application/epub+zip");
        assert!(validate_document(Some(&pdf), &cfg).is_ok());
        assert!(validate_document(Some(&epub), &cfg).is_ok());
    }

    #[test]
    fn rejects_missing_file() {
        let cfg = ClientConfig::default();
        assert!(reason(validate_document(None, &cfg)).contains("no file"));
    }

    #[test]
    fn rejects_disallowed_extension() {
        let cfg = ClientConfig::default();
        let txt = DocumentFile::new("notes.txt", b"hello".to_vec());
        assert!(reason(validate_document(Some(&txt), &cfg)).contains("notes.txt"));
        let bare = DocumentFile::new("README", b"hello".to_vec());
        assert!(validate_document(Some(&bare), &cfg).is_err());
    }

    #[test]
    fn rejects_disallowed_content_type() {
        let cfg = ClientConfig::default();
        let f = DocumentFile::new("book.pdf", b"%PDF".to_vec()).with_content_type("text/html");
        assert!(reason(validate_document(Some(&f), &cfg)).contains("text/html"));
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        let cfg = ClientConfig::default();
        let f = DocumentFile::new("book.pdf", b"%PDF".to_vec())
            .with_content_type("Application/PDF; charset=binary");
        assert!(validate_document(Some(&f), &cfg).is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        let cfg = ClientConfig::builder().max_file_size_bytes(4).build().unwrap();
        let empty = DocumentFile::new("a.pdf", Vec::new());
        assert!(reason(validate_document(Some(&empty), &cfg)).contains("empty"));
        let big = DocumentFile::new("a.pdf", vec![0u8; 5]);
        assert!(reason(validate_document(Some(&big), &cfg)).contains("limit"));
    }

    #[test]
    fn effective_content_type_falls_back() {
        assert_eq!(
            DocumentFile::new("x.epub", vec![1]).effective_content_type(),
            "application/epub+zip"
        );
        assert_eq!(
            DocumentFile::new("x.bin", vec![1]).effective_content_type(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn from_path_reads_name_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapter.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.4 test").unwrap();

        let doc = DocumentFile::from_path(&path).await.unwrap();
        assert_eq!(doc.name, "chapter.pdf");
        assert_eq!(doc.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(doc.bytes, b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn from_path_with_limit_rejects_oversized_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.pdf");
        std::fs::write(&path, vec![b'x'; 64]).unwrap();

        let err = DocumentFile::from_path_with_limit(&path, 16).await.unwrap_err();
        assert!(
            matches!(err, OratorError::FileTooLarge { size: 64, limit: 16, .. }),
            "got: {err:?}"
        );

        let doc = DocumentFile::from_path_with_limit(&path, 64).await.unwrap();
        assert_eq!(doc.bytes.len(), 64);
    }

    #[tokio::test]
    async fn from_path_with_limit_missing_file() {
        let err = DocumentFile::from_path_with_limit("/definitely/not/here.pdf", 16)
            .await
            .unwrap_err();
        assert!(matches!(err, OratorError::FileRead { .. }));
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = DocumentFile::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, OratorError::FileRead { .. }));
    }
}
