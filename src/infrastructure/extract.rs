use std::path::Path;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::{DomainError, Metadata};

pub const MAX_DOCUMENT_BYTES: usize = 50 * 1024 * 1024;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    PlainText,
    Pdf,
    // Recognized extension without a wired extractor in this build.
    Unavailable(&'static str),
}

struct FileType {
    extension: &'static str,
    mime: &'static str,
    strategy: Strategy,
    is_image: bool,
}

const FILE_TYPES: &[FileType] = &[
    FileType { extension: ".txt", mime: "text/plain", strategy: Strategy::PlainText, is_image: false },
    FileType { extension: ".md", mime: "text/markdown", strategy: Strategy::PlainText, is_image: false },
    FileType { extension: ".csv", mime: "text/csv", strategy: Strategy::PlainText, is_image: false },
    FileType { extension: ".pdf", mime: "application/pdf", strategy: Strategy::Pdf, is_image: false },
    FileType { extension: ".docx", mime: "application/vnd.openxmlformats-officedocument.wordprocessingml.document", strategy: Strategy::Unavailable("DOCX parsing"), is_image: false },
    FileType { extension: ".xlsx", mime: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", strategy: Strategy::Unavailable("spreadsheet parsing"), is_image: false },
    FileType { extension: ".pptx", mime: "application/vnd.openxmlformats-officedocument.presentationml.presentation", strategy: Strategy::Unavailable("presentation parsing"), is_image: false },
    FileType { extension: ".png", mime: "image/png", strategy: Strategy::Unavailable("image OCR"), is_image: true },
    FileType { extension: ".jpg", mime: "image/jpeg", strategy: Strategy::Unavailable("image OCR"), is_image: true },
    FileType { extension: ".jpeg", mime: "image/jpeg", strategy: Strategy::Unavailable("image OCR"), is_image: true },
    FileType { extension: ".gif", mime: "image/gif", strategy: Strategy::Unavailable("image OCR"), is_image: true },
    FileType { extension: ".bmp", mime: "image/bmp", strategy: Strategy::Unavailable("image OCR"), is_image: true },
    FileType { extension: ".tiff", mime: "image/tiff", strategy: Strategy::Unavailable("image OCR"), is_image: true },
];

#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileProcessor;

impl FileProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn supported_extensions(&self) -> Vec<&'static str> {
        FILE_TYPES.iter().map(|t| t.extension).collect()
    }

    pub fn supported_mime_types(&self) -> Vec<&'static str> {
        FILE_TYPES.iter().map(|t| t.mime).collect()
    }

    // Extensions whose extractor is actually wired in this build.
    pub fn available_extensions(&self) -> Vec<&'static str> {
        FILE_TYPES
            .iter()
            .filter(|t| !matches!(t.strategy, Strategy::Unavailable(_)))
            .map(|t| t.extension)
            .collect()
    }

    pub fn is_supported(&self, filename: &str) -> bool {
        self.file_type(filename).is_some()
    }

    fn file_type(&self, filename: &str) -> Option<&'static FileType> {
        let extension = Path::new(filename).extension()?.to_str()?.to_lowercase();
        let dotted = format!(".{extension}");
        FILE_TYPES.iter().find(|t| t.extension == dotted)
    }

    pub fn validate(&self, filename: &str, file_size: usize) -> Result<(), DomainError> {
        let file_type = self.file_type(filename).ok_or_else(|| {
            DomainError::validation(format!(
                "Unsupported file type for '{filename}'. Supported types: {}",
                self.supported_extensions().join(", ")
            ))
        })?;

        let max_bytes = if file_type.is_image {
            MAX_IMAGE_BYTES
        } else {
            MAX_DOCUMENT_BYTES
        };
        if file_size > max_bytes {
            return Err(DomainError::validation(format!(
                "File '{filename}' too large. Size: {file_size} bytes, Max: {max_bytes} bytes"
            )));
        }

        Ok(())
    }

    pub fn process(&self, filename: &str, bytes: &[u8]) -> Result<ExtractedFile, DomainError> {
        self.validate(filename, bytes.len())?;
        let file_type = self
            .file_type(filename)
            .ok_or_else(|| DomainError::validation(format!("Unsupported file type for '{filename}'")))?;

        let (content, method) = match file_type.strategy {
            Strategy::PlainText => (extract_plain_text(filename, bytes)?, "text"),
            Strategy::Pdf => (extract_pdf_text(filename, bytes)?, "pdf"),
            Strategy::Unavailable(capability) => {
                warn!(filename, capability, "extractor not available in this build");
                return Err(DomainError::validation(format!(
                    "Failed to process document '{filename}': {capability} is not available in this build"
                )));
            }
        };

        debug!(
            filename,
            bytes = bytes.len(),
            text_length = content.len(),
            method,
            "file processed"
        );

        let mut metadata = Metadata::new();
        metadata.insert("filename".into(), filename.into());
        metadata.insert("file_type".into(), detected_mime(filename).into());
        metadata.insert("file_size".into(), bytes.len().into());
        metadata.insert("text_length".into(), content.len().into());
        metadata.insert("extraction_method".into(), method.into());
        metadata.insert("processed_at".into(), Utc::now().to_rfc3339().into());

        Ok(ExtractedFile { content, metadata })
    }
}

fn detected_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

fn extract_plain_text(filename: &str, bytes: &[u8]) -> Result<String, DomainError> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        DomainError::validation(format!(
            "Failed to process document '{filename}': file is not valid UTF-8"
        ))
    })?;
    Ok(text.trim().to_string())
}

fn extract_pdf_text(filename: &str, bytes: &[u8]) -> Result<String, DomainError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        DomainError::validation(format!("Failed to process document '{filename}': {e}"))
    })?;
    Ok(normalize_whitespace(&text))
}

/// PDF extraction tends to leave runs of spaces and blank lines behind;
/// collapse them while keeping paragraph breaks.
fn normalize_whitespace(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.replace('\r', "").lines() {
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !normalized.is_empty() {
            normalized.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        blank_run = 0;

        let mut prev_space = false;
        for c in line.chars() {
            if c == ' ' {
                if !prev_space {
                    normalized.push(c);
                }
                prev_space = true;
            } else {
                normalized.push(c);
                prev_space = false;
            }
        }
    }

    normalized
}
