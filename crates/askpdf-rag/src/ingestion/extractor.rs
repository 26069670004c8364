//! Document-to-text extraction
//!
//! Extraction is an opaque conversion step: the rest of the pipeline only sees
//! the resulting markdown/plain text.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Trait for converting an uploaded file into markdown text
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract the text of the file at `path`
    async fn extract(&self, path: &Path) -> Result<String>;

    /// Get extractor name for logging
    fn name(&self) -> &str;
}

/// Upper bound on a single PDF extraction; some fonts make pdf-extract spin
const PDF_TIMEOUT: Duration = Duration::from_secs(60);

/// Extractor dispatching on file extension
///
/// - `.md`, `.markdown`, `.txt`: read as UTF-8 (lossy)
/// - `.pdf`: `pdf-extract` (requires the `pdf` feature)
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }

    #[cfg(feature = "pdf")]
    async fn extract_pdf(path: &Path, filename: &str) -> Result<String> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::extraction(filename, e.to_string()))?;

        let task = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data));
        match tokio::time::timeout(PDF_TIMEOUT, task).await {
            Ok(Ok(Ok(text))) => Ok(cleanup_pdf_text(&text)),
            Ok(Ok(Err(e))) => Err(Error::extraction(filename, e.to_string())),
            Ok(Err(e)) => Err(Error::extraction(filename, format!("extraction task failed: {}", e))),
            Err(_) => Err(Error::extraction(
                filename,
                format!("timed out after {:?}", PDF_TIMEOUT),
            )),
        }
    }

    #[cfg(not(feature = "pdf"))]
    async fn extract_pdf(_path: &Path, filename: &str) -> Result<String> {
        let _ = PDF_TIMEOUT;
        Err(Error::extraction(
            filename,
            "PDF support disabled (build with the `pdf` feature)",
        ))
    }
}

#[async_trait]
impl DocumentExtractor for FileExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let text = match extension.as_str() {
            "md" | "markdown" | "txt" | "text" => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| Error::extraction(&filename, e.to_string()))?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            "pdf" => Self::extract_pdf(path, &filename).await?,
            other => {
                return Err(Error::extraction(
                    &filename,
                    format!("unsupported file type: '{}'", other),
                ))
            }
        };

        tracing::info!("Extracted {} characters from {}", text.len(), filename);
        Ok(text)
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Replace typographic glyphs that pdf-extract leaves behind and collapse
/// runs of blank lines into paragraph breaks
pub fn cleanup_pdf_text(text: &str) -> String {
    let replaced = text
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    let mut out = String::with_capacity(replaced.len());
    let mut blank_run = 0;
    for line in replaced.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 && !out.is_empty() {
                out.push('\n');
            }
            continue;
        }
        blank_run = 0;
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}
