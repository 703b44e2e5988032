use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::layout;

/// Page separator used by text exports such as `pdftotext -layout`.
pub const PAGE_BREAK: char = '\x0c';

/// Why a document could not be turned into page text.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unreadable PDF: {0}")]
    Pdf(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
}

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    /// Case-insensitive match on the file extension, without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn from_magic(data: &[u8]) -> Option<Self> {
        data.starts_with(b"%PDF").then_some(Self::Pdf)
    }

    /// Magic bytes win over the file name, so a PDF saved as `.txt` still
    /// goes through the PDF reader.
    pub fn detect(path: &Path, data: &[u8]) -> LoadResult<Self> {
        if let Some(format) = Self::from_magic(data) {
            return Ok(format);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| LoadError::UnsupportedFormat("no extension".into()))?;

        Self::from_extension(ext).ok_or_else(|| LoadError::UnsupportedFormat(ext.into()))
    }
}

/// A document reduced to the text of each page, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedDocument {
    pub format: DocumentFormat,
    pub pages: Vec<String>,
}

impl PagedDocument {
    #[must_use]
    pub fn new(format: DocumentFormat, pages: Vec<String>) -> Self {
        Self { format, pages }
    }

    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::new(
            DocumentFormat::PlainText,
            text.split(PAGE_BREAK).map(String::from).collect(),
        )
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Reads raw document bytes into page text.
pub trait DocumentLoader: Send + Sync {
    fn supported_formats(&self) -> &[DocumentFormat];

    fn can_load(&self, format: DocumentFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    fn load_bytes(&self, data: &[u8], format: DocumentFormat) -> LoadResult<PagedDocument>;

    /// Reads `path`, detects its format and loads it. Fails with
    /// [`LoadError::UnsupportedFormat`] when this loader cannot handle it.
    fn load_file(&self, path: &Path) -> LoadResult<PagedDocument> {
        let data = std::fs::read(path)?;
        let format = DocumentFormat::detect(path, &data)?;

        if !self.can_load(format) {
            return Err(LoadError::UnsupportedFormat(format!("{format:?}")));
        }

        self.load_bytes(&data, format)
    }
}

/// UTF-8 text, pages split on form feed.
pub struct PlainTextLoader;

impl PlainTextLoader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for PlainTextLoader {
    fn supported_formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::PlainText]
    }

    fn load_bytes(&self, data: &[u8], _format: DocumentFormat) -> LoadResult<PagedDocument> {
        let text = std::str::from_utf8(data).map_err(|e| LoadError::Encoding(e.to_string()))?;
        Ok(PagedDocument::from_text(text))
    }
}

/// PDF pages rendered from positioned text, so that table cells keep their
/// columns. Pages without positioned text fall back to `lopdf`'s plain text
/// extraction.
pub struct PdfLoader;

impl PdfLoader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for PdfLoader {
    fn supported_formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Pdf]
    }

    fn load_bytes(&self, data: &[u8], _format: DocumentFormat) -> LoadResult<PagedDocument> {
        let document =
            lopdf::Document::load_mem(data).map_err(|e| LoadError::Pdf(e.to_string()))?;

        let pages = document
            .get_pages()
            .into_iter()
            .map(|(page_number, page_id)| page_text(&document, page_number, page_id))
            .collect();

        Ok(PagedDocument::new(DocumentFormat::Pdf, pages))
    }
}

fn page_text(document: &lopdf::Document, page_number: u32, page_id: lopdf::ObjectId) -> String {
    match layout::page_boxes(document, page_id) {
        Ok(boxes) if !boxes.is_empty() => return layout::render_page(&boxes),
        Ok(_) => tracing::debug!("Page {} has no positioned text", page_number),
        Err(e) => tracing::debug!("Page {} layout unreadable: {}", page_number, e),
    }

    match document.extract_text(&[page_number]) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Skipping text of page {}: {}", page_number, e);
            String::new()
        }
    }
}

/// Dispatches to the first registered loader that handles the format.
pub struct CompositeLoader {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl CompositeLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Box<dyn DocumentLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    fn find_loader(&self, format: DocumentFormat) -> Option<&dyn DocumentLoader> {
        self.loaders.iter().find(|l| l.can_load(format)).map(|l| l.as_ref())
    }
}

impl Default for CompositeLoader {
    fn default() -> Self {
        Self::new()
            .with_loader(Box::new(PdfLoader::new()))
            .with_loader(Box::new(PlainTextLoader::new()))
    }
}

impl DocumentLoader for CompositeLoader {
    fn supported_formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Pdf, DocumentFormat::PlainText]
    }

    fn can_load(&self, format: DocumentFormat) -> bool {
        self.find_loader(format).is_some()
    }

    fn load_bytes(&self, data: &[u8], format: DocumentFormat) -> LoadResult<PagedDocument> {
        let loader = self
            .find_loader(format)
            .ok_or_else(|| LoadError::UnsupportedFormat(format!("{format:?}")))?;

        loader.load_bytes(data, format)
    }
}
