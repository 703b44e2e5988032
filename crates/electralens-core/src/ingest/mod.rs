mod config;
mod dedup;
mod extractor;
mod importer;
mod layout;
mod loader;
mod normalizer;
mod pipeline;
mod tables;

pub use config::IngestConfig;
pub use dedup::{dedupe, BatchDeduplicator};
pub use extractor::{
    ExtractedRows, ExtractionError, ExtractionResult, ExtractionStrategy, RawRow, RowIter,
    TableExtractor, TableStrategy,
};
pub use importer::{ImportSummary, MergeImporter, VoterStore};
pub use layout::{page_boxes, render_page, TextBox};
pub use loader::{
    CompositeLoader, DocumentFormat, DocumentLoader, LoadError, LoadResult, PagedDocument,
    PdfLoader, PlainTextLoader, PAGE_BREAK,
};
pub use normalizer::{normalize, parse_age, Field, HeaderAlias, HeaderAliases, RowNormalizer};
pub use pipeline::{ImportOutcome, ImportReport, IngestError, IngestPipeline, IngestResult};
pub use tables::{normalize_header_label, LatticeStrategy, StreamStrategy};
