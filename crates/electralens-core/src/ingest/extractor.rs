use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::loader::{CompositeLoader, DocumentLoader, LoadResult, PagedDocument};
use super::normalizer::HeaderAliases;
use super::tables::{LatticeStrategy, StreamStrategy};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No header row found")]
    NoHeader,
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// One table row keyed by column label, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `label` to `value`; a repeated label keeps its original position.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();

        match self.cells.iter_mut().find(|(l, _)| *l == label) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((label, value)),
        }
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (label, value) in iter {
            row.insert(label, value);
        }
        row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Per-page detection of ruled or column-aligned tables.
    Lattice,
    /// Whole-document read of a one-cell-per-line table.
    Stream,
}

impl ExtractionStrategy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lattice => "lattice",
            Self::Stream => "stream",
        }
    }

    #[must_use]
    pub fn build(self, aliases: &HeaderAliases) -> Box<dyn TableStrategy> {
        match self {
            Self::Lattice => Box::new(LatticeStrategy::new(aliases.clone())),
            Self::Stream => Box::new(StreamStrategy::new(aliases.clone())),
        }
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows a strategy yields on demand.
pub type RowIter = Box<dyn Iterator<Item = RawRow> + Send>;

pub trait TableStrategy: Send + Sync {
    fn strategy(&self) -> ExtractionStrategy;

    /// Rows of `document`. The iterator may hold the document and read it
    /// as it is advanced.
    fn extract_rows(&self, document: Arc<PagedDocument>) -> ExtractionResult<RowIter>;
}

/// Rows produced by one extraction run. Strategy selection reads only as far
/// as the first row; later rows are produced as the iterator is advanced.
/// Call [`TableExtractor::extract`] again to read the document a second time.
pub struct ExtractedRows {
    rows: RowIter,
    strategy: Option<ExtractionStrategy>,
}

impl ExtractedRows {
    fn new(rows: RowIter, strategy: ExtractionStrategy) -> Self {
        Self {
            rows,
            strategy: Some(strategy),
        }
    }

    fn empty() -> Self {
        Self {
            rows: Box::new(std::iter::empty()),
            strategy: None,
        }
    }

    /// The strategy that produced the rows; `None` when every strategy came
    /// up empty.
    #[must_use]
    pub fn strategy(&self) -> Option<ExtractionStrategy> {
        self.strategy
    }
}

impl Iterator for ExtractedRows {
    type Item = RawRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

/// Runs table strategies in order over a loaded document; the first
/// strategy with a non-empty result wins.
pub struct TableExtractor {
    loader: Box<dyn DocumentLoader>,
    strategies: Vec<Box<dyn TableStrategy>>,
}

impl TableExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(CompositeLoader::default()),
            strategies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Box<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: Box<dyn TableStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn TableStrategy>) {
        self.strategies.push(strategy);
    }

    #[must_use]
    pub fn strategies(&self) -> Vec<ExtractionStrategy> {
        self.strategies.iter().map(|s| s.strategy()).collect()
    }

    /// Loads the document at `path` and extracts its rows. Only an
    /// unreadable document is an error; strategies that fail or find
    /// nothing yield an empty sequence.
    pub fn extract(&self, path: &Path) -> LoadResult<ExtractedRows> {
        let document = self.loader.load_file(path)?;

        tracing::debug!(
            "Loaded {} ({:?}, {} pages)",
            path.display(),
            document.format,
            document.page_count()
        );

        Ok(self.extract_document(document))
    }

    #[must_use]
    pub fn extract_document(&self, document: PagedDocument) -> ExtractedRows {
        let page_count = document.page_count();
        let document = Arc::new(document);

        for strategy in &self.strategies {
            let kind = strategy.strategy();

            match strategy.extract_rows(Arc::clone(&document)) {
                Ok(mut rows) => match rows.next() {
                    Some(first) => {
                        tracing::info!("Extracting rows via {} strategy", kind);
                        return ExtractedRows::new(Box::new(std::iter::once(first).chain(rows)), kind);
                    }
                    None => tracing::debug!("{} strategy found no rows", kind),
                },
                Err(e) => tracing::warn!("{} strategy failed: {}", kind, e),
            }
        }

        tracing::info!("No rows extracted from {} pages", page_count);
        ExtractedRows::empty()
    }
}

impl Default for TableExtractor {
    fn default() -> Self {
        let aliases = HeaderAliases::default();
        Self::new()
            .with_strategy(ExtractionStrategy::Lattice.build(&aliases))
            .with_strategy(ExtractionStrategy::Stream.build(&aliases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::loader::DocumentFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStrategy {
        kind: ExtractionStrategy,
        result: fn() -> ExtractionResult<Vec<RawRow>>,
    }

    impl TableStrategy for FixedStrategy {
        fn strategy(&self) -> ExtractionStrategy {
            self.kind
        }

        fn extract_rows(&self, _document: Arc<PagedDocument>) -> ExtractionResult<RowIter> {
            (self.result)().map(|rows| Box::new(rows.into_iter()) as RowIter)
        }
    }

    /// Yields one row per page and counts the pages it has read.
    struct CountingStrategy {
        pages_read: Arc<AtomicUsize>,
    }

    impl TableStrategy for CountingStrategy {
        fn strategy(&self) -> ExtractionStrategy {
            ExtractionStrategy::Lattice
        }

        fn extract_rows(&self, document: Arc<PagedDocument>) -> ExtractionResult<RowIter> {
            let pages_read = Arc::clone(&self.pages_read);

            Ok(Box::new((0..document.page_count()).map(move |index| {
                pages_read.fetch_add(1, Ordering::SeqCst);
                [("name", document.pages[index].as_str())]
                    .into_iter()
                    .collect::<RawRow>()
            })))
        }
    }

    fn one_row() -> ExtractionResult<Vec<RawRow>> {
        Ok(vec![[("name", "Uma")].into_iter().collect()])
    }

    fn two_rows() -> ExtractionResult<Vec<RawRow>> {
        Ok(vec![
            [("name", "Vijay")].into_iter().collect(),
            [("name", "Zoya")].into_iter().collect(),
        ])
    }

    fn nothing() -> ExtractionResult<Vec<RawRow>> {
        Ok(Vec::new())
    }

    fn broken() -> ExtractionResult<Vec<RawRow>> {
        Err(ExtractionError::NoHeader)
    }

    fn extractor(results: &[(ExtractionStrategy, fn() -> ExtractionResult<Vec<RawRow>>)]) -> TableExtractor {
        results.iter().fold(TableExtractor::new(), |acc, &(kind, result)| {
            acc.with_strategy(Box::new(FixedStrategy { kind, result }))
        })
    }

    fn document() -> PagedDocument {
        PagedDocument::new(DocumentFormat::PlainText, vec![String::new()])
    }

    #[test]
    fn test_raw_row_insert_replaces_in_place() {
        let mut row = RawRow::new();
        row.insert("name", "A");
        row.insert("age", "30");
        row.insert("name", "B");

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some("B"));
        assert_eq!(row.iter().next(), Some(("name", "B")));
    }

    #[test]
    fn test_first_non_empty_strategy_wins() {
        let extractor = extractor(&[
            (ExtractionStrategy::Lattice, one_row),
            (ExtractionStrategy::Stream, two_rows),
        ]);

        let rows = extractor.extract_document(document());
        assert_eq!(rows.strategy(), Some(ExtractionStrategy::Lattice));
        assert_eq!(rows.count(), 1);
    }

    #[test]
    fn test_fallback_after_empty_primary() {
        let extractor = extractor(&[
            (ExtractionStrategy::Lattice, nothing),
            (ExtractionStrategy::Stream, two_rows),
        ]);

        let rows = extractor.extract_document(document());
        assert_eq!(rows.strategy(), Some(ExtractionStrategy::Stream));
        assert_eq!(rows.count(), 2);
    }

    #[test]
    fn test_strategy_errors_degrade_to_empty() {
        let extractor = extractor(&[
            (ExtractionStrategy::Lattice, broken),
            (ExtractionStrategy::Stream, broken),
        ]);

        let rows = extractor.extract_document(document());
        assert_eq!(rows.strategy(), None);
        assert_eq!(rows.count(), 0);
    }

    #[test]
    fn test_error_then_success() {
        let extractor = extractor(&[
            (ExtractionStrategy::Lattice, broken),
            (ExtractionStrategy::Stream, one_row),
        ]);

        assert_eq!(extractor.extract_document(document()).count(), 1);
    }

    #[test]
    fn test_rows_are_read_on_demand() {
        let pages_read = Arc::new(AtomicUsize::new(0));
        let extractor = TableExtractor::new().with_strategy(Box::new(CountingStrategy {
            pages_read: Arc::clone(&pages_read),
        }));
        let document = PagedDocument::new(
            DocumentFormat::PlainText,
            vec!["one".into(), "two".into(), "three".into(), "four".into()],
        );

        let mut rows = extractor.extract_document(document);
        assert_eq!(pages_read.load(Ordering::SeqCst), 1);

        assert_eq!(rows.next().unwrap().get("name"), Some("one"));
        assert_eq!(rows.next().unwrap().get("name"), Some("two"));
        assert_eq!(pages_read.load(Ordering::SeqCst), 2);

        assert_eq!(rows.count(), 2);
        assert_eq!(pages_read.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_default_strategy_order() {
        assert_eq!(
            TableExtractor::default().strategies(),
            vec![ExtractionStrategy::Lattice, ExtractionStrategy::Stream]
        );
    }
}
