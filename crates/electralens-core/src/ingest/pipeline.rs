use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::config::IngestConfig;
use super::dedup::dedupe;
use super::extractor::{ExtractionStrategy, TableExtractor};
use super::importer::{ImportSummary, MergeImporter, VoterStore};
use super::loader::LoadError;
use super::normalizer::RowNormalizer;
use crate::voter::NormalizedRecord;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unreadable document: {0}")]
    Input(#[from] LoadError),
    #[error("Store error: {0}")]
    Store(#[from] crate::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IngestError {
    /// Whether the caller supplied a document that could not be read, as
    /// opposed to a failure on the server side.
    #[must_use]
    pub fn is_input_failure(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported,
    /// The document loaded but no strategy found any rows.
    NoData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub id: Uuid,
    pub file_name: String,
    pub strategy: Option<ExtractionStrategy>,
    pub raw_rows: usize,
    pub unique_rows: usize,
    pub summary: ImportSummary,
    pub outcome: ImportOutcome,
    pub imported_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ImportReport {
    fn new(file_name: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            file_name,
            strategy: None,
            raw_rows: 0,
            unique_rows: 0,
            summary: ImportSummary::default(),
            outcome: ImportOutcome::NoData,
            imported_at: Utc::now(),
            duration_ms: 0,
        }
    }

    #[must_use]
    pub fn is_no_data(&self) -> bool {
        self.outcome == ImportOutcome::NoData
    }
}

struct Extracted {
    strategy: Option<ExtractionStrategy>,
    raw_rows: usize,
    records: Vec<NormalizedRecord>,
}

pub struct IngestPipeline {
    extractor: Arc<TableExtractor>,
    normalizer: Arc<RowNormalizer>,
    importer: MergeImporter,
}

impl IngestPipeline {
    #[must_use]
    pub fn new(config: &IngestConfig) -> Self {
        let normalizer = RowNormalizer::default();

        let extractor = config
            .strategies
            .iter()
            .fold(TableExtractor::new(), |extractor, strategy| {
                extractor.with_strategy(strategy.build(normalizer.aliases()))
            });

        Self {
            extractor: Arc::new(extractor),
            normalizer: Arc::new(normalizer),
            importer: MergeImporter::new().with_unknown_name(config.unknown_name.clone()),
        }
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: TableExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: RowNormalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    #[must_use]
    pub fn strategies(&self) -> Vec<ExtractionStrategy> {
        self.extractor.strategies()
    }

    pub async fn ingest_file(&self, path: &Path, store: &dyn VoterStore) -> IngestResult<ImportReport> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .unwrap_or_default();

        self.ingest_path(path.to_path_buf(), file_name, store).await
    }

    /// Stages `data` in a temporary file named after `file_name`'s extension
    /// and ingests it. The file is removed when this returns.
    pub async fn ingest_bytes(
        &self,
        data: &[u8],
        file_name: &str,
        store: &dyn VoterStore,
    ) -> IngestResult<ImportReport> {
        let suffix = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map_or_else(|| ".pdf".to_string(), |e| format!(".{e}"));

        let staged = tempfile::Builder::new()
            .prefix("electralens-upload-")
            .suffix(&suffix)
            .tempfile()?;

        tokio::fs::write(staged.path(), data).await?;

        tracing::debug!(
            "Staged {} ({} bytes) at {}",
            file_name,
            data.len(),
            staged.path().display()
        );

        self.ingest_path(staged.path().to_path_buf(), file_name.to_string(), store)
            .await
    }

    async fn ingest_path(
        &self,
        path: PathBuf,
        file_name: String,
        store: &dyn VoterStore,
    ) -> IngestResult<ImportReport> {
        let start = Instant::now();
        let mut report = ImportReport::new(file_name);

        let extractor = Arc::clone(&self.extractor);
        let normalizer = Arc::clone(&self.normalizer);

        let extracted = tokio::task::spawn_blocking(move || -> Result<Extracted, LoadError> {
            let rows = extractor.extract(&path)?;
            let strategy = rows.strategy();
            let mut raw_rows = 0;

            let records = rows
                .inspect(|_| raw_rows += 1)
                .map(|row| normalizer.normalize(&row))
                .collect();

            Ok(Extracted {
                strategy,
                raw_rows,
                records,
            })
        })
        .await??;

        report.strategy = extracted.strategy;
        report.raw_rows = extracted.raw_rows;

        if extracted.raw_rows == 0 {
            report.duration_ms = elapsed_ms(start);
            tracing::info!("No data found in {}", report.file_name);
            return Ok(report);
        }

        let unique = dedupe(extracted.records);
        report.unique_rows = unique.len();

        report.summary = self.importer.merge(unique, store).await?;
        report.outcome = ImportOutcome::Imported;
        report.duration_ms = elapsed_ms(start);

        tracing::info!(
            "Imported {}: {} raw rows, {} unique, {} inserted, {} skipped in {}ms",
            report.file_name,
            report.raw_rows,
            report.unique_rows,
            report.summary.inserted,
            report.summary.duplicates_skipped,
            report.duration_ms
        );

        Ok(report)
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Storage;

    const ROLL: &str = "\
Name        Age   Gender   Constituency   Booth No   Address
Asha Rao    32    F        Hebbal         12         3 Palace Rd
Imran Ali   45    M        Hebbal         12         7 Bellary Rd
ASHA RAO    32    F        HEBBAL         12         3 Palace Rd
";

    #[tokio::test]
    async fn test_ingest_bytes_reports_counts() {
        let storage = Storage::open_memory().await.unwrap();
        let pipeline = IngestPipeline::default();

        let report = pipeline
            .ingest_bytes(ROLL.as_bytes(), "ward-5.txt", &storage)
            .await
            .unwrap();

        assert_eq!(report.file_name, "ward-5.txt");
        assert_eq!(report.outcome, ImportOutcome::Imported);
        assert_eq!(report.strategy, Some(ExtractionStrategy::Lattice));
        assert_eq!(report.raw_rows, 3);
        assert_eq!(report.unique_rows, 2);
        assert_eq!(report.summary.inserted, 2);
        assert_eq!(storage.count_voters().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_document_without_rows_is_no_data() {
        let storage = Storage::open_memory().await.unwrap();

        let report = IngestPipeline::default()
            .ingest_bytes(b"Notice of revision\nNothing tabular here.\n", "notice.txt", &storage)
            .await
            .unwrap();

        assert!(report.is_no_data());
        assert_eq!(report.strategy, None);
        assert_eq!(report.summary, ImportSummary::default());
    }

    #[tokio::test]
    async fn test_unreadable_document_is_input_failure() {
        let storage = Storage::open_memory().await.unwrap();

        let err = IngestPipeline::default()
            .ingest_bytes(b"%PDF-1.7 truncated", "roll.pdf", &storage)
            .await
            .unwrap_err();

        assert!(err.is_input_failure());
    }

    #[tokio::test]
    async fn test_missing_extension_defaults_to_pdf() {
        let storage = Storage::open_memory().await.unwrap();

        let err = IngestPipeline::default()
            .ingest_bytes(b"not a pdf at all", "upload", &storage)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Input(LoadError::Pdf(_))));
    }

    #[tokio::test]
    async fn test_config_sentinel_reaches_store() {
        let storage = Storage::open_memory().await.unwrap();
        let config = IngestConfig::default().with_unknown_name("-");
        let roll = "| Name | Constituency | Booth |\n|      | Hebbal       | 4     |\n";

        let report = IngestPipeline::new(&config)
            .ingest_bytes(roll.as_bytes(), "blank.txt", &storage)
            .await
            .unwrap();

        assert_eq!(report.summary.inserted, 1);
        assert!(storage.find_voter("-", "Hebbal", "4").await.unwrap().is_some());
    }

    #[test]
    fn test_strategies_follow_config() {
        let pipeline = IngestPipeline::new(&IngestConfig::default().without_fallback());
        assert_eq!(pipeline.strategies(), vec![ExtractionStrategy::Lattice]);
    }
}
