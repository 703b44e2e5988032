use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::voter::{NewVoter, NormalizedRecord, Voter, UNKNOWN_NAME};
use crate::Result;

/// Persistence port used by the importer.
#[async_trait]
pub trait VoterStore: Send + Sync {
    /// Exact match on the stored natural key.
    async fn find_by_natural_key(
        &self,
        name: &str,
        constituency: &str,
        booth_no: &str,
    ) -> Result<Option<Voter>>;

    /// Inserts all voters or none of them.
    async fn insert_batch(&self, voters: &[NewVoter]) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub duplicates_skipped: usize,
    pub inserted: usize,
}

impl ImportSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Inserts records the store does not already hold, in one batch.
#[derive(Debug, Clone)]
pub struct MergeImporter {
    unknown_name: String,
}

impl MergeImporter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            unknown_name: UNKNOWN_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_unknown_name(mut self, name: impl Into<String>) -> Self {
        self.unknown_name = name.into();
        self
    }

    #[must_use]
    pub fn unknown_name(&self) -> &str {
        &self.unknown_name
    }

    pub async fn merge(
        &self,
        records: Vec<NormalizedRecord>,
        store: &dyn VoterStore,
    ) -> Result<ImportSummary> {
        let total = records.len();
        let mut staged: Vec<NewVoter> = Vec::with_capacity(total);
        let mut staged_keys: HashSet<(String, String, String)> = HashSet::new();
        let mut duplicates_skipped = 0;

        for record in records {
            // Sentinel first, so a nameless row matches its stored copy.
            let voter = NewVoter::from_record(record, &self.unknown_name);
            let key = (
                voter.name.clone(),
                voter.constituency.clone(),
                voter.booth_no.clone(),
            );

            if staged_keys.contains(&key) {
                duplicates_skipped += 1;
                continue;
            }

            let existing = store
                .find_by_natural_key(&voter.name, &voter.constituency, &voter.booth_no)
                .await?;

            if existing.is_some() {
                tracing::debug!(
                    "Skipping existing voter {} ({} / booth {})",
                    voter.name,
                    voter.constituency,
                    voter.booth_no
                );
                duplicates_skipped += 1;
                continue;
            }

            staged_keys.insert(key);
            staged.push(voter);
        }

        let inserted = if staged.is_empty() {
            0
        } else {
            store.insert_batch(&staged).await?
        };

        tracing::info!(
            "Merged {} records: {} inserted, {} duplicates skipped",
            total,
            inserted,
            duplicates_skipped
        );

        Ok(ImportSummary {
            total,
            duplicates_skipped,
            inserted,
        })
    }
}

impl Default for MergeImporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Storage};

    fn records(n: usize) -> Vec<NormalizedRecord> {
        (0..n)
            .map(|i| {
                NormalizedRecord::new(format!("Voter {i}"), "Malleshwaram", "21")
                    .with_age(20 + i32::try_from(i).unwrap())
                    .with_gender("F")
            })
            .collect()
    }

    struct FailingStore;

    #[async_trait]
    impl VoterStore for FailingStore {
        async fn find_by_natural_key(&self, _: &str, _: &str, _: &str) -> Result<Option<Voter>> {
            Ok(None)
        }

        async fn insert_batch(&self, _voters: &[NewVoter]) -> Result<usize> {
            Err(Error::Database(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let storage = Storage::open_memory().await.unwrap();
        let importer = MergeImporter::new();

        let first = importer.merge(records(8), &storage).await.unwrap();
        assert_eq!(
            first,
            ImportSummary {
                total: 8,
                duplicates_skipped: 0,
                inserted: 8
            }
        );

        let second = importer.merge(records(8), &storage).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates_skipped, 8);
        assert_eq!(storage.count_voters().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_nameless_rows_stay_idempotent() {
        let storage = Storage::open_memory().await.unwrap();
        let importer = MergeImporter::new();
        let batch = vec![NormalizedRecord::new("", "Jayanagar", "7")];

        assert_eq!(importer.merge(batch.clone(), &storage).await.unwrap().inserted, 1);
        assert_eq!(importer.merge(batch, &storage).await.unwrap().inserted, 0);

        let stored = storage.find_voter(UNKNOWN_NAME, "Jayanagar", "7").await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_collisions_within_call_count_as_duplicates() {
        let storage = Storage::open_memory().await.unwrap();
        let batch = vec![
            NormalizedRecord::new("", "Jayanagar", "7"),
            NormalizedRecord::new("UNKNOWN", "Jayanagar", "7"),
        ];

        let summary = MergeImporter::new().merge(batch, &storage).await.unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.duplicates_skipped, 1);
    }

    #[tokio::test]
    async fn test_custom_sentinel() {
        let storage = Storage::open_memory().await.unwrap();
        let importer = MergeImporter::new().with_unknown_name("NOT RECORDED");

        importer
            .merge(vec![NormalizedRecord::new("", "Hebbal", "2")], &storage)
            .await
            .unwrap();

        assert!(storage
            .find_voter("NOT RECORDED", "Hebbal", "2")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_nothing_behind() {
        let storage = Storage::open_memory().await.unwrap();
        let mut batch = records(5);
        batch[3].booth_no = "B".repeat(51);

        let result = MergeImporter::new().merge(batch, &storage).await;

        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(storage.count_voters().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let result = MergeImporter::new().merge(records(2), &FailingStore).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_store() {
        let summary = MergeImporter::new()
            .merge(Vec::new(), &FailingStore)
            .await
            .unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.inserted, 0);
    }
}
