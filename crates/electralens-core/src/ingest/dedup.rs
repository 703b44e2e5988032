use std::collections::HashSet;

use crate::voter::{NaturalKey, NormalizedRecord};

/// Drops records whose natural key was already seen in the batch. The
/// first occurrence wins and order is preserved.
#[derive(Debug, Default)]
pub struct BatchDeduplicator {
    seen: HashSet<NaturalKey>,
    dropped: usize,
}

impl BatchDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a key is offered.
    pub fn accept(&mut self, record: &NormalizedRecord) -> bool {
        let fresh = self.seen.insert(record.natural_key());
        if !fresh {
            self.dropped += 1;
        }
        fresh
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[must_use]
pub fn dedupe<I>(records: I) -> Vec<NormalizedRecord>
where
    I: IntoIterator<Item = NormalizedRecord>,
{
    let mut deduplicator = BatchDeduplicator::new();
    records
        .into_iter()
        .filter(|record| deduplicator.accept(record))
        .collect()
}
