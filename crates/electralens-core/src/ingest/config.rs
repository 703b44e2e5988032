use serde::{Deserialize, Serialize};

use super::extractor::ExtractionStrategy;
use crate::voter::UNKNOWN_NAME;

/// Construction-time settings for [`super::IngestPipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Tried in order; the first strategy with rows wins.
    pub strategies: Vec<ExtractionStrategy>,
    /// Stored in place of a blank name.
    pub unknown_name: String,
}

impl IngestConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: vec![ExtractionStrategy::Lattice, ExtractionStrategy::Stream],
            unknown_name: UNKNOWN_NAME.to_string(),
        }
    }

    /// Lattice detection only.
    #[must_use]
    pub fn without_fallback(mut self) -> Self {
        self.strategies.retain(|s| *s != ExtractionStrategy::Stream);
        self
    }

    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<ExtractionStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    #[must_use]
    pub fn with_unknown_name(mut self, name: impl Into<String>) -> Self {
        self.unknown_name = name.into();
        self
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new()
    }
}
