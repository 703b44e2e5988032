pub mod error;
pub mod ingest;
pub mod storage;
pub mod voter;

pub use error::{Error, Result};
pub use ingest::{
    ImportOutcome, ImportReport, ImportSummary, IngestConfig, IngestError, IngestPipeline,
    VoterStore,
};
pub use storage::Storage;
pub use voter::{NaturalKey, NewVoter, NormalizedRecord, Voter, UNKNOWN_NAME};
