use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Voter not found: {0}")]
    VoterNotFound(i64),

    #[error("Duplicate voter: {name} already exists in {constituency}, booth {booth_no}")]
    DuplicateVoter {
        name: String,
        constituency: String,
        booth_no: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
