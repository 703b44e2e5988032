use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::{
    ingest::VoterStore,
    voter::{NewVoter, Voter},
    Error, Result,
};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS voters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(name) <= 255),
    age INTEGER,
    gender TEXT NOT NULL DEFAULT '',
    constituency TEXT NOT NULL DEFAULT '' CHECK (length(constituency) <= 255),
    booth_no TEXT NOT NULL DEFAULT '' CHECK (length(booth_no) <= 50),
    address TEXT NOT NULL DEFAULT '',
    vote INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_voters_constituency ON voters(constituency);
CREATE UNIQUE INDEX IF NOT EXISTS idx_voters_natural_key ON voters(name, constituency, booth_no);
"#;

const VOTER_COLUMNS: &str =
    "id, name, age, gender, constituency, booth_no, address, vote, created_at, updated_at";

type VoterRow = (
    i64,
    String,
    Option<i32>,
    String,
    String,
    String,
    String,
    bool,
    String,
    Option<String>,
);

pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn open(path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{path}?mode=rwc"))
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn open_memory() -> Result<Self> {
        // A single connection that never expires: every new connection to
        // `sqlite::memory:` would see a fresh, empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn get_voter(&self, id: i64) -> Result<Voter> {
        let row: VoterRow = sqlx::query_as(&format!(
            "SELECT {VOTER_COLUMNS} FROM voters WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::VoterNotFound(id))?;

        parse_voter_row(row)
    }

    pub async fn find_voter(
        &self,
        name: &str,
        constituency: &str,
        booth_no: &str,
    ) -> Result<Option<Voter>> {
        let row: Option<VoterRow> = sqlx::query_as(&format!(
            "SELECT {VOTER_COLUMNS} FROM voters
             WHERE name = ? AND constituency = ? AND booth_no = ?
             LIMIT 1"
        ))
        .bind(name)
        .bind(constituency)
        .bind(booth_no)
        .fetch_optional(&self.pool)
        .await?;

        row.map(parse_voter_row).transpose()
    }

    pub async fn list_voters(&self, skip: u32, limit: u32) -> Result<Vec<Voter>> {
        let rows: Vec<VoterRow> = sqlx::query_as(&format!(
            "SELECT {VOTER_COLUMNS} FROM voters ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(limit))
        .bind(i64::from(skip))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_voter_row).collect()
    }

    pub async fn count_voters(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM voters")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Inserts every voter in one transaction. On any failure the
    /// transaction is dropped uncommitted, so none of the rows persist.
    pub async fn insert_voters(&self, voters: &[NewVoter]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for voter in voters {
            sqlx::query(
                r#"
                INSERT INTO voters (name, age, gender, constituency, booth_no, address, vote, created_at)
                VALUES (?, ?, ?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(&voter.name)
            .bind(voter.age)
            .bind(&voter.gender)
            .bind(&voter.constituency)
            .bind(&voter.booth_no)
            .bind(&voter.address)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.is_unique_violation() {
                        return Error::DuplicateVoter {
                            name: voter.name.clone(),
                            constituency: voter.constituency.clone(),
                            booth_no: voter.booth_no.clone(),
                        };
                    }
                }
                Error::Database(e)
            })?;
        }

        tx.commit().await?;

        Ok(voters.len())
    }
}

#[async_trait::async_trait]
impl VoterStore for Storage {
    async fn find_by_natural_key(
        &self,
        name: &str,
        constituency: &str,
        booth_no: &str,
    ) -> Result<Option<Voter>> {
        self.find_voter(name, constituency, booth_no).await
    }

    async fn insert_batch(&self, voters: &[NewVoter]) -> Result<usize> {
        self.insert_voters(voters).await
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Database(sqlx::Error::Decode(Box::new(e))))
}

fn parse_voter_row(row: VoterRow) -> Result<Voter> {
    let (id, name, age, gender, constituency, booth_no, address, vote, created_at, updated_at) =
        row;

    Ok(Voter {
        id,
        name,
        age,
        gender,
        constituency,
        booth_no,
        address,
        vote,
        created_at: parse_timestamp(&created_at)?,
        updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
    })
}
