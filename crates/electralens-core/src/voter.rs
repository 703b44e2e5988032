use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name stored for rows whose name cell was blank.
pub const UNKNOWN_NAME: &str = "UNKNOWN";

/// One voter row in canonical shape, as produced by the normalizer.
///
/// Every field is always present; blanks are empty strings and an
/// unreadable age is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: String,
    pub age: Option<i32>,
    pub gender: String,
    pub constituency: String,
    pub booth_no: String,
    pub address: String,
}

impl NormalizedRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, constituency: impl Into<String>, booth_no: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constituency: constituency.into(),
            booth_no: booth_no.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }

    #[must_use]
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = gender.into();
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Identity used for in-batch deduplication: name and constituency
    /// compared case-insensitively, booth number verbatim.
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            name: self.name.to_lowercase(),
            constituency: self.constituency.to_lowercase(),
            booth_no: self.booth_no.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub name: String,
    pub constituency: String,
    pub booth_no: String,
}

/// Insertable voter row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVoter {
    pub name: String,
    pub age: Option<i32>,
    pub gender: String,
    pub constituency: String,
    pub booth_no: String,
    pub address: String,
}

impl NewVoter {
    /// Builds the stored shape of a record, substituting `unknown_name`
    /// for a blank name.
    #[must_use]
    pub fn from_record(record: NormalizedRecord, unknown_name: &str) -> Self {
        let name = if record.name.is_empty() {
            unknown_name.to_string()
        } else {
            record.name
        };

        Self {
            name,
            age: record.age,
            gender: record.gender,
            constituency: record.constituency,
            booth_no: record.booth_no,
            address: record.address,
        }
    }
}

impl From<NormalizedRecord> for NewVoter {
    fn from(record: NormalizedRecord) -> Self {
        Self::from_record(record, UNKNOWN_NAME)
    }
}

/// A voter as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: i64,
    pub name: String,
    pub age: Option<i32>,
    pub gender: String,
    pub constituency: String,
    pub booth_no: String,
    pub address: String,
    pub vote: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
