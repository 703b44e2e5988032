use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::extractor::RawRow;
use crate::voter::NormalizedRecord;

static DEFAULT_NORMALIZER: LazyLock<RowNormalizer> = LazyLock::new(RowNormalizer::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Age,
    Gender,
    Constituency,
    BoothNo,
    Address,
}

impl Field {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Constituency => "constituency",
            Self::BoothNo => "booth_no",
            Self::Address => "address",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way a column label can name a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderAlias {
    /// The label, verbatim.
    Exact(String),
    /// Any label containing every fragment, compared case-insensitively.
    ContainsAll(Vec<String>),
}

impl HeaderAlias {
    #[must_use]
    pub fn exact(label: &str) -> Self {
        Self::Exact(label.to_string())
    }

    #[must_use]
    pub fn contains_all(fragments: &[&str]) -> Self {
        Self::ContainsAll(fragments.iter().map(|f| f.to_lowercase()).collect())
    }

    #[must_use]
    pub fn matches(&self, label: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == label,
            Self::ContainsAll(fragments) => {
                let label = label.to_lowercase();
                fragments.iter().all(|f| label.contains(f.as_str()))
            }
        }
    }
}

/// Ordered alias lists per field. Earlier aliases take precedence.
#[derive(Debug, Clone)]
pub struct HeaderAliases {
    entries: Vec<(Field, Vec<HeaderAlias>)>,
}

impl HeaderAliases {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_alias(mut self, field: Field, alias: HeaderAlias) -> Self {
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some((_, aliases)) => aliases.push(alias),
            None => self.entries.push((field, vec![alias])),
        }
        self
    }

    fn with_exact(self, field: Field, labels: &[&str]) -> Self {
        labels
            .iter()
            .fold(self, |acc, label| acc.with_alias(field, HeaderAlias::exact(label)))
    }

    #[must_use]
    pub fn aliases(&self, field: Field) -> &[HeaderAlias] {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, aliases)| aliases.as_slice())
            .unwrap_or_default()
    }

    /// The field a column label names, if any.
    #[must_use]
    pub fn resolve_label(&self, label: &str) -> Option<Field> {
        self.entries
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a.matches(label)))
            .map(|(field, _)| *field)
    }

    #[must_use]
    pub fn is_known_label(&self, label: &str) -> bool {
        self.resolve_label(label).is_some()
    }

    /// Value for `field` from the first alias that carries a non-blank cell.
    /// Exact aliases probe the row directly; pattern aliases scan the row's
    /// labels in column order.
    #[must_use]
    pub fn lookup<'a>(&self, row: &'a RawRow, field: Field) -> Option<&'a str> {
        self.aliases(field).iter().find_map(|alias| match alias {
            HeaderAlias::Exact(label) => row.get(label).filter(|v| !v.trim().is_empty()),
            HeaderAlias::ContainsAll(_) => row
                .iter()
                .find(|(label, value)| alias.matches(label) && !value.trim().is_empty())
                .map(|(_, value)| value),
        })
    }
}

impl Default for HeaderAliases {
    fn default() -> Self {
        Self::empty()
            .with_exact(Field::Name, &["name", "Name", "NAME"])
            .with_exact(Field::Age, &["age", "Age", "AGE"])
            .with_exact(Field::Gender, &["gender", "Gender", "GENDER"])
            .with_exact(
                Field::Constituency,
                &["constituency", "Constituency", "CONSTITUENCY"],
            )
            .with_exact(
                Field::BoothNo,
                &["booth_no", "booth no", "Booth No", "Booth", "booth", "BOOTH"],
            )
            .with_alias(Field::BoothNo, HeaderAlias::contains_all(&["booth", "no"]))
            .with_exact(Field::Address, &["address", "Address", "ADDRESS"])
    }
}

/// Maps raw rows with arbitrary header spellings onto [`NormalizedRecord`].
#[derive(Debug, Clone, Default)]
pub struct RowNormalizer {
    aliases: HeaderAliases,
}

impl RowNormalizer {
    #[must_use]
    pub fn new(aliases: HeaderAliases) -> Self {
        Self { aliases }
    }

    #[must_use]
    pub fn aliases(&self) -> &HeaderAliases {
        &self.aliases
    }

    #[must_use]
    pub fn normalize(&self, raw: &RawRow) -> NormalizedRecord {
        let text = |field| {
            self.aliases
                .lookup(raw, field)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        NormalizedRecord {
            name: text(Field::Name),
            age: self.aliases.lookup(raw, Field::Age).and_then(parse_age),
            gender: text(Field::Gender),
            constituency: text(Field::Constituency),
            booth_no: text(Field::BoothNo),
            address: text(Field::Address),
        }
    }
}

/// Normalizes with the default alias table.
#[must_use]
pub fn normalize(raw: &RawRow) -> NormalizedRecord {
    DEFAULT_NORMALIZER.normalize(raw)
}

/// Whole years from a cell such as `"35"` or `"35.0"`; anything that is not
/// a finite number in `i32` range gives `None`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_age(value: &str) -> Option<i32> {
    let number: f64 = value.trim().parse().ok()?;
    if !number.is_finite() {
        return None;
    }

    let whole = number.trunc();
    if whole < f64::from(i32::MIN) || whole > f64::from(i32::MAX) {
        return None;
    }

    Some(whole as i32)
}
