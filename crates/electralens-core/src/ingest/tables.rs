//! Table detection over page text.
//!
//! Two layouts are recognised:
//! - **Lattice**: one row per line. Cells sit between `|` separators,
//!   between tabs, or in fixed-width columns whose offsets come from the
//!   header labels. Tables are found page by page and end at a blank line.
//! - **Stream**: one cell per line, as emitted by generators that place each
//!   text run separately. The whole document is read as a single table.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::extractor::{ExtractionError, ExtractionResult, ExtractionStrategy, RawRow, RowIter, TableStrategy};
use super::loader::PagedDocument;
use super::normalizer::HeaderAliases;

/// Words joined by single spaces. Two or more spaces end a label.
static COLUMN_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+(?: \S+)*").expect("column label pattern is valid"));

/// Minimum cells for a header row in either layout.
const MIN_COLUMNS: usize = 2;

/// Lower-cased, trimmed, spaces replaced by underscores.
#[must_use]
pub fn normalize_header_label(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

fn is_rule_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && line.contains(['-', '='])
        && line.chars().all(|c| matches!(c, '-' | '=' | '+' | '|' | ':' | ' '))
}

fn split_ruled(line: &str) -> Vec<String> {
    let line = line.trim();
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

fn split_tabbed(line: &str) -> Vec<String> {
    line.trim_end().split('\t').map(|c| c.trim().to_string()).collect()
}

/// Character offset and text of each label on an aligned line.
fn label_spans(line: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    COLUMN_LABEL
        .find_iter(line)
        .map(move |m| (line[..m.start()].chars().count(), m.as_str()))
}

fn slice_columns(line: &str, starts: &[usize]) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();

    starts
        .iter()
        .enumerate()
        .map(|(index, &start)| {
            let end = starts
                .get(index + 1)
                .copied()
                .unwrap_or(chars.len())
                .min(chars.len());

            if start < end {
                chars[start..end].iter().collect::<String>().trim().to_string()
            } else {
                String::new()
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    Ruled,
    Tabbed,
    /// Column start offsets, in characters.
    Aligned(Vec<usize>),
}

impl Layout {
    fn of_header(line: &str) -> Self {
        if line.contains('|') {
            Self::Ruled
        } else if line.contains('\t') {
            Self::Tabbed
        } else {
            Self::Aligned(label_spans(line).map(|(start, _)| start).collect())
        }
    }

    /// Cells of a data line; `None` when the line does not belong to the
    /// table.
    fn cells(&self, line: &str) -> Option<Vec<String>> {
        match self {
            Self::Ruled => line.contains('|').then(|| split_ruled(line)),
            Self::Tabbed => Some(split_tabbed(line)),
            Self::Aligned(starts) => Some(slice_columns(line, starts)),
        }
    }
}

fn header_cells(line: &str) -> Vec<String> {
    match Layout::of_header(line) {
        Layout::Ruled => split_ruled(line),
        Layout::Tabbed => split_tabbed(line),
        Layout::Aligned(_) => label_spans(line).map(|(_, label)| label.to_string()).collect(),
    }
}

/// Runs of non-blank lines with rule lines removed.
fn blocks(page: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in page.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else if !is_rule_line(line) {
            current.push(line);
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

#[derive(Debug, Clone, Default)]
pub struct LatticeStrategy {
    aliases: HeaderAliases,
}

impl LatticeStrategy {
    #[must_use]
    pub fn new(aliases: HeaderAliases) -> Self {
        Self { aliases }
    }

    fn is_label(&self, label: &str) -> bool {
        self.aliases.is_known_label(label.trim())
            || self.aliases.is_known_label(&normalize_header_label(label))
    }

    /// The first line naming at least two known fields. Without one, the
    /// first line with two or more cells.
    fn header_index(&self, block: &[&str]) -> Option<usize> {
        let cells: Vec<Vec<String>> = block.iter().map(|line| header_cells(line)).collect();

        cells
            .iter()
            .position(|labels| labels.iter().filter(|l| self.is_label(l)).count() >= MIN_COLUMNS)
            .or_else(|| cells.iter().position(|labels| labels.len() >= MIN_COLUMNS))
    }

    fn page_rows(&self, page: &str) -> Vec<RawRow> {
        let mut rows = Vec::new();

        for block in blocks(page) {
            let Some(header_at) = self.header_index(&block) else {
                continue;
            };

            let layout = Layout::of_header(block[header_at]);
            let header: Vec<String> = header_cells(block[header_at])
                .iter()
                .map(|label| normalize_header_label(label))
                .collect();

            for line in &block[header_at + 1..] {
                let Some(cells) = layout.cells(line) else {
                    continue;
                };
                if cells.iter().all(String::is_empty) {
                    continue;
                }

                rows.push(
                    header
                        .iter()
                        .zip(&cells)
                        .map(|(label, value)| (label.as_str(), value.as_str()))
                        .collect(),
                );
            }
        }

        rows
    }
}

impl TableStrategy for LatticeStrategy {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Lattice
    }

    /// Pages are read as the rows are consumed.
    fn extract_rows(&self, document: Arc<PagedDocument>) -> ExtractionResult<RowIter> {
        let strategy = self.clone();

        Ok(Box::new((0..document.page_count()).flat_map(move |index| {
            let rows = strategy.page_rows(&document.pages[index]);
            if !rows.is_empty() {
                tracing::debug!("Page {}: {} table rows", index + 1, rows.len());
            }
            rows
        })))
    }
}

pub struct StreamStrategy {
    aliases: HeaderAliases,
}

impl StreamStrategy {
    #[must_use]
    pub fn new(aliases: HeaderAliases) -> Self {
        Self { aliases }
    }

    /// Position and width of the first run of known column labels.
    fn find_header(&self, lines: &[&str]) -> Option<(usize, usize)> {
        let mut index = 0;

        while index < lines.len() {
            let width = lines[index..]
                .iter()
                .take_while(|line| self.aliases.is_known_label(line))
                .count();

            if width >= MIN_COLUMNS {
                return Some((index, width));
            }
            index += width.max(1);
        }

        None
    }

    fn rows(&self, document: &PagedDocument) -> ExtractionResult<Vec<RawRow>> {
        let lines: Vec<&str> = document
            .pages
            .iter()
            .flat_map(|page| page.lines())
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let (start, width) = self.find_header(&lines).ok_or(ExtractionError::NoHeader)?;
        let header = &lines[start..start + width];

        let mut rows = Vec::new();
        let mut cells: Vec<&str> = Vec::with_capacity(width);
        let mut index = start + width;

        while index < lines.len() {
            // Header repeated at the top of a continuation page.
            if lines[index..].starts_with(header) {
                index += width;
                continue;
            }

            cells.push(lines[index]);
            if cells.len() == width {
                rows.push(header.iter().copied().zip(cells.drain(..)).collect());
            }
            index += 1;
        }

        if !cells.is_empty() {
            rows.push(header.iter().copied().zip(cells).collect());
        }

        Ok(rows)
    }
}

impl Default for StreamStrategy {
    fn default() -> Self {
        Self::new(HeaderAliases::default())
    }
}

impl TableStrategy for StreamStrategy {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Stream
    }

    /// The document is one logical table, so it is read in full up front.
    fn extract_rows(&self, document: Arc<PagedDocument>) -> ExtractionResult<RowIter> {
        Ok(Box::new(self.rows(&document)?.into_iter()))
    }
}
