//! Page layout recovered from PDF text operators.
//!
//! Each text run is placed at its text-matrix origin. Runs are grouped into
//! rows by baseline and into columns by left edge, then the page is written
//! back as text: rows of the grid become `| a | b |` lines with empty cells
//! kept in place, everything else becomes a plain line.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use super::loader::{LoadError, LoadResult};

/// Baselines closer than this share a row.
const ROW_TOLERANCE: f64 = 2.0;
/// Left edges closer than this share a column.
const COLUMN_TOLERANCE: f64 = 4.0;
/// `TJ` adjustment, in thousandths of an em, read as a word gap.
const WORD_GAP: f64 = -200.0;

/// A run of text at its starting point in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

impl TextBox {
    #[must_use]
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(self, tx: f64, ty: f64) -> Self {
        let [a, b, c, d, e, f] = self.0;
        Self([a, b, c, d, tx.mul_add(a, ty.mul_add(c, e)), tx.mul_add(b, ty.mul_add(d, f))])
    }

    fn origin(self) -> (f64, f64) {
        (self.0[4], self.0[5])
    }
}

struct TextState {
    line: Matrix,
    leading: f64,
    /// Set by positioning operators; cleared once a run is placed.
    positioned: bool,
    boxes: Vec<TextBox>,
}

impl TextState {
    fn new() -> Self {
        Self {
            line: Matrix::IDENTITY,
            leading: 0.0,
            positioned: true,
            boxes: Vec::new(),
        }
    }

    fn move_to(&mut self, line: Matrix) {
        self.line = line;
        self.positioned = true;
    }

    fn next_line(&mut self) {
        self.move_to(self.line.translate(0.0, -self.leading));
    }

    fn show(&mut self, text: &str) {
        if !self.positioned {
            if let Some(last) = self.boxes.last_mut() {
                last.text.push_str(text);
                return;
            }
        }

        if text.trim().is_empty() {
            return;
        }

        let (x, y) = self.line.origin();
        self.boxes.push(TextBox::new(text, x, y));
        self.positioned = false;
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "BT" => self.move_to(Matrix::IDENTITY),
            "Tm" => {
                if let Some(matrix) = numbers(operands) {
                    self.move_to(Matrix(matrix));
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers(operands) {
                    self.move_to(self.line.translate(tx, ty));
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers(operands) {
                    self.leading = -ty;
                    self.move_to(self.line.translate(tx, ty));
                }
            }
            "TL" => {
                if let Some([leading]) = numbers(operands) {
                    self.leading = leading;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(string_text) {
                    self.show(&text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show(&array_text(items));
                }
            }
            "'" => {
                self.next_line();
                if let Some(text) = operands.first().and_then(string_text) {
                    self.show(&text);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(text) = operands.get(2).and_then(string_text) {
                    self.show(&text);
                }
            }
            _ => {}
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() < N {
        return None;
    }

    let mut values = [0.0; N];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(values)
}

/// UTF-16BE when marked with a byte order mark, otherwise one char per byte.
fn decode_bytes(bytes: &[u8]) -> String {
    match bytes.strip_prefix(b"\xFE\xFF".as_slice()) {
        Some(utf16) => char::decode_utf16(
            utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
        )
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect(),
        None => bytes.iter().copied().map(char::from).collect(),
    }
}

fn string_text(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_bytes(bytes)),
        _ => None,
    }
}

fn array_text(items: &[Object]) -> String {
    let mut text = String::new();

    for item in items {
        match item {
            Object::String(bytes, _) => text.push_str(&decode_bytes(bytes)),
            other => {
                if number(other).is_some_and(|gap| gap <= WORD_GAP) {
                    text.push(' ');
                }
            }
        }
    }

    text
}

/// Text runs of one page, in content-stream order.
pub fn page_boxes(document: &Document, page_id: ObjectId) -> LoadResult<Vec<TextBox>> {
    let data = document
        .get_page_content(page_id)
        .map_err(|e| LoadError::Pdf(e.to_string()))?;
    let content = Content::decode(&data).map_err(|e| LoadError::Pdf(e.to_string()))?;

    let mut state = TextState::new();
    for operation in &content.operations {
        state.apply(&operation.operator, &operation.operands);
    }

    Ok(state.boxes)
}

/// Top to bottom, each row left to right.
fn cluster_rows(boxes: &[TextBox]) -> Vec<Vec<&TextBox>> {
    let mut sorted: Vec<&TextBox> = boxes.iter().collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y));

    let mut rows: Vec<Vec<&TextBox>> = Vec::new();
    for text_box in sorted {
        match rows.last_mut() {
            Some(row) if (row[0].y - text_box.y).abs() <= ROW_TOLERANCE => row.push(text_box),
            _ => rows.push(vec![text_box]),
        }
    }

    for row in &mut rows {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
    }

    rows
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Column {
    left: f64,
    right: f64,
}

impl Column {
    fn holds(&self, x: f64) -> bool {
        x >= self.left && x <= self.right
    }
}

/// Left-edge clusters present in at least half of the grid rows.
fn column_edges(grid: &[&Vec<&TextBox>]) -> Vec<Column> {
    let mut lefts: Vec<f64> = grid.iter().flat_map(|row| row.iter().map(|b| b.x)).collect();
    lefts.sort_by(f64::total_cmp);

    let mut columns: Vec<Column> = Vec::new();
    for x in lefts {
        match columns.last_mut() {
            Some(column) if x - column.right <= COLUMN_TOLERANCE => column.right = x,
            _ => columns.push(Column { left: x, right: x }),
        }
    }

    let min_rows = (grid.len() / 2).max(1);
    columns.retain(|column| {
        grid.iter()
            .filter(|row| row.iter().any(|b| column.holds(b.x)))
            .count()
            >= min_rows
    });

    columns
}

fn grid_line(row: &[&TextBox], columns: &[Column]) -> String {
    let mut cells = vec![String::new(); columns.len()];

    for text_box in row {
        let index = columns
            .iter()
            .rposition(|c| c.left - COLUMN_TOLERANCE <= text_box.x)
            .unwrap_or(0);
        let cell = &mut cells[index];

        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(text_box.text.trim());
    }

    format!("| {} |", cells.join(" | "))
}

fn plain_line(row: &[&TextBox]) -> String {
    row.iter()
        .map(|b| b.text.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Page text with one line per visual row. Rows from the first to the last
/// multi-run row are laid out on a shared column grid.
#[must_use]
pub fn render_page(boxes: &[TextBox]) -> String {
    let rows = cluster_rows(boxes);

    let grid_rows: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.len() >= 2)
        .map(|(index, _)| index)
        .collect();
    let grid: Vec<&Vec<&TextBox>> = grid_rows.iter().map(|&index| &rows[index]).collect();
    let columns = column_edges(&grid);

    let span = match (grid_rows.first(), grid_rows.last()) {
        (Some(&first), Some(&last)) if columns.len() >= 2 => Some(first..=last),
        _ => None,
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            if span.as_ref().is_some_and(|span| span.contains(&index)) {
                grid_line(row, &columns)
            } else {
                plain_line(row)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    fn roll_boxes() -> Vec<TextBox> {
        let mut boxes = vec![TextBox::new("Electoral Roll", 50.0, 740.0)];
        let rows: [(f64, &[(f64, &str)]); 3] = [
            (
                700.0,
                &[
                    (50.0, "Name"),
                    (150.0, "Age"),
                    (200.0, "Gender"),
                    (260.0, "Constituency"),
                    (380.0, "Booth No"),
                    (450.0, "Address"),
                ],
            ),
            (
                686.0,
                &[
                    (50.0, "Asha Rao"),
                    (150.0, "32"),
                    (260.0, "Hebbal"),
                    (380.0, "12"),
                    (450.0, "3 Palace Rd"),
                ],
            ),
            (
                672.5,
                &[
                    (50.0, "Imran Ali"),
                    (151.5, "45"),
                    (200.0, "M"),
                    (260.0, "Hebbal"),
                    (380.0, "12"),
                    (450.0, "7 Bellary Rd"),
                ],
            ),
        ];

        for (y, cells) in rows {
            for &(x, text) in cells {
                boxes.push(TextBox::new(text, x, y));
            }
        }
        boxes
    }

    fn one_page_pdf(cells: &[(i64, i64, &str)]) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
        ];
        for &(x, y, text) in cells {
            operations.push(Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), y.into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(text)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        (doc, page_id)
    }

    #[test]
    fn test_render_keeps_empty_cells_in_place() {
        let text = render_page(&roll_boxes());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines,
            vec![
                "Electoral Roll",
                "| Name | Age | Gender | Constituency | Booth No | Address |",
                "| Asha Rao | 32 |  | Hebbal | 12 | 3 Palace Rd |",
                "| Imran Ali | 45 | M | Hebbal | 12 | 7 Bellary Rd |",
            ]
        );
    }

    #[test]
    fn test_single_run_rows_stay_plain() {
        let boxes = vec![
            TextBox::new("Notice", 50.0, 700.0),
            TextBox::new("Revised list", 50.0, 680.0),
        ];
        assert_eq!(render_page(&boxes), "Notice\nRevised list");
    }

    #[test]
    fn test_positioning_operators() {
        let mut state = TextState::new();
        state.apply("BT", &[]);
        state.apply("TD", &[Object::Integer(10), Object::Integer(500)]);
        state.apply("Tj", &[Object::string_literal("Name")]);
        state.apply("Td", &[Object::Integer(90), Object::Integer(0)]);
        state.apply(
            "TJ",
            &[Object::Array(vec![
                Object::string_literal("Booth"),
                Object::Integer(-250),
                Object::string_literal("No"),
            ])],
        );
        state.apply("TL", &[Object::Real(14.0)]);
        state.apply("T*", &[]);
        state.apply("Tj", &[Object::string_literal("Asha")]);
        state.apply("Tj", &[Object::string_literal(" Rao")]);
        state.apply("'", &[Object::string_literal("Imran")]);

        assert_eq!(
            state.boxes,
            vec![
                TextBox::new("Name", 10.0, 500.0),
                TextBox::new("Booth No", 100.0, 500.0),
                TextBox::new("Asha Rao", 100.0, 486.0),
                TextBox::new("Imran", 100.0, 472.0),
            ]
        );
    }

    #[test]
    fn test_utf16_strings() {
        assert_eq!(decode_bytes(b"\xFE\xFF\x00A\x00s\x00h\x00a"), "Asha");
        assert_eq!(decode_bytes(b"Ravi"), "Ravi");
    }

    #[test]
    fn test_page_boxes_read_text_matrix() {
        let (doc, page_id) = one_page_pdf(&[(50, 700, "Name"), (200, 700, "Booth No"), (50, 686, "Ravi")]);
        let boxes = page_boxes(&doc, page_id).unwrap();

        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[1], TextBox::new("Booth No", 200.0, 700.0));
        assert_eq!(render_page(&boxes), "| Name | Booth No |\nRavi");
    }
}
