//! Two dimensional cell grid shared by all spreadsheet-like inputs.

use std::fmt::{Display, Formatter};

/// The value held by a single grid cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Blank cell, or a position beyond the end of its row.
    Empty,
    /// Literal or formula string value.
    Text(String),
    /// Numeric value, including the cached result of a formula.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Spreadsheet error value such as `#DIV/0!`.
    Error(String),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Trimmed text of this cell. Numbers are rendered without a trailing `.0`,
    /// blank and error cells yield an empty string.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty | Cell::Error(_) => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(v) => v.to_string(),
            Cell::Bool(true) => String::from("TRUE"),
            Cell::Bool(false) => String::from("FALSE"),
        }
    }

    /// Numeric value of this cell, if it holds one.
    /// Text cells count when their trimmed content parses as a float, which is
    /// how delimited exports carry their numbers.
    pub fn number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Empty | Cell::Bool(_) | Cell::Error(_) => None,
        }
    }

    /// True for blank cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Bool(_) | Cell::Error(_) => false,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// A named grid of cells, addressed by 0-based row and column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Create a sheet from its rows. Rows may have different lengths.
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Sheet {
            name: name.into(),
            rows,
        }
    }

    /// Name of the worksheet, or of the file it was read from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows, including blank ones.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// The cell at `(row, col)`; positions outside the grid are empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Trimmed text of the cell at `(row, col)`.
    pub fn cell_text(&self, row: usize, col: usize) -> String {
        self.cell(row, col).text()
    }

    /// Numeric value of the cell at `(row, col)`.
    pub fn cell_number(&self, row: usize, col: usize) -> Option<f64> {
        self.cell(row, col).number()
    }

    /// Iterate over the rows of the sheet in order.
    pub fn rows(&self) -> SheetRows<'_> {
        SheetRows {
            inner: self.rows.iter().enumerate(),
        }
    }
}

/// A borrowed row of a [`Sheet`].
#[derive(Debug, Clone, Copy)]
pub struct SheetRow<'a> {
    index: usize,
    cells: &'a [Cell],
}

impl<'a> SheetRow<'a> {
    /// 0-based row index within the sheet.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The cells of this row.
    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }

    /// The cell at `col`; positions beyond the row are empty.
    pub fn cell(&self, col: usize) -> &'a Cell {
        self.cells.get(col).unwrap_or(&EMPTY_CELL)
    }

    /// Trimmed text of the cell at `col`.
    pub fn text(&self, col: usize) -> String {
        self.cell(col).text()
    }

    /// Numeric value of the cell at `col`.
    pub fn number(&self, col: usize) -> Option<f64> {
        self.cell(col).number()
    }

    /// All non-blank cell texts of the row joined by single spaces.
    pub fn joined_text(&self) -> String {
        self.cells
            .iter()
            .map(Cell::text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Iterator over the rows of a [`Sheet`].
#[derive(Debug, Clone)]
pub struct SheetRows<'a> {
    inner: std::iter::Enumerate<std::slice::Iter<'a, Vec<Cell>>>,
}

impl<'a> Iterator for SheetRows<'a> {
    type Item = SheetRow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(index, cells)| SheetRow {
            index,
            cells: cells.as_slice(),
        })
    }
}

/// Consume rows until one whose first cell text equals `marker` has been consumed.
///
/// Returns whether the marker was found. The iterator is left on the row after
/// the marker, or exhausted.
pub fn find_marker<'a>(rows: &mut impl Iterator<Item = SheetRow<'a>>, marker: &str) -> bool {
    rows.any(|row| row.text(0) == marker)
}
