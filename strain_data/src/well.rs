//! Well labels, time points and the keys that combine them.
#![allow(missing_docs)]

use crate::error::IngestError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Row letter and 1-based column of a microplate well, e.g. `B4`.
///
/// Ordered by row, then by column number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "&str", into = "String")]
pub struct WellLabel {
    row: u8,
    col: u16,
}

impl WellLabel {
    /// A well from its row letter (`A`..=`Z`) and 1-based column.
    pub fn new(row: char, col: u16) -> Result<Self, IngestError> {
        if !row.is_ascii_uppercase() || col == 0 {
            return Err(IngestError::InvalidWell(format!("{row}{col}")));
        }
        Ok(WellLabel {
            row: row as u8,
            col,
        })
    }

    pub fn row(self) -> char {
        char::from(self.row)
    }

    pub fn col(self) -> u16 {
        self.col
    }

    /// The same column `rows` rows further down, if that is still a row letter.
    pub fn shifted(self, rows: u8) -> Option<Self> {
        let row = self.row.checked_add(rows)?;
        row.is_ascii_uppercase().then_some(WellLabel { row, ..self })
    }

    /// The same column in another row.
    pub fn with_row(self, row: char) -> Result<Self, IngestError> {
        WellLabel::new(row, self.col)
    }
}

impl Display for WellLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.row(), self.col)
    }
}

impl FromStr for WellLabel {
    type Err = IngestError;

    fn from_str(label: &str) -> Result<Self, IngestError> {
        let invalid = || IngestError::InvalidWell(label.to_string());
        let mut chars = label.trim().chars();
        let row = chars.next().ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let col = digits.parse().map_err(|_| invalid())?;
        WellLabel::new(row, col).map_err(|_| invalid())
    }
}

impl TryFrom<&str> for WellLabel {
    type Error = IngestError;

    fn try_from(value: &str) -> Result<Self, IngestError> {
        value.parse()
    }
}

impl From<WellLabel> for String {
    fn from(value: WellLabel) -> Self {
        value.to_string()
    }
}

/// True when `label` is a single row letter, as in the label column of a plate grid.
pub fn is_row_letter(label: &str) -> bool {
    let mut chars = label.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
}

/// Hours since inoculation at which a plate was measured.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimePoint(OrderedFloat<f64>);

impl TimePoint {
    pub const fn new(hours: f64) -> Self {
        TimePoint(OrderedFloat(hours))
    }

    pub fn hours(self) -> f64 {
        self.0.into_inner()
    }
}

impl Display for TimePoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h", self.0)
    }
}

/// Identity of a result within one plate: a well at a time point.
///
/// Ordered by well first, so that all time points of a well are adjacent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResultKey {
    pub well: WellLabel,
    pub time: TimePoint,
}

impl ResultKey {
    pub fn new(well: WellLabel, time: TimePoint) -> Self {
        ResultKey { well, time }
    }
}

impl Display for ResultKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.well, self.time)
    }
}
