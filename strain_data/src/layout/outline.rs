//! Several plates sharing one numbered-outline layout document.
//!
//! The document is a sequence of paragraphs:
//!
//! - letter list items give the strain suffix of rows A, B, C ...; a row
//!   starting with `0` adds no suffix
//! - decimal list items give the base strain of columns 1, 2, 3 ...
//! - `X=replacement` abbreviates `<number>X` in column strings
//! - `B4.  <strain>` sets a single well directly
//! - `Layout for set(s) A0, A1` and `Plates labelled D1, D2` name the plates
//! - `IPTG E=A, F=B` copies row A to row E (and B to F) as induced; nothing
//!   but prose may follow it

use super::{LayoutTarget, SampleDefaults, SampleDesc};
use crate::error::IngestError;
use crate::experiment::{normalize_whitespace, IPTG_SUFFIX};
use crate::well::{TimePoint, WellLabel};
use anyhow::Result;
use lab_sheet::{read_paragraphs, ListStyle, Paragraph};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

const MAX_ROWS: usize = 8;
const MAX_COLUMNS: usize = 12;
const BLANK: &str = "Blank";

lazy_static! {
    /// `_<hours>h` in a lower-cased file stem.
    static ref FILE_TIME: Regex = Regex::new(r"_(\d+)h(?:[^a-z0-9]|$)").unwrap();
    static ref SET_DECLARATION: Regex =
        Regex::new(r"(?i)^layout\s+for\s+set(?:s|\(s\))?\s+(.+)$").unwrap();
    static ref PLATE_DECLARATION: Regex = Regex::new(r"(?i)^plates\s+labell?ed\s+(.+)$").unwrap();
    /// `<well>. <strain>`
    static ref OVERRIDE: Regex = Regex::new(r"^([A-P]\d+)\.\s+(.+)$").unwrap();
    /// `<letter>=<replacement>`
    static ref ABBREVIATION: Regex = Regex::new(r"^([A-Z])\s*=\s*(.+)$").unwrap();
    static ref IPTG_LINE: Regex = Regex::new(r"^IPTG\s+(.+)$").unwrap();
    /// `<to row>=<from row>`
    static ref IPTG_PAIR: Regex = Regex::new(r"^([A-Z])\s*=\s*([A-Z])$").unwrap();
    /// `<number><letter>[ <rest>]`, a column string using an abbreviation.
    static ref ABBREVIATED_COLUMN: Regex = Regex::new(r"^(\d+)([A-Z])(\s.*)?$").unwrap();
    /// `<set>[ <hours>H] <well>`
    static ref SAMPLE_NAME: Regex =
        Regex::new(r"^(.+?)(?:\s+(\d+(?:\.\d+)?)\s*H)?\s+([A-P]\d+)$").unwrap();
    static ref NO_PLASMID: Regex = Regex::new(r"^NO\s+PLASMID(?:\s*(\d+))?$").unwrap();
}

/// Layout document `layout*.docx` shared by every plate it declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiPlateOutline;

pub(super) fn file_time_point(stem: &str) -> Option<TimePoint> {
    let hours = FILE_TIME.captures(stem)?.get(1)?.as_str().parse().ok()?;
    Some(TimePoint::new(hours))
}

pub(super) fn read_layout_file(path: &Path, target: &mut LayoutTarget<'_>) -> Result<usize> {
    let paragraphs = read_paragraphs(path)?;
    let outline = Outline::parse(&paragraphs, target.store.id_prefix())?;
    let wells = outline.wells()?;
    info!(
        "{} wells on plates {}",
        wells.len(),
        outline.plates.join(", ")
    );
    let mut stored = 0;
    for plate in &outline.plates {
        for (&well, strain) in &wells {
            stored += target.store_well(plate, well, strain, false);
        }
    }
    Ok(stored)
}

pub(super) fn parse_sample_name(text: &str, defaults: &SampleDefaults<'_>) -> Option<SampleDesc> {
    let text = normalize_whitespace(&text.to_uppercase());
    let text = text.strip_prefix("PLATE ").unwrap_or(&text);
    let captures = SAMPLE_NAME.captures(text)?;
    let plate = match NO_PLASMID.captures(&captures[1]) {
        Some(none) => format!("NONE{}", none.get(1).map_or("", |n| n.as_str())),
        None => captures[1].to_string(),
    };
    let time = match captures.get(2) {
        Some(hours) => TimePoint::new(hours.as_str().parse().ok()?),
        None => defaults.time,
    };
    Some(SampleDesc {
        plate,
        well: captures[3].parse().ok()?,
        time,
    })
}

/// Suffix a row adds to the column strain of each of its wells.
#[derive(Debug, Clone, PartialEq)]
struct RowSuffix {
    text: Option<String>,
    iptg: bool,
}

impl RowSuffix {
    fn parse(row: &str) -> Self {
        RowSuffix {
            text: (!row.starts_with('0')).then(|| row.to_string()),
            iptg: false,
        }
    }

    fn apply(&self, column: &str) -> String {
        let mut strain = column.to_string();
        if let Some(text) = &self.text {
            strain.push(' ');
            strain.push_str(text);
        }
        if self.iptg {
            strain.push_str(IPTG_SUFFIX);
        }
        strain
    }
}

/// State of one pass over a layout document.
#[derive(Debug, Default)]
struct Outline {
    plates: Vec<String>,
    rows: BTreeMap<char, RowSuffix>,
    row_items: usize,
    columns: Vec<String>,
    abbreviations: BTreeMap<char, String>,
    overrides: BTreeMap<WellLabel, String>,
    after_iptg: bool,
}

fn is_directive(text: &str) -> bool {
    [
        &*IPTG_LINE,
        &*SET_DECLARATION,
        &*PLATE_DECLARATION,
        &*OVERRIDE,
        &*ABBREVIATION,
    ]
    .iter()
    .any(|pattern| pattern.is_match(text))
}

/// Comma-separated plate IDs, trailing period dropped.
fn declared_ids(list: &str) -> impl Iterator<Item = &str> + '_ {
    list.split(',')
        .map(|id| id.trim().trim_end_matches('.').trim())
        .filter(|id| !id.is_empty())
}

impl Outline {
    fn parse(paragraphs: &[Paragraph], id_prefix: &str) -> Result<Self, IngestError> {
        let mut outline = Outline::default();
        for paragraph in paragraphs {
            let text = normalize_whitespace(&paragraph.text);
            if text.is_empty() {
                continue;
            }
            if outline.after_iptg {
                if paragraph.list.is_some() || is_directive(&text) {
                    return Err(IngestError::AfterIptg(text));
                }
                debug!("Ignoring {text:?}");
                continue;
            }
            match &paragraph.list {
                Some(ListStyle::Letter) => outline.push_row(&text)?,
                Some(ListStyle::Decimal) => outline.push_column(text)?,
                Some(ListStyle::Other(format)) => debug!("Ignoring {format} list item {text:?}"),
                None => outline.directive(&text, id_prefix)?,
            }
        }
        if outline.plates.is_empty() {
            return Err(IngestError::NoPlates);
        }
        Ok(outline)
    }

    fn push_row(&mut self, text: &str) -> Result<(), IngestError> {
        if self.row_items == MAX_ROWS {
            return Err(IngestError::TooManyEntries {
                what: "row",
                limit: MAX_ROWS,
            });
        }
        let row = char::from(b'A' + self.row_items as u8);
        self.rows.insert(row, RowSuffix::parse(text));
        self.row_items += 1;
        Ok(())
    }

    fn push_column(&mut self, text: String) -> Result<(), IngestError> {
        if self.columns.len() == MAX_COLUMNS {
            return Err(IngestError::TooManyEntries {
                what: "column",
                limit: MAX_COLUMNS,
            });
        }
        self.columns.push(text);
        Ok(())
    }

    fn directive(&mut self, text: &str, id_prefix: &str) -> Result<(), IngestError> {
        if let Some(captures) = IPTG_LINE.captures(text) {
            self.copy_iptg_rows(&captures[1])?;
            self.after_iptg = true;
        } else if let Some(captures) = SET_DECLARATION.captures(text) {
            let ids = declared_ids(captures.get(1).map_or("", |m| m.as_str()));
            self.plates.extend(ids.map(|id| format!("{id_prefix}{id}")));
        } else if let Some(captures) = PLATE_DECLARATION.captures(text) {
            let ids = declared_ids(captures.get(1).map_or("", |m| m.as_str()));
            self.plates.extend(ids.map(str::to_string));
        } else if let Some(captures) = OVERRIDE.captures(text) {
            let well = captures[1].parse()?;
            self.overrides.insert(well, captures[2].to_string());
        } else if let Some(captures) = ABBREVIATION.captures(text) {
            if let Some(letter) = captures[1].chars().next() {
                self.abbreviations.insert(letter, captures[2].to_string());
            }
        } else {
            debug!("Ignoring {text:?}");
        }
        Ok(())
    }

    /// Apply `E=A, F=B`: each target row becomes an induced copy of its source
    /// row, overrides included.
    fn copy_iptg_rows(&mut self, pairs: &str) -> Result<(), IngestError> {
        let malformed = || IngestError::MalformedIptg(pairs.to_string());
        let mut copies = Vec::new();
        for pair in pairs.split(',') {
            let pair = pair.trim().trim_end_matches('.');
            let captures = IPTG_PAIR.captures(pair).ok_or_else(malformed)?;
            let to_row = captures[1].chars().next().ok_or_else(malformed)?;
            let from_row = captures[2].chars().next().ok_or_else(malformed)?;
            if to_row > 'H' || from_row > 'H' {
                return Err(malformed());
            }
            copies.push((to_row, from_row));
        }

        for (to_row, from_row) in copies {
            let source = self
                .rows
                .get(&from_row)
                .ok_or(IngestError::UndefinedIptgRow { from_row })?;
            let induced = RowSuffix {
                iptg: true,
                ..source.clone()
            };
            self.rows.insert(to_row, induced);

            let copied: Vec<(WellLabel, String)> = self
                .overrides
                .iter()
                .filter(|(well, _)| well.row() == from_row)
                .map(|(well, strain)| {
                    let strain = if strain == BLANK {
                        strain.clone()
                    } else {
                        format!("{strain}{IPTG_SUFFIX}")
                    };
                    well.with_row(to_row).map(|well| (well, strain))
                })
                .collect::<Result<_, _>>()?;
            self.overrides.extend(copied);
        }
        Ok(())
    }

    /// Column string with a trailing abbreviation letter expanded.
    fn resolve_column(&self, column: &str) -> String {
        if let Some(captures) = ABBREVIATED_COLUMN.captures(column) {
            let replacement = captures[2]
                .chars()
                .next()
                .and_then(|letter| self.abbreviations.get(&letter));
            if let Some(replacement) = replacement {
                let rest = captures.get(3).map_or("", |m| m.as_str());
                return format!("{}{replacement}{rest}", &captures[1]);
            }
        }
        column.to_string()
    }

    /// Strain of every populated well, from row and column composition with
    /// overrides taking precedence. `Blank` wells are left out.
    fn wells(&self) -> Result<BTreeMap<WellLabel, String>, IngestError> {
        let mut wells = BTreeMap::new();
        for (&row, suffix) in &self.rows {
            for (index, column) in self.columns.iter().enumerate() {
                let column = self.resolve_column(column);
                if column == BLANK {
                    continue;
                }
                let well = WellLabel::new(row, index as u16 + 1)?;
                wells.insert(well, suffix.apply(&column));
            }
        }
        for (&well, strain) in &self.overrides {
            if strain == BLANK {
                wells.remove(&well);
            } else {
                wells.insert(well, strain.clone());
            }
        }
        Ok(wells)
    }
}
