//! One layout grid shared by a list of plasmid plates.

use super::{LayoutTarget, SampleDefaults, SampleDesc};
use crate::error::IngestError;
use crate::experiment::normalize_whitespace;
use crate::well::{is_row_letter, WellLabel};
use anyhow::Result;
use lab_sheet::{read_first_worksheet, Sheet};
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::path::Path;

/// Cell `O1` holds the format marker, the plasmid list follows below it.
const PLASMID_COLUMN: usize = 14;
const PLASMID_MARKER: &str = "mental plasmids";
const GRID_COLUMNS: u16 = 12;
/// Columns from here on were induced.
const FIRST_IPTG_COLUMN: u16 = 7;
const NO_INSERTION_PLATE: &str = "NONE";

lazy_static! {
    static ref BLANK_CELL: Regex = Regex::new(r"(?i)blank|blak").unwrap();
    /// `<prefix> <plate> <well>`
    static ref SAMPLE_NAME: Regex = Regex::new(r"^(\S+)\s+(\S+)\s+([A-P]\d+)$").unwrap();
}

/// Layout spreadsheet with a strain grid and an "Experimental plasmids" list.
/// Every grid well is stored on every listed plate, with the plate's inserted
/// gene appended to the strain.
#[derive(Debug, Clone)]
pub struct SharedPlasmidList {
    /// Plasmid list entries that stand for "no insertion", compared ignoring case.
    pub no_insertion: Vec<String>,
}

impl Default for SharedPlasmidList {
    fn default() -> Self {
        SharedPlasmidList {
            no_insertion: ["none", "no plasmid", "no insertion", "empty vector"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// A plate of the plasmid list and the gene suffix of its strains.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Plasmid {
    plate: String,
    suffix: String,
}

impl SharedPlasmidList {
    fn plasmid(&self, entry: &str) -> Plasmid {
        if self
            .no_insertion
            .iter()
            .any(|synonym| synonym.eq_ignore_ascii_case(entry))
        {
            return Plasmid {
                plate: NO_INSERTION_PLATE.to_string(),
                suffix: String::new(),
            };
        }
        let (plate, suffix) = entry.split_once(' ').unwrap_or((entry, ""));
        Plasmid {
            plate: plate.to_string(),
            suffix: suffix.to_string(),
        }
    }

    fn plasmids(&self, sheet: &Sheet) -> Result<Vec<Plasmid>, IngestError> {
        let marker = sheet.cell_text(0, PLASMID_COLUMN);
        if !marker.to_lowercase().contains(PLASMID_MARKER) {
            return Err(IngestError::UnexpectedContent {
                expected: "an \"Experimental plasmids\" header in O1",
                found: marker,
            });
        }
        let plasmids: Vec<Plasmid> = (1..sheet.num_rows())
            .map(|row| normalize_whitespace(&sheet.cell_text(row, PLASMID_COLUMN)))
            .take_while(|entry| !entry.is_empty())
            .map(|entry| self.plasmid(&entry))
            .collect();
        if plasmids.is_empty() {
            return Err(IngestError::NoPlates);
        }
        Ok(plasmids)
    }

    pub(super) fn read_layout_file(&self, path: &Path, target: &mut LayoutTarget<'_>) -> Result<usize> {
        let sheet = read_first_worksheet(path)?;
        let plasmids = self.plasmids(&sheet)?;
        info!(
            "Layout for plates {}",
            plasmids
                .iter()
                .map(|p| p.plate.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut stored = 0;
        for row in sheet.rows() {
            let label = row.text(0);
            let row_letter = match label.chars().next() {
                Some(letter) if is_row_letter(&label) && letter <= 'H' => letter,
                _ => continue,
            };
            for col in 1..=GRID_COLUMNS {
                let base = row.text(usize::from(col));
                if base.is_empty() || BLANK_CELL.is_match(&base) {
                    continue;
                }
                let well = WellLabel::new(row_letter, col)?;
                let iptg = col >= FIRST_IPTG_COLUMN;
                for plasmid in &plasmids {
                    let strain = if plasmid.suffix.is_empty() {
                        base.clone()
                    } else {
                        format!("{base} {}", plasmid.suffix)
                    };
                    stored += target.store_well(&plasmid.plate, well, &strain, iptg);
                }
            }
        }
        Ok(stored)
    }

    pub(super) fn parse_sample_name(
        &self,
        text: &str,
        defaults: &SampleDefaults<'_>,
    ) -> Option<SampleDesc> {
        let text = normalize_whitespace(&text.to_uppercase());
        let captures = SAMPLE_NAME.captures(&text)?;
        if !captures[1].eq_ignore_ascii_case(defaults.id_prefix) {
            return None;
        }
        Some(SampleDesc {
            plate: captures[2].to_string(),
            well: captures[3].parse().ok()?,
            time: defaults.time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResultStore;
    use crate::well::TimePoint;
    use lab_sheet::testing::write_xlsx;
    use lab_sheet::Cell;
    use pretty_assertions::assert_eq;

    const T24: TimePoint = TimePoint::new(24.0);

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    /// Grid rows A-H with strain numbers in columns B-M, plasmids in column O.
    fn s2_layout() -> Vec<Vec<Cell>> {
        let plasmids = [
            "Experimental Plasmids",
            "P6 rhtA",
            "P7  thrA  thrB",
            "No plasmid",
            "P9",
        ];
        let mut rows = Vec::new();
        for index in 0..10 {
            let mut row = vec![Cell::Empty; PLASMID_COLUMN + 1];
            match index {
                0 => {
                    for (col, cell) in row.iter_mut().enumerate().take(13).skip(1) {
                        *cell = Cell::Number(col as f64);
                    }
                }
                1..=8 => {
                    let letter = char::from(b'A' + index as u8 - 1);
                    row[0] = text(&letter.to_string());
                    for cell in &mut row[1..=12] {
                        *cell = text("277 DrhtA ptac-thrABC");
                    }
                    if letter == 'A' {
                        row[3] = text("blank");
                        row[4] = text("Blak");
                        row[5] = Cell::Empty;
                    }
                }
                _ => row[0] = text("Notes"),
            }
            if let Some(entry) = plasmids.get(index) {
                row[PLASMID_COLUMN] = text(entry);
            }
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_plasmid_entries() {
        let format = SharedPlasmidList::default();
        assert_eq!(
            format.plasmid("P6 rhtA"),
            Plasmid {
                plate: "P6".to_string(),
                suffix: "rhtA".to_string()
            }
        );
        assert_eq!(
            format.plasmid("NO PLASMID"),
            Plasmid {
                plate: "NONE".to_string(),
                suffix: String::new()
            }
        );
        assert_eq!(format.plasmid("P9").suffix, "");
    }

    #[test]
    fn test_read_layout_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("layout.xlsx");
        write_xlsx(&path, "Layout", &s2_layout())?;
        let mut store = ResultStore::new("S2");
        let times = [T24];
        let mut target = LayoutTarget {
            store: &mut store,
            time_points: &times,
        };
        let format = SharedPlasmidList::default();
        assert_eq!(format.read_layout_file(&path, &mut target)?, 4 * 93);

        let p6 = store.experiment("P6").unwrap();
        assert_eq!(p6.len(), 93);
        let e2 = p6.get("E2".parse()?, T24).unwrap();
        assert_eq!(e2.strain(), "277 DrhtA ptac-thrABC rhtA");
        assert!(!e2.iptg());
        assert!(p6.get("A7".parse()?, T24).unwrap().iptg());
        assert!(p6.get("A3".parse()?, T24).is_none());
        assert!(p6.get("A5".parse()?, T24).is_none());

        let p7 = store.experiment("P7").unwrap();
        assert_eq!(
            p7.get("H12".parse()?, T24).unwrap().strain(),
            "277 DrhtA ptac-thrABC thrA thrB"
        );
        let none = store.experiment("NONE").unwrap();
        assert_eq!(
            none.get("B1".parse()?, T24).unwrap().strain(),
            "277 DrhtA ptac-thrABC"
        );
        assert!(store.experiment("P9").is_some());
        Ok(())
    }

    #[test]
    fn test_missing_marker() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("layout.xlsx");
        write_xlsx(&path, "Layout", &[vec![text("A"), text("277")]])?;
        let mut store = ResultStore::new("S2");
        let times = [T24];
        let mut target = LayoutTarget {
            store: &mut store,
            time_points: &times,
        };
        let err = SharedPlasmidList::default()
            .read_layout_file(&path, &mut target)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::UnexpectedContent { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_parse_sample_name() {
        let defaults = SampleDefaults {
            id_prefix: "S2",
            plate: None,
            time: T24,
        };
        let format = SharedPlasmidList::default();
        let desc = format.parse_sample_name("S2 P6\nE2", &defaults).unwrap();
        assert_eq!(desc.plate, "P6");
        assert_eq!(desc.well.to_string(), "E2");
        assert_eq!(desc.time, T24);
        assert_eq!(format.parse_sample_name("S3 P6 E2", &defaults), None);
        assert_eq!(format.parse_sample_name("BLANK", &defaults), None);
        assert_eq!(format.parse_sample_name("", &defaults), None);
    }
}
