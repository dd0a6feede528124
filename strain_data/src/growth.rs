//! Growth (optical density) readers.
//!
//! Two shapes exist: the plate reader's per-well assay export, which names its
//! plate on the second line and states a dilution, and the OD(600) matrix of
//! single plate experiments, one row per plate row.

use crate::error::IngestError;
use crate::settings::GroupSettings;
use crate::store::ResultStore;
use crate::well::{is_row_letter, WellLabel};
use anyhow::Result;
use lab_sheet::{find_marker, Cell, Sheet};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

const MATRIX_MARKER: &str = "OD(600)";
const NO_PLASMID: &str = "NO PLASMID";
const NO_PLASMID_PLATE: &str = "NONE";

lazy_static! {
    static ref DILUTION: Regex = Regex::new(r"(?i)(\d+)[- ]fold dilution").unwrap();
    static ref RESULTS_BY_WELL: Regex = Regex::new(r"(?i)results by well").unwrap();
    static ref NO_PLASMID_NUMBER: Regex = Regex::new(r"NO PLASMID\s*(\d+)").unwrap();
}

/// Growth values of one file, already normalized and diluted.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthReadout {
    /// Plate ID as stored in the [`ResultStore`].
    pub plate: String,
    /// Dilution factor applied to the readings.
    pub dilution: f64,
    /// Optical density of each well that has a reading.
    pub readings: Vec<(WellLabel, f64)>,
}

/// Plate named by the second line of an assay export. A "NO PLASMID" line
/// names the `NONE<N>` plate when it exists, else `NONE`.
fn sniff_plate(line: &str, store: &ResultStore) -> Result<String, IngestError> {
    let upper = line.to_uppercase();
    let plate = if upper.contains(NO_PLASMID) {
        let numbered = NO_PLASMID_NUMBER
            .captures(&upper)
            .and_then(|captures| store.resolve_plate(&format!("{NO_PLASMID_PLATE}{}", &captures[1])));
        numbered.or_else(|| store.resolve_plate(NO_PLASMID_PLATE))
    } else {
        upper
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|token| !token.is_empty())
            .find_map(|token| store.resolve_plate(token))
    };
    plate
        .map(str::to_string)
        .ok_or_else(|| IngestError::UnknownPlate {
            token: line.to_string(),
        })
}

/// Numeric value of a reading cell. Blank cells have none.
pub(crate) fn reading(cell: &Cell) -> Result<Option<f64>, IngestError> {
    if cell.is_blank() {
        return Ok(None);
    }
    cell.number()
        .map(Some)
        .ok_or_else(|| IngestError::InvalidNumber(cell.text()))
}

/// Read a per-well assay export.
///
/// Each `<well>, <sample>, <od>` line yields `(od - normalization_factor) * dilution`.
pub fn read_growth_assay(
    sheet: &Sheet,
    store: &ResultStore,
    settings: &GroupSettings,
) -> Result<GrowthReadout> {
    let mut rows = sheet.rows();
    let header = rows.next().map(|row| row.text(0)).unwrap_or_default();
    if !(header.starts_with("New assay") || header.starts_with("OD")) {
        return Err(IngestError::UnexpectedContent {
            expected: "a \"New assay\" or \"OD\" header",
            found: header,
        }
        .into());
    }
    let plate_line = rows.next().map(|row| row.joined_text()).unwrap_or_default();
    let plate = sniff_plate(&plate_line, store)?;

    let mut dilution = None;
    let mut readings = Vec::new();
    for row in rows {
        let line = row.joined_text();
        if dilution.is_none() {
            if let Some(captures) = DILUTION.captures(&line) {
                let digits = &captures[1];
                let factor: f64 = digits
                    .parse()
                    .map_err(|_| IngestError::InvalidNumber(digits.to_string()))?;
                dilution = Some(factor);
                continue;
            }
            if RESULTS_BY_WELL.is_match(&line) {
                dilution = Some(settings.default_dilution);
                continue;
            }
        }
        let Ok(well) = row.text(0).parse::<WellLabel>() else {
            continue;
        };
        let Some(raw) = reading(row.cell(2))? else {
            debug!("No reading for {plate} {well}");
            continue;
        };
        let factor = *dilution.get_or_insert(settings.default_dilution);
        readings.push((well, (raw - settings.normalization_factor) * factor));
    }
    Ok(GrowthReadout {
        plate,
        dilution: dilution.unwrap_or(settings.default_dilution),
        readings,
    })
}

/// Read an OD(600) matrix: a marker row, a row of plate column numbers from
/// the third column on, then one row per plate row with its letter in the
/// second column. Values are multiplied by `dilution`.
pub fn read_growth_matrix(sheet: &Sheet, dilution: f64) -> Result<Vec<(WellLabel, f64)>> {
    let mut rows = sheet.rows().peekable();
    if !find_marker(&mut rows, MATRIX_MARKER) {
        return Err(IngestError::MissingMarker {
            marker: MATRIX_MARKER,
        }
        .into());
    }
    let header = rows.next().ok_or(IngestError::MissingMarker {
        marker: "plate column numbers",
    })?;
    let columns = header
        .cells()
        .iter()
        .enumerate()
        .skip(2)
        .filter(|(_, cell)| !cell.is_blank())
        .map(|(index, cell)| match cell.number() {
            Some(col) if col >= 1.0 && col.fract() == 0.0 => Ok((index, col as u16)),
            _ => Err(IngestError::UnexpectedContent {
                expected: "a plate column number",
                found: cell.text(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut readings = Vec::new();
    while let Some(row) = rows.next_if(|row| is_row_letter(&row.text(1))) {
        let letter = row.text(1);
        for &(index, col) in &columns {
            let Some(value) = reading(row.cell(index))? else {
                continue;
            };
            let well = WellLabel::new(letter.chars().next().unwrap_or_default(), col)?;
            readings.push((well, value * dilution));
        }
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn sheet(rows: &[&[&str]]) -> Sheet {
        Sheet::new(
            "growth.csv",
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|s| if s.is_empty() { Cell::Empty } else { text(s) })
                        .collect()
                })
                .collect(),
        )
    }

    fn store() -> ResultStore {
        let mut store = ResultStore::new("S4");
        for plate in ["S4A0", "D1", "NONE", "NONE2"] {
            store.experiment_mut(plate);
        }
        store
    }

    #[test]
    fn test_sniff_plate() {
        let store = store();
        assert_eq!(sniff_plate("Plate D1, 24h", &store), Ok("D1".to_string()));
        assert_eq!(sniff_plate("set a0", &store), Ok("S4A0".to_string()));
        assert_eq!(sniff_plate("No plasmid 2", &store), Ok("NONE2".to_string()));
        assert_eq!(sniff_plate("NO PLASMID 7", &store), Ok("NONE".to_string()));
        assert_eq!(sniff_plate("NO PLASMID", &store), Ok("NONE".to_string()));
        assert_eq!(
            sniff_plate("Plate Q9", &store),
            Err(IngestError::UnknownPlate {
                token: "Plate Q9".to_string()
            })
        );
    }

    #[test]
    fn test_read_assay() -> Result<()> {
        let growth = sheet(&[
            &["New assay 2016-05-03"],
            &["D1 24h"],
            &["Read 1"],
            &["Samples at 20-fold dilution"],
            &["Results by well"],
            &["Well", "Sample", "OD600"],
            &["B4", "D1 B4", "0.2955"],
            &["F4", "D1 F4", "0.1475"],
            &["A1", "blank", ""],
        ]);
        let settings = GroupSettings {
            normalization_factor: 0.0005,
            ..GroupSettings::default()
        };
        let readout = read_growth_assay(&growth, &store(), &settings)?;
        assert_eq!(readout.plate, "D1");
        assert_eq!(readout.dilution, 20.0);
        assert_eq!(readout.readings.len(), 2);
        assert_eq!(readout.readings[0].0.to_string(), "B4");
        assert_approx_eq!(readout.readings[0].1, 5.9);
        assert_approx_eq!(readout.readings[1].1, 2.94);
        Ok(())
    }

    #[test]
    fn test_default_dilution() -> Result<()> {
        let growth = sheet(&[
            &["OD600"],
            &["No plasmid 2"],
            &["results by well"],
            &["C7", "x", "0.667"],
        ]);
        let readout = read_growth_assay(&growth, &store(), &GroupSettings::default())?;
        assert_eq!(readout.plate, "NONE2");
        assert_eq!(readout.dilution, 10.0);
        assert_approx_eq!(readout.readings[0].1, 6.67);
        Ok(())
    }

    #[test]
    fn test_assay_errors() {
        let settings = GroupSettings::default();
        let err = read_growth_assay(&sheet(&[&["Plate map"], &["D1"]]), &store(), &settings)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::UnexpectedContent { .. })
        ));
        let err = read_growth_assay(
            &sheet(&[&["OD"], &["D1"], &["A1", "x", "high"]]),
            &store(),
            &settings,
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<IngestError>(),
            Some(&IngestError::InvalidNumber("high".to_string()))
        );
    }

    #[test]
    fn test_read_matrix() -> Result<()> {
        let matrix = sheet(&[
            &["Plate 1"],
            &["OD(600)"],
            &["", "", "1", "2", "12"],
            &["", "A", "0.11", "0.12", "0.5"],
            &["", "B", "0.21", ""],
            &["", "", "mean"],
            &["", "C", "0.9"],
        ]);
        let readings = read_growth_matrix(&matrix, 10.0)?;
        let wells: Vec<String> = readings.iter().map(|(w, _)| w.to_string()).collect();
        assert_eq!(wells, ["A1", "A2", "A12", "B1"]);
        assert_approx_eq!(readings[2].1, 5.0);
        assert_approx_eq!(readings[3].1, 2.1);
        Ok(())
    }

    #[test]
    fn test_matrix_without_marker() {
        let err = read_growth_matrix(&sheet(&[&["OD"]]), 10.0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<IngestError>(),
            Some(&IngestError::MissingMarker { marker: "OD(600)" })
        );
    }
}
