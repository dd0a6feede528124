//! Production spreadsheets: a "Sample" grid naming the plate well of each
//! position, followed by an "mg/L" grid of the same shape with the measured
//! concentrations.

use crate::error::IngestError;
use crate::growth::reading;
use crate::store::ResultHandle;
use crate::well::is_row_letter;
use anyhow::Result;
use lab_sheet::{find_marker, Sheet};
use std::collections::BTreeMap;

const SAMPLE_MARKER: &str = "Sample";
const CONCENTRATION_MARKER: &str = "mg/L";

/// What the text of one Sample grid cell names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleCell {
    /// Blank, control, or text that names no well.
    Unmapped,
    /// A well that has no result at that time point.
    Missing,
    /// An existing result.
    Resolved {
        /// The result measured at this position.
        handle: ResultHandle,
        /// Whether the well is listed in the bad-well table.
        suspect: bool,
    },
}

/// Everything a production spreadsheet contributes, for the caller to apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionReadout {
    /// Results named by the Sample grid and their suspect flag.
    pub samples: Vec<(ResultHandle, bool)>,
    /// Production in g/L of each result with a concentration.
    pub values: Vec<(ResultHandle, f64)>,
    /// Sample cells naming no well.
    pub unmapped: usize,
    /// Sample cells naming a well without a result.
    pub missing: usize,
    /// Concentrations at a position whose sample has no result.
    pub unmatched: usize,
}

/// Read both grids of the first worksheet.
///
/// Row labels sit in the first column and each row holds `columns` cells.
/// Sample texts are folded to one upper-case line before `resolve` sees them.
/// Concentrations are converted from mg/L to g/L and joined to the sample at
/// the same row label and column.
pub fn read_production(
    sheet: &Sheet,
    columns: usize,
    mut resolve: impl FnMut(&str) -> SampleCell,
) -> Result<ProductionReadout> {
    let mut readout = ProductionReadout::default();
    let mut rows = sheet.rows().peekable();
    if !find_marker(&mut rows, SAMPLE_MARKER) {
        return Err(IngestError::MissingMarker {
            marker: SAMPLE_MARKER,
        }
        .into());
    }

    let mut positions: BTreeMap<String, Vec<Option<ResultHandle>>> = BTreeMap::new();
    while let Some(row) = rows.next_if(|row| is_row_letter(&row.text(0))) {
        let handles = (1..=columns)
            .map(|col| {
                let text = row.text(col).replace('\n', " ").to_uppercase();
                if text.is_empty() {
                    return None;
                }
                match resolve(&text) {
                    SampleCell::Unmapped => {
                        readout.unmapped += 1;
                        None
                    }
                    SampleCell::Missing => {
                        readout.missing += 1;
                        None
                    }
                    SampleCell::Resolved { handle, suspect } => {
                        readout.samples.push((handle, suspect));
                        Some(handle)
                    }
                }
            })
            .collect();
        positions.insert(row.text(0), handles);
    }

    if !find_marker(&mut rows, CONCENTRATION_MARKER) {
        return Err(IngestError::MissingMarker {
            marker: CONCENTRATION_MARKER,
        }
        .into());
    }
    rows.next();
    while let Some(row) = rows.next_if(|row| is_row_letter(&row.text(0))) {
        let handles = positions.get(&row.text(0));
        for col in 1..=columns {
            let Some(mg_per_l) = reading(row.cell(col))? else {
                continue;
            };
            match handles.and_then(|handles| handles[col - 1]) {
                Some(handle) => readout.values.push((handle, mg_per_l / 1000.0)),
                None => readout.unmatched += 1,
            }
        }
    }
    Ok(readout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResultStore;
    use crate::well::TimePoint;
    use assert_approx_eq::assert_approx_eq;
    use lab_sheet::Cell;
    use pretty_assertions::assert_eq;

    const T24: TimePoint = TimePoint::new(24.0);

    fn cell(s: &str) -> Cell {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    fn sheet(rows: &[&[&str]]) -> Sheet {
        Sheet::new(
            "Sheet1",
            rows.iter()
                .map(|row| row.iter().copied().map(cell).collect())
                .collect(),
        )
    }

    fn store() -> ResultStore {
        let mut store = ResultStore::new("S4");
        let experiment = store.experiment_mut("D1");
        for well in ["B4", "F4", "A1"] {
            experiment.store("926", well.parse().unwrap(), T24, false);
        }
        store
    }

    fn resolver(store: &ResultStore) -> impl FnMut(&str) -> SampleCell + '_ {
        move |text| {
            let Some((plate, well)) = text.split_once(' ') else {
                return SampleCell::Unmapped;
            };
            let Ok(well) = well.parse() else {
                return SampleCell::Unmapped;
            };
            match store.find(plate, well, T24) {
                Some(handle) => SampleCell::Resolved {
                    handle,
                    suspect: text == "D1 F4",
                },
                None => SampleCell::Missing,
            }
        }
    }

    #[test]
    fn test_two_grids_join_by_position() -> Result<()> {
        let store = store();
        let production = sheet(&[
            &["HPLC run 12"],
            &["Sample", "1", "2", "3"],
            &["A", "d1 b4", "BLANK", "D1\nF4"],
            &["B", "D1 A2", "", "D1 A1"],
            &[""],
            &["mg/L"],
            &["", "1", "2", "3"],
            &["A", "19", "3", "59"],
            &["B", "7", "", "0"],
            &["C", "1"],
        ]);
        let readout = read_production(&production, 3, resolver(&store))?;
        let b4 = store.find("D1", "B4".parse()?, T24).unwrap();
        let f4 = store.find("D1", "F4".parse()?, T24).unwrap();
        let a1 = store.find("D1", "A1".parse()?, T24).unwrap();
        assert_eq!(readout.samples, [(b4, false), (f4, true), (a1, false)]);
        assert_eq!(readout.unmapped, 1);
        assert_eq!(readout.missing, 1);
        assert_eq!(readout.unmatched, 3);
        let values: Vec<_> = readout.values.iter().map(|&(h, _)| h).collect();
        assert_eq!(values, [b4, f4, a1]);
        assert_approx_eq!(readout.values[0].1, 0.019);
        assert_approx_eq!(readout.values[1].1, 0.059);
        assert_approx_eq!(readout.values[2].1, 0.0);
        Ok(())
    }

    #[test]
    fn test_missing_grids() {
        let store = store();
        let err = read_production(&sheet(&[&["mg/L"]]), 3, resolver(&store)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<IngestError>(),
            Some(&IngestError::MissingMarker { marker: "Sample" })
        );
        let err = read_production(&sheet(&[&["Sample"], &["A", "D1 B4"]]), 3, resolver(&store))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<IngestError>(),
            Some(&IngestError::MissingMarker { marker: "mg/L" })
        );
    }
}
