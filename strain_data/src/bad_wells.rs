//! Hand-curated list of suspicious wells (`badWells.txt`).

use crate::store::ResultStore;
use crate::well::WellLabel;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// File name of the bad-well table within an experiment directory.
pub const BAD_WELLS_FILE: &str = "badWells.txt";

/// Wells flagged as suspicious regardless of their measurements, by plate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadWells {
    by_plate: BTreeMap<String, BTreeSet<WellLabel>>,
}

impl BadWells {
    /// Read `plateID<TAB>well,well,...` lines. Blank lines are skipped.
    pub fn read(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("While reading {path:?}"))?;
        Self::parse(&contents).with_context(|| format!("While reading {path:?}"))
    }

    fn parse(contents: &str) -> Result<Self> {
        let mut bad_wells = BadWells::default();
        for (line_num, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (plate, wells) = line
                .split_once('\t')
                .with_context(|| format!("line {}: expected plateID<TAB>wells", line_num + 1))?;
            let entry = bad_wells
                .by_plate
                .entry(plate.trim().to_ascii_uppercase())
                .or_default();
            for well in wells.split(',').map(str::trim).filter(|w| !w.is_empty()) {
                entry.insert(
                    well.to_ascii_uppercase()
                        .parse::<WellLabel>()
                        .with_context(|| format!("line {}", line_num + 1))?,
                );
            }
        }
        Ok(bad_wells)
    }

    /// Whether `well` on `plate` is listed. Plate IDs compare ignoring case.
    pub fn contains(&self, plate: &str, well: WellLabel) -> bool {
        self.by_plate
            .get(&plate.to_ascii_uppercase())
            .is_some_and(|wells| wells.contains(&well))
    }

    /// Whether `well` on `plate` is listed, under the plate ID itself or under
    /// a token that `store` resolves to it, such as a set ID without the group
    /// prefix.
    pub fn flags(&self, store: &ResultStore, plate: &str, well: WellLabel) -> bool {
        self.contains(plate, well)
            || self.by_plate.iter().any(|(token, wells)| {
                wells.contains(&well)
                    && store
                        .resolve_plate(token)
                        .is_some_and(|resolved| resolved.eq_ignore_ascii_case(plate))
            })
    }

    /// Total number of listed wells.
    pub fn len(&self) -> usize {
        self.by_plate.values().map(BTreeSet::len).sum()
    }

    /// True when no well is listed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
