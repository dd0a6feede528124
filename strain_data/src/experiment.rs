//! Per-plate result store.
#![allow(missing_docs)]

use crate::well::{ResultKey, TimePoint, WellLabel};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

/// Suffix marking an induced strain in layout strings and in the well to strain map.
pub const IPTG_SUFFIX: &str = " +IPTG";

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Measurements of one well at one time point.
#[derive(Debug, Clone, PartialEq)]
pub struct WellResult {
    strain: String,
    iptg: bool,
    growth: Option<f64>,
    production: Option<f64>,
    suspect: bool,
}

impl WellResult {
    fn new(strain: String, iptg: bool) -> Self {
        WellResult {
            strain,
            iptg,
            growth: None,
            production: None,
            suspect: false,
        }
    }

    /// Genotype description of the strain in this well.
    pub fn strain(&self) -> &str {
        &self.strain
    }

    /// Whether the well was induced with IPTG.
    pub fn iptg(&self) -> bool {
        self.iptg
    }

    /// Optical density, once a growth file has provided it.
    pub fn growth(&self) -> Option<f64> {
        self.growth
    }

    /// Metabolite concentration in g/L, once a production file has provided it.
    pub fn production(&self) -> Option<f64> {
        self.production
    }

    /// Whether the well is listed as suspicious in the bad-well file.
    pub fn suspect(&self) -> bool {
        self.suspect
    }

    /// Both growth and production have been measured.
    pub fn is_complete(&self) -> bool {
        self.growth.is_some() && self.production.is_some()
    }

    pub fn set_growth(&mut self, growth: f64) {
        self.growth = Some(growth);
    }

    pub fn set_production(&mut self, production: f64) {
        self.production = Some(production);
    }

    pub fn set_suspect(&mut self, suspect: bool) {
        self.suspect = suspect;
    }
}

/// Index of a [`WellResult`] within its [`Experiment`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResultId(usize);

/// All results of one 96-well plate.
///
/// Records are kept in an arena addressed by [`ResultId`]; the key index maps
/// each `(well, time)` to its record. Removing a key leaves its record
/// unreachable rather than shifting the arena.
#[derive(Debug, Clone)]
pub struct Experiment {
    plate: String,
    records: Vec<WellResult>,
    index: BTreeMap<ResultKey, ResultId>,
    well_strains: BTreeMap<WellLabel, String>,
}

impl Experiment {
    pub fn new(plate: impl Into<String>) -> Self {
        Experiment {
            plate: plate.into(),
            records: Vec::new(),
            index: BTreeMap::new(),
            well_strains: BTreeMap::new(),
        }
    }

    /// Plate ID of this experiment.
    pub fn plate(&self) -> &str {
        &self.plate
    }

    /// Create the result for `(well, time)`, replacing any earlier one.
    /// The whitespace-normalized strain also becomes the well's current strain.
    pub fn store(&mut self, strain: &str, well: WellLabel, time: TimePoint, iptg: bool) -> ResultId {
        let strain = normalize_whitespace(strain);
        let well_strain = if iptg {
            format!("{strain}{IPTG_SUFFIX}")
        } else {
            strain.clone()
        };
        self.well_strains.insert(well, well_strain);

        let record = WellResult::new(strain, iptg);
        let key = ResultKey::new(well, time);
        match self.index.get(&key) {
            Some(&id) => {
                self.records[id.0] = record;
                id
            }
            None => {
                let id = ResultId(self.records.len());
                self.records.push(record);
                self.index.insert(key, id);
                id
            }
        }
    }

    pub fn id_of(&self, well: WellLabel, time: TimePoint) -> Option<ResultId> {
        self.index.get(&ResultKey::new(well, time)).copied()
    }

    pub fn get(&self, well: WellLabel, time: TimePoint) -> Option<&WellResult> {
        self.get_by_key(&ResultKey::new(well, time))
    }

    pub fn get_by_key(&self, key: &ResultKey) -> Option<&WellResult> {
        self.index.get(key).map(|id| &self.records[id.0])
    }

    pub(crate) fn result(&self, id: ResultId) -> &WellResult {
        &self.records[id.0]
    }

    pub(crate) fn result_mut(&mut self, id: ResultId) -> &mut WellResult {
        &mut self.records[id.0]
    }

    /// All results in key order.
    pub fn results(&self) -> impl Iterator<Item = (&ResultKey, &WellResult)> + '_ {
        self.index.iter().map(|(key, id)| (key, &self.records[id.0]))
    }

    /// Number of `(well, time)` keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The strain last stored in `well`, with the IPTG suffix when induced.
    pub fn strain_for_well(&self, well: WellLabel) -> Option<&str> {
        self.well_strains.get(&well).map(String::as_str)
    }

    /// Distinct strains (with IPTG suffix) currently assigned to wells.
    pub fn strains(&self) -> BTreeSet<&str> {
        self.well_strains.values().map(String::as_str).collect()
    }

    /// Discard every time point of each well whose growth at `end_time` is at
    /// most `min_growth`. Wells without a growth value at `end_time` are kept.
    ///
    /// Returns the removed wells.
    pub fn remove_bad_wells(&mut self, end_time: TimePoint, min_growth: f64) -> Vec<WellLabel> {
        let bad: BTreeSet<WellLabel> = self
            .results()
            .filter(|(key, result)| {
                key.time == end_time && result.growth().is_some_and(|g| g <= min_growth)
            })
            .map(|(key, _)| key.well)
            .collect();
        if bad.is_empty() {
            return Vec::new();
        }
        self.index.retain(|key, _| !bad.contains(&key.well));
        self.well_strains.retain(|well, _| !bad.contains(well));
        bad.into_iter().collect()
    }
}
