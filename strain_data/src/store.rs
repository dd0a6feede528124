//! Plate-keyed collection of experiments.

use crate::experiment::{Experiment, ResultId, WellResult};
use crate::well::{TimePoint, WellLabel};
use std::collections::BTreeMap;

/// Address of a result anywhere in a [`ResultStore`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResultHandle {
    experiment: usize,
    id: ResultId,
}

/// Experiments of one group, interned by plate ID.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    id_prefix: String,
    experiments: Vec<Experiment>,
    by_plate: BTreeMap<String, usize>,
}

impl ResultStore {
    /// An empty store. Plate tokens may be written relative to `id_prefix`.
    pub fn new(id_prefix: impl Into<String>) -> Self {
        ResultStore {
            id_prefix: id_prefix.into(),
            ..ResultStore::default()
        }
    }

    /// Group prefix that short plate tokens are relative to.
    pub fn id_prefix(&self) -> &str {
        &self.id_prefix
    }

    /// The experiment for `plate`, created when first seen.
    pub fn experiment_mut(&mut self, plate: &str) -> &mut Experiment {
        let index = match self.by_plate.get(plate) {
            Some(&index) => index,
            None => {
                let index = self.experiments.len();
                self.experiments.push(Experiment::new(plate));
                self.by_plate.insert(plate.to_string(), index);
                index
            }
        };
        &mut self.experiments[index]
    }

    /// The experiment whose plate ID is exactly `plate`.
    pub fn experiment(&self, plate: &str) -> Option<&Experiment> {
        self.by_plate.get(plate).map(|&i| &self.experiments[i])
    }

    /// Experiments in plate ID order.
    pub fn experiments(&self) -> impl Iterator<Item = &Experiment> + '_ {
        self.by_plate.values().map(|&i| &self.experiments[i])
    }

    /// Number of experiments.
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// True before any layout has declared a plate.
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Plate ID named by `token`, ignoring case: either the plate ID itself or
    /// the part following the group prefix.
    pub fn resolve_plate(&self, token: &str) -> Option<&str> {
        let prefixed = format!("{}{token}", self.id_prefix);
        let found = [token, prefixed.as_str()].into_iter().find_map(|candidate| {
            self.by_plate
                .keys()
                .find(|plate| plate.eq_ignore_ascii_case(candidate))
                .map(String::as_str)
        });
        found
    }

    /// Handle of the result for `(well, time)` on the plate named by `token`.
    pub fn find(&self, token: &str, well: WellLabel, time: TimePoint) -> Option<ResultHandle> {
        let plate = self.resolve_plate(token)?;
        let experiment = self.by_plate[plate];
        let id = self.experiments[experiment].id_of(well, time)?;
        Some(ResultHandle { experiment, id })
    }

    /// Plate ID and result addressed by `handle`.
    pub fn get(&self, handle: ResultHandle) -> (&str, &WellResult) {
        let experiment = &self.experiments[handle.experiment];
        (experiment.plate(), experiment.result(handle.id))
    }

    /// Mutable access to the result addressed by `handle`.
    pub fn result_mut(&mut self, handle: ResultHandle) -> &mut WellResult {
        self.experiments[handle.experiment].result_mut(handle.id)
    }

    pub(crate) fn experiments_mut(&mut self) -> impl Iterator<Item = &mut Experiment> + '_ {
        self.experiments.iter_mut()
    }
}
