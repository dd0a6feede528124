//! An experiment group: one input directory, classified and reconciled.
//!
//! Processing runs in three phases over the classified files. Layout files
//! create every result. Growth files then fill in optical densities and
//! production files fill in concentrations, looking up (never creating) the
//! results of the layout phase. Finally wells without growth at the end time
//! point are dropped.

use crate::bad_wells::{BadWells, BAD_WELLS_FILE};
use crate::error::IngestError;
use crate::experiment::{Experiment, WellResult};
use crate::growth::{read_growth_assay, read_growth_matrix};
use crate::layout::{LayoutFormat, LayoutTarget, SampleDefaults};
use crate::production::{read_production, SampleCell};
use crate::settings::GroupSettings;
use crate::store::ResultStore;
use crate::well::{TimePoint, WellLabel};
use anyhow::{Context, Result};
use itertools::Itertools;
use lab_sheet::{read_delimited, read_first_worksheet};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Input files of a group by role, each list in file name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFiles {
    /// Layout descriptions.
    pub layout: Vec<PathBuf>,
    /// Growth exports (`.csv`).
    pub growth: Vec<PathBuf>,
    /// Production spreadsheets (other `.xlsx`).
    pub production: Vec<PathBuf>,
    /// The bad-well table, if present.
    pub bad_wells: Option<PathBuf>,
}

/// Counts of one processing phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounts {
    /// Files read.
    pub files: usize,
    /// Values stored (results created, in the layout phase).
    pub stored: usize,
    /// Values naming a plate well without a result.
    pub skipped: usize,
}

/// Outcome of [`ExperimentGroup::process_files`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Layout files and the results they created.
    pub layout: PhaseCounts,
    /// Growth files and their readings.
    pub growth: PhaseCounts,
    /// Production files and their concentrations.
    pub production: PhaseCounts,
    /// Results flagged from the bad-well table.
    pub suspect: usize,
    /// Wells removed by the minimum growth rule.
    pub removed_wells: usize,
}

/// The experiments of one input directory and the files that describe them.
#[derive(Debug)]
pub struct ExperimentGroup {
    dir: PathBuf,
    format: LayoutFormat,
    settings: GroupSettings,
    store: ResultStore,
    time_points: Vec<TimePoint>,
    files: GroupFiles,
    bad_wells: BadWells,
}

/// Office lock files and hidden files.
fn is_ignored_name(name: &str) -> bool {
    name.starts_with("~$") || name.starts_with('.')
}

fn classify(dir: &Path, format: &LayoutFormat) -> Result<GroupFiles> {
    let mut paths = std::fs::read_dir(dir)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|entry| entry.path()))
                .collect::<std::io::Result<Vec<_>>>()
        })
        .with_context(|| format!("While reading {dir:?}"))?;
    paths.sort();

    let mut files = GroupFiles::default();
    for path in paths {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if is_ignored_name(&name) || !path.is_file() {
            debug!("Ignoring {path:?}");
            continue;
        }
        let lower = name.to_lowercase();
        if lower.ends_with(".csv") {
            files.growth.push(path);
        } else if format.is_layout_file(&name) {
            files.layout.push(path);
        } else if lower.ends_with(".xlsx") {
            files.production.push(path);
        } else if name == BAD_WELLS_FILE {
            files.bad_wells = Some(path);
        } else {
            warn!("Ignoring unrecognised file {path:?}");
        }
    }
    Ok(files)
}

impl ExperimentGroup {
    /// Classify the files of `dir`, read its bad-well table and derive the
    /// time points from the production file names.
    pub fn new(
        dir: impl Into<PathBuf>,
        id_prefix: &str,
        format: LayoutFormat,
        settings: GroupSettings,
    ) -> Result<Self> {
        let dir = dir.into();
        let files = classify(&dir, &format)?;
        let bad_wells = match &files.bad_wells {
            Some(path) => BadWells::read(path)?,
            None => BadWells::default(),
        };

        let mut time_points: BTreeSet<TimePoint> = files
            .production
            .iter()
            .map(|path| {
                format
                    .compute_time_point(path)
                    .unwrap_or(settings.default_time_point)
            })
            .collect();
        if time_points.is_empty() {
            time_points.insert(settings.default_time_point);
        }

        info!(
            "{dir:?} ({} layout): {} layout, {} growth, {} production files, {} bad wells, time points {}",
            format.name(),
            files.layout.len(),
            files.growth.len(),
            files.production.len(),
            bad_wells.len(),
            time_points.iter().join(", ")
        );
        Ok(ExperimentGroup {
            dir,
            format,
            settings,
            store: ResultStore::new(id_prefix),
            time_points: time_points.into_iter().collect(),
            files,
            bad_wells,
        })
    }

    /// Run the layout, growth and production phases, then drop wells
    /// without growth at the end time point.
    ///
    /// The first malformed file aborts processing; its name is in the error.
    pub fn process_files(&mut self) -> Result<ProcessSummary> {
        let files = self.files.clone();
        let mut summary = ProcessSummary::default();

        for path in &files.layout {
            let mut target = LayoutTarget {
                store: &mut self.store,
                time_points: &self.time_points,
            };
            let stored = self
                .format
                .read_layout_file(path, &mut target)
                .with_context(|| format!("While reading {path:?}"))?;
            info!("{path:?}: {stored} results");
            summary.layout.files += 1;
            summary.layout.stored += stored;
        }
        if self.store.is_empty() {
            warn!("No layout in {:?} declared any plate", self.dir);
        }

        for path in &files.growth {
            let counts = self
                .read_growth_file(path)
                .with_context(|| format!("While reading {path:?}"))?;
            summary.growth.files += 1;
            summary.growth.stored += counts.stored;
            summary.growth.skipped += counts.skipped;
        }

        for path in &files.production {
            let (counts, suspect) = self
                .read_production_file(path)
                .with_context(|| format!("While reading {path:?}"))?;
            summary.production.files += 1;
            summary.production.stored += counts.stored;
            summary.production.skipped += counts.skipped;
            summary.suspect += suspect;
        }

        let end_time = self.settings.end_time_point;
        for experiment in self.store.experiments_mut() {
            let removed = experiment.remove_bad_wells(end_time, self.settings.min_growth);
            if !removed.is_empty() {
                info!(
                    "{}: removed wells without growth at {end_time}: {}",
                    experiment.plate(),
                    removed.iter().join(", ")
                );
            }
            summary.removed_wells += removed.len();
        }

        info!(
            "Layout: {} results from {} files. Growth: {} stored, {} skipped. \
             Production: {} stored, {} skipped, {} suspect. Removed {} wells.",
            summary.layout.stored,
            summary.layout.files,
            summary.growth.stored,
            summary.growth.skipped,
            summary.production.stored,
            summary.production.skipped,
            summary.suspect,
            summary.removed_wells
        );
        Ok(summary)
    }

    fn file_time_point(&self, path: &Path) -> TimePoint {
        self.format
            .compute_time_point(path)
            .unwrap_or(self.settings.default_time_point)
    }

    /// Plate of a file that does not name one in its contents: a file name
    /// token naming a plate, else the only plate of the group.
    fn plate_hint(&self, path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_string_lossy().to_uppercase();
        let named = stem
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|token| !token.is_empty())
            .find_map(|token| self.store.resolve_plate(token));
        named
            .or_else(|| self.store.experiments().exactly_one().ok().map(Experiment::plate))
            .map(str::to_string)
    }

    fn read_growth_file(&mut self, path: &Path) -> Result<PhaseCounts> {
        let sheet = read_delimited(path)?;
        let time = self.file_time_point(path);
        let (plate, readings) = if self.format.reads_growth_matrix() {
            let plate = self.plate_hint(path).ok_or_else(|| IngestError::UnknownPlate {
                token: sheet.name().to_string(),
            })?;
            (plate, read_growth_matrix(&sheet, self.settings.matrix_dilution)?)
        } else {
            let readout = read_growth_assay(&sheet, &self.store, &self.settings)?;
            (readout.plate, readout.readings)
        };

        let mut counts = PhaseCounts {
            files: 1,
            ..PhaseCounts::default()
        };
        for (well, growth) in readings {
            match self.store.find(&plate, well, time) {
                Some(handle) => {
                    self.store.result_mut(handle).set_growth(growth);
                    counts.stored += 1;
                }
                None => {
                    debug!("No result for {plate} {well} at {time}");
                    counts.skipped += 1;
                }
            }
        }
        info!(
            "{path:?}: {} growth values for plate {plate} at {time}, {} skipped",
            counts.stored, counts.skipped
        );
        Ok(counts)
    }

    /// Returns the phase counts and the number of results flagged suspect.
    fn read_production_file(&mut self, path: &Path) -> Result<(PhaseCounts, usize)> {
        let sheet = read_first_worksheet(path)?;
        let plate_hint = self.plate_hint(path);
        let defaults = SampleDefaults {
            id_prefix: self.store.id_prefix(),
            plate: plate_hint.as_deref(),
            time: self.file_time_point(path),
        };
        let (store, format, bad_wells) = (&self.store, &self.format, &self.bad_wells);
        let readout = read_production(&sheet, self.settings.production_columns, |text| {
            let Some(sample) = format.parse_sample_name(text, &defaults) else {
                return SampleCell::Unmapped;
            };
            match store.find(&sample.plate, sample.well, sample.time) {
                Some(handle) => SampleCell::Resolved {
                    handle,
                    suspect: bad_wells.flags(store, store.get(handle).0, sample.well),
                },
                None => {
                    debug!("No result for sample {text:?}");
                    SampleCell::Missing
                }
            }
        })?;

        let mut suspect = 0;
        for &(handle, is_suspect) in &readout.samples {
            if is_suspect {
                self.store.result_mut(handle).set_suspect(true);
                suspect += 1;
            }
        }
        for &(handle, production) in &readout.values {
            self.store.result_mut(handle).set_production(production);
        }
        let counts = PhaseCounts {
            files: 1,
            stored: readout.values.len(),
            skipped: readout.missing + readout.unmatched,
        };
        info!(
            "{path:?}: {} production values, {} skipped, {} cells without a sample",
            counts.stored, counts.skipped, readout.unmapped
        );
        Ok((counts, suspect))
    }

    /// The input directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Layout convention of the group.
    pub fn format(&self) -> &LayoutFormat {
        &self.format
    }

    /// Thresholds and defaults in effect.
    pub fn settings(&self) -> &GroupSettings {
        &self.settings
    }

    /// Classified input files.
    pub fn files(&self) -> &GroupFiles {
        &self.files
    }

    /// Time points materialized for every well, ascending.
    pub fn time_points(&self) -> &[TimePoint] {
        &self.time_points
    }

    /// Wells flagged suspect by the bad-well table.
    pub fn bad_wells(&self) -> &BadWells {
        &self.bad_wells
    }

    /// All results, by plate.
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Experiments in plate ID order.
    pub fn experiments(&self) -> impl Iterator<Item = &Experiment> + '_ {
        self.store.experiments()
    }

    /// The experiment with plate ID `plate`.
    pub fn experiment(&self, plate: &str) -> Option<&Experiment> {
        self.store.experiment(plate)
    }

    /// The result of `well` on `plate` at `time`.
    pub fn get_result(&self, plate: &str, well: WellLabel, time: TimePoint) -> Option<&WellResult> {
        self.store.experiment(plate)?.get(well, time)
    }
}
