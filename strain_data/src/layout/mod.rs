//! Layout conventions of the three experiment families.
//!
//! A [`LayoutFormat`] decides which files describe plate layouts, how time
//! points are read from file names, how a layout file populates the result
//! store and how production sample names map back to plate wells.

mod outline;
mod plasmid_list;
mod single_plate;

pub use outline::MultiPlateOutline;
pub use plasmid_list::SharedPlasmidList;
pub use single_plate::SinglePlate;

use crate::experiment::{normalize_whitespace, IPTG_SUFFIX};
use crate::store::ResultStore;
use crate::well::{TimePoint, WellLabel};
use anyhow::Result;
use std::path::Path;

/// The layout convention of an experiment group.
#[derive(Debug, Clone)]
pub enum LayoutFormat {
    /// One plate per group, spreadsheet layout, several time points.
    SinglePlate(SinglePlate),
    /// Several plates sharing one numbered-outline document layout.
    MultiPlateOutline(MultiPlateOutline),
    /// One spreadsheet layout applied to every plate of a plasmid list.
    SharedPlasmidList(SharedPlasmidList),
}

/// Plate, well and time point named by a production sample cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDesc {
    /// Plate token, resolved against the store by the caller.
    pub plate: String,
    /// Well on that plate.
    pub well: WellLabel,
    /// Time point of the measurement.
    pub time: TimePoint,
}

/// What a sample name may leave out.
#[derive(Debug, Clone, Copy)]
pub struct SampleDefaults<'a> {
    /// Group prefix of the experiment IDs.
    pub id_prefix: &'a str,
    /// Plate of the file being read, when it can be told from the file alone.
    pub plate: Option<&'a str>,
    /// Time point of the file being read.
    pub time: TimePoint,
}

/// Where a layout file stores its wells.
pub struct LayoutTarget<'a> {
    /// Experiments are created here as plates are declared.
    pub store: &'a mut ResultStore,
    /// Every well is materialized at each of these.
    pub time_points: &'a [TimePoint],
}

impl LayoutTarget<'_> {
    /// Store `strain` in `well` of `plate` at every time point. A strain ending
    /// in the IPTG suffix is stored without it, as induced.
    ///
    /// Returns the number of results created.
    pub fn store_well(&mut self, plate: &str, well: WellLabel, strain: &str, iptg: bool) -> usize {
        let (strain, suffixed) = split_iptg(strain);
        let iptg = iptg || suffixed;
        let experiment = self.store.experiment_mut(plate);
        for &time in self.time_points {
            experiment.store(&strain, well, time, iptg);
        }
        self.time_points.len()
    }
}

/// Split a trailing IPTG suffix off a strain string.
pub(crate) fn split_iptg(strain: &str) -> (String, bool) {
    let strain = normalize_whitespace(strain);
    match strain.strip_suffix(IPTG_SUFFIX) {
        Some(base) => (base.trim_end().to_string(), true),
        None => (strain, false),
    }
}

/// Lower-cased file name of `path`.
fn lower_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// File names starting with `layout` in any case, with extension `ext`.
fn is_named_layout(name: &str, ext: &str) -> bool {
    let name = name.to_lowercase();
    name.starts_with("layout") && name.ends_with(ext)
}

impl LayoutFormat {
    /// Short name used on the command line and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            LayoutFormat::SinglePlate(_) => "single-plate",
            LayoutFormat::MultiPlateOutline(_) => "outline",
            LayoutFormat::SharedPlasmidList(_) => "plasmid-list",
        }
    }

    /// Whether the file called `name` is a layout description.
    pub fn is_layout_file(&self, name: &str) -> bool {
        match self {
            LayoutFormat::SinglePlate(_) | LayoutFormat::SharedPlasmidList(_) => {
                is_named_layout(name, ".xlsx")
            }
            LayoutFormat::MultiPlateOutline(_) => is_named_layout(name, ".docx"),
        }
    }

    /// Time point carried by a data file name, if this convention puts one there.
    pub fn compute_time_point(&self, path: &Path) -> Option<TimePoint> {
        let name = lower_file_name(path);
        let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);
        match self {
            LayoutFormat::SinglePlate(_) => single_plate::file_time_point(stem),
            LayoutFormat::MultiPlateOutline(_) => outline::file_time_point(stem),
            LayoutFormat::SharedPlasmidList(_) => None,
        }
    }

    /// Populate `target` from one layout file. Returns the number of results created.
    pub fn read_layout_file(&self, path: &Path, target: &mut LayoutTarget<'_>) -> Result<usize> {
        match self {
            LayoutFormat::SinglePlate(_) => single_plate::read_layout_file(path, target),
            LayoutFormat::MultiPlateOutline(_) => outline::read_layout_file(path, target),
            LayoutFormat::SharedPlasmidList(format) => format.read_layout_file(path, target),
        }
    }

    /// Parse the upper-cased text of a production sample cell.
    /// `None` for blanks, controls and anything else that names no well.
    pub fn parse_sample_name(
        &self,
        text: &str,
        defaults: &SampleDefaults<'_>,
    ) -> Option<SampleDesc> {
        match self {
            LayoutFormat::SinglePlate(_) => single_plate::parse_sample_name(text, defaults),
            LayoutFormat::MultiPlateOutline(_) => outline::parse_sample_name(text, defaults),
            LayoutFormat::SharedPlasmidList(format) => format.parse_sample_name(text, defaults),
        }
    }

    /// Whether growth files are OD(600) matrices rather than per-well assay lists.
    pub fn reads_growth_matrix(&self) -> bool {
        matches!(self, LayoutFormat::SinglePlate(_))
    }
}
