//!
//! Crate for reconciling the layout, growth and production files of strain
//! engineering experiments into one result per plate, well and time point.
//!
//! An [`ExperimentGroup`] classifies the files of one directory. Its
//! [`LayoutFormat`] decides how layouts and sample names are read.
//!
#![deny(missing_docs)]

pub mod bad_wells;
pub mod error;
pub mod experiment;
pub mod group;
pub mod growth;
pub mod layout;
pub mod production;
pub mod settings;
pub mod store;
pub mod well;

pub use bad_wells::BadWells;
pub use error::IngestError;
pub use experiment::{Experiment, ResultId, WellResult};
pub use group::{ExperimentGroup, GroupFiles, PhaseCounts, ProcessSummary};
pub use layout::{LayoutFormat, MultiPlateOutline, SampleDesc, SharedPlasmidList, SinglePlate};
pub use settings::GroupSettings;
pub use store::{ResultHandle, ResultStore};
pub use well::{ResultKey, TimePoint, WellLabel};
