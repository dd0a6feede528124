//! Numeric conventions applied while reconciling a group.

use crate::well::TimePoint;
use anyhow::Result;

/// Thresholds, dilution factors and defaults used by one experiment group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSettings {
    /// Wells whose growth at `end_time_point` is at or below this are discarded.
    pub min_growth: f64,
    /// Time point at which the minimum growth rule is evaluated.
    pub end_time_point: TimePoint,
    /// Time point used when neither file name nor sample name carries one.
    pub default_time_point: TimePoint,
    /// Dilution of a delimited growth assay that states none.
    pub default_dilution: f64,
    /// Fixed dilution of an OD(600) matrix export.
    pub matrix_dilution: f64,
    /// Blank OD subtracted from delimited growth readings before dilution.
    pub normalization_factor: f64,
    /// Sample columns per row of a production spreadsheet grid.
    pub production_columns: usize,
}

impl Default for GroupSettings {
    fn default() -> Self {
        GroupSettings {
            min_growth: 0.001,
            end_time_point: TimePoint::new(24.0),
            default_time_point: TimePoint::new(24.0),
            default_dilution: 10.0,
            matrix_dilution: 10.0,
            normalization_factor: 0.0,
            production_columns: 24,
        }
    }
}

impl GroupSettings {
    /// Settings from `parameters.toml`, or its defaults.
    pub fn from_parameters() -> Result<Self> {
        Ok(GroupSettings {
            min_growth: *parameters_toml::min_growth()?,
            end_time_point: TimePoint::new(*parameters_toml::end_time_point()?),
            default_time_point: TimePoint::new(*parameters_toml::default_time_point()?),
            default_dilution: *parameters_toml::default_dilution()?,
            matrix_dilution: *parameters_toml::matrix_dilution()?,
            normalization_factor: *parameters_toml::normalization_factor()?,
            production_columns: *parameters_toml::production_columns()?,
        })
    }
}
