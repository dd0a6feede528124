//! parameters_toml
#![deny(missing_docs)]

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct Parameters {
    /// Wells whose growth at the end time point is at or below this value are discarded.
    min_growth: f64,
    /// The time point (hours) at which the minimum growth rule is evaluated.
    end_time_point: f64,
    /// Time point (hours) used when no file name or sample name carries one.
    default_time_point: f64,
    /// Dilution factor of a delimited growth assay that states none.
    default_dilution: f64,
    /// Fixed dilution factor of an OD(600) matrix export.
    matrix_dilution: f64,
    /// Blank OD subtracted from every delimited growth reading before dilution.
    normalization_factor: f64,
    /// Number of sample columns in a production spreadsheet grid.
    production_columns: usize,
}

const DEFAULT_PARAMETERS: Parameters = Parameters {
    min_growth: 0.001,
    end_time_point: 24.0,
    default_time_point: 24.0,
    default_dilution: 10.0,
    matrix_dilution: 10.0,
    normalization_factor: 0.0,
    production_columns: 24,
};

impl Default for Parameters {
    fn default() -> Self {
        DEFAULT_PARAMETERS
    }
}

static PARAMETERS: OnceLock<Result<Parameters>> = OnceLock::new();

/// Return a reference to the global parameters.
/// The parameters may need to be loaded; if loading fails, return Err.
fn parameters() -> &'static Result<Parameters> {
    PARAMETERS.get_or_init(|| {
        let path = std::env::current_exe()
            .context("Unable to locate the running executable")?
            .with_file_name("parameters.toml");
        if !path.exists() {
            warn!(
                "could not find parameters.toml at {}, falling back to defaults",
                path.display()
            );
            Ok(DEFAULT_PARAMETERS)
        } else {
            let s = std::fs::read_to_string(&path).with_context(|| path.display().to_string())?;
            parse_parameters(&s).with_context(|| path.display().to_string())
        }
    })
}

fn parse_parameters(s: &str) -> Result<Parameters> {
    Ok(toml::from_str(s)?)
}

/// Get a parameter from parameters.toml
macro_rules! parameter_getter {
    ($a:ident, $t:ty) => {
        /// Get this parameter from parameters.toml
        pub fn $a() -> Result<&'static $t> {
            let val = match parameters() {
                Err(e) => return Err(anyhow::anyhow!(e)),
                Ok(p) => &p.$a,
            };
            if DEFAULT_PARAMETERS.$a != *val {
                warn!("using non-default {} = {:?}", stringify!($a), val);
            }
            Ok(val)
        }
    };
}

parameter_getter!(min_growth, f64);
parameter_getter!(end_time_point, f64);
parameter_getter!(default_time_point, f64);
parameter_getter!(default_dilution, f64);
parameter_getter!(matrix_dilution, f64);
parameter_getter!(normalization_factor, f64);
parameter_getter!(production_columns, usize);
