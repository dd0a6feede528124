//! Structural violations in experiment input files.
#![allow(missing_docs)]

use thiserror::Error;

/// A file does not follow the layout, growth or production conventions.
///
/// These are always fatal. The experiment group adds the offending file name
/// as context when it propagates them.
#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("expected a row starting with {marker:?}")]
    MissingMarker { marker: &'static str },

    #[error("expected {expected}, found {found:?}")]
    UnexpectedContent {
        expected: &'static str,
        found: String,
    },

    #[error("no experiment matches plate {token:?}")]
    UnknownPlate { token: String },

    #[error("invalid well label {0:?}")]
    InvalidWell(String),

    #[error("cannot parse {0:?} as a number")]
    InvalidNumber(String),

    #[error("malformed IPTG mapping {0:?}, expected pairs such as \"E=A, F=B\"")]
    MalformedIptg(String),

    #[error("IPTG mapping copies row {from_row}, which has no strain data")]
    UndefinedIptgRow { from_row: char },

    #[error("layout paragraph {0:?} follows the IPTG line")]
    AfterIptg(String),

    #[error("more than {limit} {what} entries in the layout")]
    TooManyEntries { what: &'static str, limit: usize },

    #[error("layout declares no plates")]
    NoPlates,

    #[error("cannot derive a plate ID from layout file name {0:?}")]
    UnrecognisedLayoutName(String),

    #[error("well {well} cannot be mirrored to an IPTG row")]
    CannotMirror { well: String },
}
