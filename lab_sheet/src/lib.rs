//!
//! Crate for reading the spreadsheet, delimited and word-processor exports
//! produced by plate readers and written by hand in the lab.
//!
//! Every format is reduced to one of two shapes: a [`Sheet`] grid of cells,
//! or an ordered list of document [`Paragraph`]s.
//!
#![deny(missing_docs)]

mod delimited;
pub mod docx;
mod sheet;
pub mod testing;
pub mod xlsx;

pub use delimited::read_delimited;
pub use docx::{read_paragraphs, ListStyle, Paragraph};
pub use sheet::{find_marker, Cell, Sheet, SheetRow, SheetRows};
pub use xlsx::read_first_worksheet;
