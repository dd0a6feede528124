//! Delimited (comma separated, quoted) plate reader exports.

use crate::sheet::{Cell, Sheet};
use anyhow::{Context, Result};
use std::path::Path;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Read a delimited file into a [`Sheet`] of text cells.
/// There is no header row and rows may differ in length.
pub fn read_delimited(path: &Path) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("While reading {path:?}"))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("While reading {path:?}"))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let field = field.trim_start_matches(BYTE_ORDER_MARK);
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Sheet::new(name, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::write;
    use tempfile::tempdir;

    #[test]
    fn test_read_delimited() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("growth.csv");
        write(
            &path,
            "\u{feff}New assay,\n\"P3, rep 1\",,\nA1,\"sample 1\",0.512\nB12,s,\n",
        )?;
        let sheet = read_delimited(&path)?;
        assert_eq!(sheet.name(), "growth.csv");
        assert_eq!(sheet.cell_text(0, 0), "New assay");
        assert_eq!(sheet.cell_text(1, 0), "P3, rep 1");
        assert_eq!(sheet.cell(1, 1), &Cell::Empty);
        assert_eq!(sheet.cell_text(2, 1), "sample 1");
        assert_eq!(sheet.cell_number(2, 2), Some(0.512));
        assert_eq!(sheet.cell_number(3, 2), None);
        Ok(())
    }
}
