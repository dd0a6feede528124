//!
//! Reader for the first worksheet of an Office Open XML workbook (`.xlsx`).
//!
//! Only cell values are decoded: shared and inline strings, numbers, booleans,
//! errors and the cached results of formulas. Styles, merged ranges and every
//! worksheet after the first are ignored.
//!

use crate::sheet::{Cell, Sheet};
use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const DEFAULT_WORKSHEET: &str = "xl/worksheets/sheet1.xml";

/// Worksheet size limits of the format: rows `1..=1048576`, columns `A..=XFD`.
const MAX_ROWS: usize = 1 << 20;
const MAX_COLUMNS: usize = 1 << 14;

/// Read the first worksheet of the workbook at `path`.
pub fn read_first_worksheet(path: &Path) -> Result<Sheet> {
    let file = File::open(path).with_context(|| format!("While opening {path:?}"))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("{path:?} is not an xlsx workbook"))?;
    read_archive(&mut archive).with_context(|| format!("While reading {path:?}"))
}

fn read_archive<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Sheet> {
    let (name, target) = first_sheet(archive)?;
    let shared_strings = match read_optional_entry(archive, SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let xml = read_entry(archive, &target)?;
    let rows = parse_worksheet(&xml, &shared_strings)?;
    Ok(Sheet::new(name, rows))
}

pub(crate) fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    read_optional_entry(archive, name)?.with_context(|| format!("Missing {name} in archive"))
}

pub(crate) fn read_optional_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .with_context(|| format!("While decompressing {name}"))?;
            Ok(Some(xml))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Value of the attribute whose local name is `name`, namespace prefixes ignored.
pub(crate) fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Name and archive path of the first worksheet.
fn first_sheet<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<(String, String)> {
    let workbook = read_entry(archive, WORKBOOK)?;
    let mut reader = Reader::from_str(&workbook);
    let mut first = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name")?.unwrap_or_default();
                first = Some((name, attribute(&e, b"id")?));
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let Some((name, rel_id)) = first else {
        bail!("{WORKBOOK} declares no worksheets");
    };

    let target = match (rel_id, read_optional_entry(archive, WORKBOOK_RELS)?) {
        (Some(rel_id), Some(rels)) => relationship_target(&rels, &rel_id)?,
        _ => None,
    };
    let target = target.map_or_else(
        || DEFAULT_WORKSHEET.to_string(),
        |target| match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("xl/{target}"),
        },
    );
    Ok((name, target))
}

fn relationship_target(rels: &str, rel_id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(rels);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id")?.as_deref() == Some(rel_id) {
                    return attribute(&e, b"Target");
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    // Phonetic runs repeat the reading of the string and are not part of its value.
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Text(t) if in_text && !in_phonetic => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) if in_text && !in_phonetic => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Parse an `A1`-style reference into 0-based `(row, col)`.
pub(crate) fn parse_cell_reference(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    let col = letters.bytes().try_fold(0usize, |acc, b| {
        acc.checked_mul(26)?
            .checked_add(usize::from(b - b'A' + 1))
            .filter(|&col| col <= MAX_COLUMNS)
    })?;
    let row: usize = digits.parse().ok()?;
    if row > MAX_ROWS {
        return None;
    }
    Some((row.checked_sub(1)?, col - 1))
}

/// Spreadsheet column name for a 0-based column index (`0` is `A`, `26` is `AA`).
pub(crate) fn column_name(col: usize) -> String {
    let mut name = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

#[derive(Default)]
struct PendingCell {
    row: usize,
    col: usize,
    kind: String,
    value: String,
    inline: String,
}

impl PendingCell {
    fn into_cell(self, shared_strings: &[String]) -> Result<Cell> {
        Ok(match self.kind.as_str() {
            "s" => {
                let index: usize = self
                    .value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid shared string index {:?}", self.value))?;
                let Some(s) = shared_strings.get(index) else {
                    bail!("Shared string index {index} out of range");
                };
                Cell::Text(s.clone())
            }
            "inlineStr" => Cell::Text(self.inline),
            "str" => Cell::Text(self.value),
            "b" => Cell::Bool(self.value.trim() == "1"),
            "e" => Cell::Error(self.value),
            _ if self.value.trim().is_empty() => Cell::Empty,
            _ => match self.value.trim().parse() {
                Ok(v) => Cell::Number(v),
                Err(_) => Cell::Text(self.value),
            },
        })
    }
}

fn place(rows: &mut Vec<Vec<Cell>>, row: usize, col: usize, cell: Cell) -> Result<()> {
    if row >= MAX_ROWS || col >= MAX_COLUMNS {
        bail!("Cell at row {} column {} is outside the worksheet", row + 1, col + 1);
    }
    if cell == Cell::Empty {
        return Ok(());
    }
    if rows.len() <= row {
        rows.resize_with(row + 1, Vec::new);
    }
    let cells = &mut rows[row];
    if cells.len() <= col {
        cells.resize(col + 1, Cell::Empty);
    }
    cells[col] = cell;
    Ok(())
}

fn parse_worksheet(xml: &str, shared_strings: &[String]) -> Result<Vec<Vec<Cell>>> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => start_row(&e, &mut next_row, &mut next_col)?,
                b"c" => {
                    pending = Some(start_cell(&e, next_row, &mut next_col)?);
                }
                b"v" => in_value = true,
                b"t" => in_inline_text = pending.is_some(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    start_row(&e, &mut next_row, &mut next_col)?;
                    next_row += 1;
                }
                // A styled cell without a value.
                b"c" => {
                    start_cell(&e, next_row, &mut next_col)?;
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"row" => next_row += 1,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let (row, col) = (cell.row, cell.col);
                        place(&mut rows, row, col, cell.into_cell(shared_strings)?)?;
                    }
                }
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                _ => {}
            },
            Event::Text(t) => {
                if let Some(cell) = pending.as_mut() {
                    if in_value {
                        cell.value.push_str(&t.unescape()?);
                    } else if in_inline_text {
                        cell.inline.push_str(&t.unescape()?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}

fn start_row(e: &BytesStart<'_>, next_row: &mut usize, next_col: &mut usize) -> Result<()> {
    if let Some(r) = attribute(e, b"r")? {
        let r: usize = r
            .parse()
            .with_context(|| format!("Invalid row number {r:?}"))?;
        if r > MAX_ROWS {
            bail!("Row number {r} is outside the worksheet");
        }
        *next_row = r.saturating_sub(1);
    }
    *next_col = 0;
    Ok(())
}

fn start_cell(e: &BytesStart<'_>, row: usize, next_col: &mut usize) -> Result<PendingCell> {
    let (row, col) = match attribute(e, b"r")? {
        Some(reference) => parse_cell_reference(&reference)
            .with_context(|| format!("Invalid cell reference {reference:?}"))?,
        None => (row, *next_col),
    };
    *next_col = col + 1;
    Ok(PendingCell {
        row,
        col,
        kind: attribute(e, b"t")?.unwrap_or_default(),
        ..PendingCell::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_xlsx;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_cell_reference() {
        assert_eq!(parse_cell_reference("A1"), Some((0, 0)));
        assert_eq!(parse_cell_reference("X16"), Some((15, 23)));
        assert_eq!(parse_cell_reference("AA3"), Some((2, 26)));
        assert_eq!(parse_cell_reference("A0"), None);
        assert_eq!(parse_cell_reference("12"), None);
        assert_eq!(parse_cell_reference("b2"), None);
        assert_eq!(parse_cell_reference("XFD1048576"), Some((1_048_575, 16_383)));
        assert_eq!(parse_cell_reference("XFE1"), None);
        assert_eq!(parse_cell_reference("A1048577"), None);
        assert_eq!(parse_cell_reference("ZZZZZZZZZZZZZZZ1"), None);
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
    }

    #[test]
    fn test_shared_strings_and_formulas() -> Result<()> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default();
            zip.start_file(WORKBOOK, options)?;
            zip.write_all(
                br#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Plate 1" sheetId="1" r:id="rId7"/></sheets></workbook>"#,
            )?;
            zip.start_file(WORKBOOK_RELS, options)?;
            zip.write_all(
                br#"<Relationships><Relationship Id="rId7" Type="worksheet" Target="/xl/worksheets/data.xml"/></Relationships>"#,
            )?;
            zip.start_file(SHARED_STRINGS, options)?;
            zip.write_all(
                br#"<sst><si><t>Sample</t></si><si><r><t>24h </t></r><r><t>A1</t></r><rPh><t>x</t></rPh></si><si><t>mg/L &amp; more</t></si></sst>"#,
            )?;
            zip.start_file("xl/worksheets/data.xml", options)?;
            zip.write_all(
                br#"<worksheet><sheetData>
                <row r="2"><c r="A2" t="s"><v>0</v></c><c r="C2" t="s"><v>1</v></c></row>
                <row r="3"><c r="B3"><f>1+1</f><v>2</v></c><c r="C3" t="str"><f>"a"</f><v>a</v></c><c r="D3" t="b"><v>1</v></c><c r="E3" s="1"/></row>
                <row r="5"><c r="A5" t="s"><v>2</v></c><c r="B5" t="e"><v>#DIV/0!</v></c></row>
                </sheetData></worksheet>"#,
            )?;
            zip.finish()?;
        }
        buf.set_position(0);
        let sheet = read_archive(&mut ZipArchive::new(buf)?)?;
        assert_eq!(sheet.name(), "Plate 1");
        assert_eq!(sheet.num_rows(), 5);
        assert_eq!(sheet.cell_text(0, 0), "");
        assert_eq!(sheet.cell_text(1, 0), "Sample");
        assert_eq!(sheet.cell_text(1, 2), "24h A1");
        assert_eq!(sheet.cell_number(2, 1), Some(2.0));
        assert_eq!(sheet.cell_text(2, 2), "a");
        assert_eq!(sheet.cell(2, 3), &Cell::Bool(true));
        assert_eq!(sheet.cell(2, 4), &Cell::Empty);
        assert_eq!(sheet.cell_text(4, 0), "mg/L & more");
        assert_eq!(sheet.cell(4, 1), &Cell::Error("#DIV/0!".to_string()));
        Ok(())
    }

    #[test]
    fn test_written_workbook() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("book.xlsx");
        let rows = vec![
            vec![Cell::Text("Sample".into()), Cell::Empty, Cell::Text("<1>".into())],
            vec![],
            vec![Cell::Empty, Cell::Number(0.25), Cell::Bool(false)],
        ];
        write_xlsx(&path, "Data", &rows)?;
        let sheet = read_first_worksheet(&path)?;
        assert_eq!(sheet.name(), "Data");
        assert_eq!(sheet.cell_text(0, 0), "Sample");
        assert_eq!(sheet.cell_text(0, 2), "<1>");
        assert_eq!(sheet.cell_number(2, 1), Some(0.25));
        assert_eq!(sheet.cell(2, 2), &Cell::Bool(false));
        Ok(())
    }

    #[test]
    fn test_references_outside_the_worksheet() {
        let sheet = |body: &str| {
            parse_worksheet(
                &format!("<worksheet><sheetData>{body}</sheetData></worksheet>"),
                &[],
            )
        };
        assert!(sheet(r#"<row r="2"><c r="B2"><v>1</v></c></row>"#).is_ok());
        assert!(sheet(r#"<row r="2000000"><c><v>1</v></c></row>"#).is_err());
        assert!(sheet(r#"<row><c r="XFE1"><v>1</v></c></row>"#).is_err());
        assert!(sheet(r#"<row><c r="ZZZZZZZZZZZZZZZ1"><v>1</v></c></row>"#).is_err());
    }

    #[test]
    fn test_not_a_workbook() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, "not a zip")?;
        let err = read_first_worksheet(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.xlsx"));
        Ok(())
    }
}
