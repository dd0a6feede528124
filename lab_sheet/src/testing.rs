//! Writers for minimal workbooks and documents, used to build test inputs.

use crate::docx::{ListStyle, Paragraph};
use crate::sheet::Cell;
use crate::xlsx::column_name;
use anyhow::Result;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const WORKBOOK_XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

fn write_archive(path: &Path, entries: &[(&str, String)]) -> Result<()> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(path)?));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(contents.as_bytes())?;
    }
    zip.finish()?.flush()?;
    Ok(())
}

/// Write `rows` as the only worksheet of a workbook at `path`.
/// Text is stored as inline strings, so no shared string table is written.
pub fn write_xlsx(path: &Path, sheet_name: &str, rows: &[Vec<Cell>]) -> Result<()> {
    let mut sheet_data = String::new();
    for (r, cells) in rows.iter().enumerate() {
        write!(sheet_data, r#"<row r="{}">"#, r + 1)?;
        for (c, cell) in cells.iter().enumerate() {
            let reference = format!("{}{}", column_name(c), r + 1);
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => write!(
                    sheet_data,
                    r#"<c r="{reference}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    escape(s.as_str())
                )?,
                Cell::Number(v) => write!(sheet_data, r#"<c r="{reference}"><v>{v}</v></c>"#)?,
                Cell::Bool(b) => write!(
                    sheet_data,
                    r#"<c r="{reference}" t="b"><v>{}</v></c>"#,
                    u8::from(*b)
                )?,
                Cell::Error(e) => write!(
                    sheet_data,
                    r#"<c r="{reference}" t="e"><v>{}</v></c>"#,
                    escape(e.as_str())
                )?,
            }
        }
        sheet_data.push_str("</row>");
    }

    write_archive(
        path,
        &[
            (
                "[Content_Types].xml",
                format!(
                    r#"{WORKBOOK_XML_HEADER}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#
                ),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"{WORKBOOK_XML_HEADER}<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                    escape(sheet_name)
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"{WORKBOOK_XML_HEADER}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"{WORKBOOK_XML_HEADER}<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
                ),
            ),
        ],
    )
}

/// Write `paragraphs` as the body of a document at `path`.
/// Every list style used gets its own single-level numbering definition.
pub fn write_docx(path: &Path, paragraphs: &[Paragraph]) -> Result<()> {
    let mut styles: Vec<&ListStyle> = Vec::new();
    let mut body = String::new();
    for paragraph in paragraphs {
        body.push_str("<w:p>");
        if let Some(style) = &paragraph.list {
            let num_id = match styles.iter().position(|&s| s == style) {
                Some(index) => index + 1,
                None => {
                    styles.push(style);
                    styles.len()
                }
            };
            write!(
                body,
                r#"<w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="{num_id}"/></w:numPr></w:pPr>"#
            )?;
        }
        body.push_str("<w:r>");
        for (i, line) in paragraph.text.split('\n').enumerate() {
            if i > 0 {
                body.push_str("<w:br/>");
            }
            for (j, part) in line.split('\t').enumerate() {
                if j > 0 {
                    body.push_str("<w:tab/>");
                }
                if !part.is_empty() {
                    write!(body, r#"<w:t xml:space="preserve">{}</w:t>"#, escape(part))?;
                }
            }
        }
        body.push_str("</w:r></w:p>");
    }

    let mut numbering = String::new();
    for (index, style) in styles.iter().enumerate() {
        write!(
            numbering,
            r#"<w:abstractNum w:abstractNumId="{index}"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="{}"/></w:lvl></w:abstractNum>"#,
            style.num_fmt()
        )?;
    }
    for index in 0..styles.len() {
        write!(
            numbering,
            r#"<w:num w:numId="{}"><w:abstractNumId w:val="{index}"/></w:num>"#,
            index + 1
        )?;
    }

    const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
    write_archive(
        path,
        &[
            (
                "word/document.xml",
                format!(
                    r#"{WORKBOOK_XML_HEADER}<w:document xmlns:w="{W}"><w:body>{body}</w:body></w:document>"#
                ),
            ),
            (
                "word/numbering.xml",
                format!(r#"{WORKBOOK_XML_HEADER}<w:numbering xmlns:w="{W}">{numbering}</w:numbering>"#),
            ),
        ],
    )
}
