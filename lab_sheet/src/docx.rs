//!
//! Reader for the paragraphs of a word-processor document (`.docx`).
//!
//! A paragraph is reduced to its text and, for numbered-list paragraphs, the
//! number format of its list level as declared in `word/numbering.xml`.
//! Numbering is taken from the paragraph itself, else from its paragraph
//! style in `word/styles.xml` and the styles that one is based on.
//!

use crate::xlsx::{attribute, read_entry, read_optional_entry};
use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

const DOCUMENT: &str = "word/document.xml";
const NUMBERING: &str = "word/numbering.xml";
const STYLES: &str = "word/styles.xml";
/// Longest `basedOn` chain followed when resolving a paragraph style.
const MAX_STYLE_DEPTH: usize = 16;

/// Number format of a list paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListStyle {
    /// `1.`, `2.`, `3.` ...
    Decimal,
    /// `A.`, `B.`, `C.` ... in either case.
    Letter,
    /// Any other format (bullets, roman numerals), by its `numFmt` name.
    Other(String),
}

impl ListStyle {
    fn from_num_fmt(num_fmt: &str) -> Self {
        match num_fmt {
            "decimal" => ListStyle::Decimal,
            "upperLetter" | "lowerLetter" => ListStyle::Letter,
            other => ListStyle::Other(other.to_string()),
        }
    }

    pub(crate) fn num_fmt(&self) -> &str {
        match self {
            ListStyle::Decimal => "decimal",
            ListStyle::Letter => "upperLetter",
            ListStyle::Other(name) => name,
        }
    }
}

/// One paragraph of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Text of all runs; tabs become `\t` and line breaks `\n`.
    pub text: String,
    /// List membership, `None` for ordinary paragraphs.
    pub list: Option<ListStyle>,
}

impl Paragraph {
    /// An ordinary paragraph.
    pub fn plain(text: impl Into<String>) -> Self {
        Paragraph {
            text: text.into(),
            list: None,
        }
    }

    /// A numbered-list paragraph.
    pub fn list_item(text: impl Into<String>, style: ListStyle) -> Self {
        Paragraph {
            text: text.into(),
            list: Some(style),
        }
    }
}

/// Read all paragraphs of the document at `path`, in document order.
pub fn read_paragraphs(path: &Path) -> Result<Vec<Paragraph>> {
    let file = File::open(path).with_context(|| format!("While opening {path:?}"))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("{path:?} is not a docx document"))?;
    let numbering = match read_optional_entry(&mut archive, NUMBERING)? {
        Some(xml) => Numbering::parse(&xml).with_context(|| format!("While reading {path:?}"))?,
        None => Numbering::default(),
    };
    let styles = match read_optional_entry(&mut archive, STYLES)? {
        Some(xml) => Styles::parse(&xml).with_context(|| format!("While reading {path:?}"))?,
        None => Styles::default(),
    };
    let document = read_entry(&mut archive, DOCUMENT)?;
    parse_document(&document, &numbering, &styles)
        .with_context(|| format!("While reading {path:?}"))
}

/// Resolution of `numId` and level to a number format.
#[derive(Debug, Default)]
struct Numbering {
    abstract_of_num: HashMap<String, String>,
    format_of_level: HashMap<(String, String), String>,
}

impl Numbering {
    fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut numbering = Numbering::default();
        let mut abstract_id: Option<String> = None;
        let mut level: Option<String> = None;
        let mut num_id: Option<String> = None;
        loop {
            let (e, is_start) = match reader.read_event()? {
                Event::Start(e) => (e, true),
                Event::Empty(e) => (e, false),
                Event::End(e) => {
                    match e.local_name().as_ref() {
                        b"abstractNum" => abstract_id = None,
                        b"lvl" => level = None,
                        b"num" => num_id = None,
                        _ => {}
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };
            match e.local_name().as_ref() {
                b"abstractNum" if is_start => abstract_id = attribute(&e, b"abstractNumId")?,
                b"lvl" if is_start => level = attribute(&e, b"ilvl")?,
                b"num" if is_start => num_id = attribute(&e, b"numId")?,
                b"numFmt" => {
                    if let (Some(abstract_id), Some(level), Some(fmt)) =
                        (&abstract_id, &level, attribute(&e, b"val")?)
                    {
                        numbering
                            .format_of_level
                            .insert((abstract_id.clone(), level.clone()), fmt);
                    }
                }
                b"abstractNumId" => {
                    if let (Some(num_id), Some(abstract_id)) = (&num_id, attribute(&e, b"val")?) {
                        numbering
                            .abstract_of_num
                            .insert(num_id.clone(), abstract_id);
                    }
                }
                _ => {}
            }
        }
        Ok(numbering)
    }

    fn style(&self, num_id: &str, level: &str) -> Option<ListStyle> {
        let abstract_id = self.abstract_of_num.get(num_id)?;
        self.format_of_level
            .get(&(abstract_id.clone(), level.to_string()))
            .map(|fmt| ListStyle::from_num_fmt(fmt))
    }
}

/// List properties of one paragraph style.
#[derive(Debug, Default)]
struct StyleNumbering {
    num_id: Option<String>,
    level: Option<String>,
    based_on: Option<String>,
}

/// Numbering carried by paragraph styles, by style ID.
#[derive(Debug, Default)]
struct Styles {
    by_id: HashMap<String, StyleNumbering>,
}

impl Styles {
    fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut styles = Styles::default();
        let mut current: Option<(String, StyleNumbering)> = None;
        loop {
            let e = match reader.read_event()? {
                Event::Start(e) if e.local_name().as_ref() == b"style" => {
                    current = attribute(&e, b"styleId")?.map(|id| (id, StyleNumbering::default()));
                    continue;
                }
                Event::Start(e) | Event::Empty(e) => e,
                Event::End(e) => {
                    if e.local_name().as_ref() == b"style" {
                        if let Some((id, style)) = current.take() {
                            styles.by_id.insert(id, style);
                        }
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };
            let Some((_, style)) = current.as_mut() else {
                continue;
            };
            match e.local_name().as_ref() {
                b"numId" => style.num_id = attribute(&e, b"val")?,
                b"ilvl" => style.level = attribute(&e, b"val")?,
                b"basedOn" => style.based_on = attribute(&e, b"val")?,
                _ => {}
            }
        }
        Ok(styles)
    }

    /// `numId` and level of `style_id`, inherited along its `basedOn` chain.
    fn numbering(&self, style_id: &str) -> (Option<&str>, Option<&str>) {
        let (mut num_id, mut level) = (None, None);
        let mut next = Some(style_id);
        for _ in 0..MAX_STYLE_DEPTH {
            let Some(style) = next.and_then(|id| self.by_id.get(id)) else {
                break;
            };
            num_id = num_id.or(style.num_id.as_deref());
            level = level.or(style.level.as_deref());
            next = style.based_on.as_deref();
        }
        (num_id, level)
    }
}

#[derive(Default)]
struct OpenParagraph {
    text: String,
    style: Option<String>,
    num_id: Option<String>,
    level: Option<String>,
}

impl OpenParagraph {
    fn into_paragraph(self, numbering: &Numbering, styles: &Styles) -> Paragraph {
        let (style_num_id, style_level) = self
            .style
            .as_deref()
            .map_or((None, None), |id| styles.numbering(id));
        let num_id = self.num_id.as_deref().or(style_num_id);
        let level = self.level.as_deref().or(style_level).unwrap_or("0");
        // numId 0 explicitly removes numbering.
        let list = num_id
            .filter(|&id| id != "0")
            .and_then(|id| numbering.style(id, level));
        Paragraph {
            text: self.text,
            list,
        }
    }
}

fn parse_document(xml: &str, numbering: &Numbering, styles: &Styles) -> Result<Vec<Paragraph>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    // Paragraphs nest inside text boxes; each is emitted when it closes.
    let mut open: Vec<OpenParagraph> = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => open.push(OpenParagraph::default()),
                b"t" => in_text = true,
                b"pStyle" => set_style(&mut open, attribute(&e, b"val")?),
                b"numId" => set_num_id(&mut open, attribute(&e, b"val")?),
                b"ilvl" => set_level(&mut open, attribute(&e, b"val")?),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(Paragraph::plain(String::new())),
                b"pStyle" => set_style(&mut open, attribute(&e, b"val")?),
                b"numId" => set_num_id(&mut open, attribute(&e, b"val")?),
                b"ilvl" => set_level(&mut open, attribute(&e, b"val")?),
                b"tab" => push_text(&mut open, "\t"),
                b"br" | b"cr" => push_text(&mut open, "\n"),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(p) = open.pop() {
                        paragraphs.push(p.into_paragraph(numbering, styles));
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_text => push_text(&mut open, &t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

fn push_text(open: &mut [OpenParagraph], text: &str) {
    if let Some(p) = open.last_mut() {
        p.text.push_str(text);
    }
}

fn set_style(open: &mut [OpenParagraph], style: Option<String>) {
    if let Some(p) = open.last_mut() {
        p.style = style;
    }
}

fn set_num_id(open: &mut [OpenParagraph], num_id: Option<String>) {
    if let Some(p) = open.last_mut() {
        p.num_id = num_id;
    }
}

fn set_level(open: &mut [OpenParagraph], level: Option<String>) {
    if let Some(p) = open.last_mut() {
        p.level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_docx;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const NUMBERING_XML: &str = r#"<w:numbering xmlns:w="w">
        <w:abstractNum w:abstractNumId="4">
            <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="upperLetter"/></w:lvl>
            <w:lvl w:ilvl="1"><w:numFmt w:val="lowerRoman"/></w:lvl>
        </w:abstractNum>
        <w:abstractNum w:abstractNumId="9">
            <w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl>
        </w:abstractNum>
        <w:num w:numId="1"><w:abstractNumId w:val="9"/></w:num>
        <w:num w:numId="2"><w:abstractNumId w:val="4"/></w:num>
    </w:numbering>"#;

    #[test]
    fn test_parse_document() -> Result<()> {
        let numbering = Numbering::parse(NUMBERING_XML)?;
        let document = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Layout for sets </w:t></w:r><w:r><w:t>A0, A1.</w:t></w:r></w:p>
            <w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="2"/></w:numPr></w:pPr><w:r><w:t>0</w:t></w:r></w:p>
            <w:p><w:pPr><w:numPr><w:ilvl w:val="1"/><w:numId w:val="2"/></w:numPr></w:pPr><w:r><w:t>nested</w:t></w:r></w:p>
            <w:p><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t xml:space="preserve">926A </w:t><w:tab/><w:t>pfb</w:t></w:r></w:p>
            <w:p><w:pPr><w:numPr><w:numId w:val="0"/></w:numPr></w:pPr><w:r><w:t>B4.  Blank</w:t></w:r></w:p>
            <w:p/>
        </w:body></w:document>"#;
        let paragraphs = parse_document(document, &numbering, &Styles::default())?;
        assert_eq!(
            paragraphs,
            vec![
                Paragraph::plain("Layout for sets A0, A1."),
                Paragraph::list_item("0", ListStyle::Letter),
                Paragraph::list_item("nested", ListStyle::Other("lowerRoman".into())),
                Paragraph::list_item("926A \tpfb", ListStyle::Decimal),
                Paragraph::plain("B4.  Blank"),
                Paragraph::plain(""),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_numbering_from_paragraph_style() -> Result<()> {
        let numbering = Numbering::parse(NUMBERING_XML)?;
        let styles = Styles::parse(
            r#"<w:styles xmlns:w="w">
            <w:docDefaults><w:pPrDefault><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr></w:pPr></w:pPrDefault></w:docDefaults>
            <w:style w:type="paragraph" w:styleId="Empty"/>
            <w:style w:type="paragraph" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
            <w:style w:type="paragraph" w:styleId="RowList">
                <w:basedOn w:val="Normal"/>
                <w:pPr><w:numPr><w:numId w:val="2"/></w:numPr></w:pPr>
            </w:style>
            <w:style w:type="paragraph" w:styleId="RowListNote"><w:basedOn w:val="RowList"/></w:style>
            <w:style w:type="paragraph" w:styleId="ColumnList">
                <w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr>
            </w:style>
            <w:style w:type="paragraph" w:styleId="Loop"><w:basedOn w:val="Loop"/></w:style>
            </w:styles>"#,
        )?;
        let document = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:pPr><w:pStyle w:val="Normal"/></w:pPr><w:r><w:t>Plates labelled P1</w:t></w:r></w:p>
            <w:p><w:pPr><w:pStyle w:val="RowList"/></w:pPr><w:r><w:t>0</w:t></w:r></w:p>
            <w:p><w:pPr><w:pStyle w:val="RowListNote"/></w:pPr><w:r><w:t>pfb6.4.2</w:t></w:r></w:p>
            <w:p><w:pPr><w:pStyle w:val="RowList"/><w:numPr><w:ilvl w:val="1"/></w:numPr></w:pPr><w:r><w:t>nested</w:t></w:r></w:p>
            <w:p><w:pPr><w:pStyle w:val="ColumnList"/></w:pPr><w:r><w:t>926</w:t></w:r></w:p>
            <w:p><w:pPr><w:pStyle w:val="ColumnList"/><w:numPr><w:numId w:val="0"/></w:numPr></w:pPr><w:r><w:t>A5. Blank</w:t></w:r></w:p>
            <w:p><w:pPr><w:pStyle w:val="Loop"/></w:pPr><w:r><w:t>prose</w:t></w:r></w:p>
            <w:p><w:pPr><w:pStyle w:val="Missing"/></w:pPr><w:r><w:t>more prose</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(
            parse_document(document, &numbering, &styles)?,
            vec![
                Paragraph::plain("Plates labelled P1"),
                Paragraph::list_item("0", ListStyle::Letter),
                Paragraph::list_item("pfb6.4.2", ListStyle::Letter),
                Paragraph::list_item("nested", ListStyle::Other("lowerRoman".into())),
                Paragraph::list_item("926", ListStyle::Decimal),
                Paragraph::plain("A5. Blank"),
                Paragraph::plain("prose"),
                Paragraph::plain("more prose"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_written_document() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("layout.docx");
        let paragraphs = vec![
            Paragraph::plain("Plates labelled D1 & D2"),
            Paragraph::list_item("0", ListStyle::Letter),
            Paragraph::list_item("926A\tpfb", ListStyle::Decimal),
            Paragraph::list_item("bullet", ListStyle::Other("bullet".into())),
            Paragraph::plain(""),
        ];
        write_docx(&path, &paragraphs)?;
        assert_eq!(read_paragraphs(&path)?, paragraphs);
        Ok(())
    }
}
