//! Structural text extraction for Word (.docx) documents.
//!
//! Reads `word/document.xml` from the OOXML ZIP container with a streaming
//! parser and recovers the structure the hybrid extractor needs: paragraphs,
//! tables (headers + rows), and heading paragraphs. Connectors and the upload
//! path supply bytes; this module returns a [`DocxContent`].

use std::collections::BTreeMap;
use std::io::Read;

use quick_xml::events::Event;

/// Maximum decompressed bytes to read from a ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction error. No panic; callers surface the reason and reject the input.
#[derive(Debug)]
pub enum DocxError {
    Archive(String),
    Xml(String),
    /// The document parsed but carries too little text to be a contract.
    TooLittleText(usize),
}

impl std::fmt::Display for DocxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocxError::Archive(e) => write!(f, "Cannot read file as a Word document: {}", e),
            DocxError::Xml(e) => write!(f, "Word document XML is malformed: {}", e),
            DocxError::TooLittleText(n) => write!(
                f,
                "Word document appears to be empty or contains very little text ({} chars). \
                 Please upload a contract document with substantive content.",
                n
            ),
        }
    }
}

impl std::error::Error for DocxError {}

/// A table recovered from the document body.
///
/// The first row is treated as the header row. `rows` maps header → cell so
/// downstream parsing tolerates column reordering; `raw_rows` preserves the
/// original cell order.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
    pub raw_rows: Vec<Vec<String>>,
}

/// A heading paragraph identified by its Word style.
#[derive(Debug, Clone)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub style: String,
}

/// Complete structured content of one document.
#[derive(Debug, Clone, Default)]
pub struct DocxContent {
    /// Non-empty body paragraphs in document order (table text excluded).
    pub paragraphs: Vec<String>,
    pub tables: Vec<Table>,
    pub headings: Vec<Heading>,
}

impl DocxContent {
    /// Paragraph text joined with newlines.
    pub fn full_text(&self) -> String {
        self.paragraphs.join("\n")
    }

    /// Full text plus a rendered `--- TABLES ---` block, so pattern
    /// extractors see table content even when a field only appears there.
    pub fn combined_text(&self) -> String {
        let mut out = self.full_text();
        if !self.tables.is_empty() {
            out.push_str("\n\n--- TABLES ---\n\n");
            let blocks: Vec<String> = self.tables.iter().map(render_table).collect();
            out.push_str(&blocks.join("\n\n"));
        }
        out
    }
}

fn render_table(table: &Table) -> String {
    let mut lines = Vec::new();
    if !table.headers.is_empty() {
        let header_line = table.headers.join(" | ");
        let rule = "-".repeat(header_line.len());
        lines.push(header_line);
        lines.push(rule);
    }
    for row in table.raw_rows.iter().skip(1) {
        lines.push(row.join(" | "));
    }
    lines.join("\n")
}

/// Parse a .docx payload into structured content.
pub fn parse_docx(bytes: &[u8]) -> Result<DocxContent, DocxError> {
    let xml = read_document_xml(bytes)?;
    parse_document_xml(&xml)
}

/// Validate that the payload is a readable Word document with enough text
/// to plausibly be a contract. Returns the parsed content on success so the
/// caller does not parse twice.
pub fn validate_docx(bytes: &[u8], min_chars: usize) -> Result<DocxContent, DocxError> {
    let content = parse_docx(bytes)?;
    let text_len: usize = content.paragraphs.iter().map(|p| p.len()).sum();
    if text_len < min_chars {
        return Err(DocxError::TooLittleText(text_len));
    }
    Ok(content)
}

fn read_document_xml(bytes: &[u8]) -> Result<Vec<u8>, DocxError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| DocxError::Archive(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| DocxError::Archive("word/document.xml not found".to_string()))?;
    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| DocxError::Archive(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(DocxError::Archive(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    Ok(xml)
}

fn parse_document_xml(xml: &[u8]) -> Result<DocxContent, DocxError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut content = DocxContent::default();

    // Table state. Nested tables are flattened into the innermost cell.
    let mut tbl_depth = 0usize;
    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut current_cell = String::new();

    // Paragraph state.
    let mut para_buf = String::new();
    let mut para_style: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => tbl_depth += 1,
                b"tr" if tbl_depth == 1 => current_row = Vec::new(),
                b"tc" if tbl_depth == 1 => current_cell.clear(),
                b"p" if tbl_depth == 0 => {
                    para_buf.clear();
                    para_style = None;
                }
                b"pStyle" if tbl_depth == 0 => {
                    para_style = read_val_attribute(&e);
                }
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"pStyle" && tbl_depth == 0 {
                    para_style = read_val_attribute(&e);
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().unwrap_or_default();
                if tbl_depth > 0 {
                    current_cell.push_str(&text);
                } else {
                    para_buf.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tc" if tbl_depth == 1 => {
                    current_row.push(current_cell.trim().to_string());
                    current_cell.clear();
                }
                b"tr" if tbl_depth == 1 => {
                    if !current_row.is_empty() {
                        raw_rows.push(std::mem::take(&mut current_row));
                    }
                }
                b"tbl" => {
                    tbl_depth = tbl_depth.saturating_sub(1);
                    if tbl_depth == 0 && !raw_rows.is_empty() {
                        content.tables.push(build_table(std::mem::take(&mut raw_rows)));
                    }
                }
                b"p" if tbl_depth == 0 => {
                    let text = para_buf.trim();
                    if !text.is_empty() {
                        if let Some(style) = para_style.take() {
                            if let Some(level) = heading_level(&style) {
                                content.headings.push(Heading {
                                    level,
                                    text: text.to_string(),
                                    style,
                                });
                            }
                        }
                        content.paragraphs.push(text.to_string());
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocxError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(content)
}

fn read_val_attribute(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == b"val" {
            String::from_utf8(a.value.to_vec()).ok()
        } else {
            None
        }
    })
}

fn heading_level(style: &str) -> Option<u8> {
    style
        .strip_prefix("Heading")
        .and_then(|rest| rest.trim().parse::<u8>().ok())
        .or(if style.starts_with("Heading") {
            Some(1)
        } else {
            None
        })
}

fn build_table(raw_rows: Vec<Vec<String>>) -> Table {
    let headers = raw_rows[0].clone();
    let rows = raw_rows
        .iter()
        .skip(1)
        .map(|raw| {
            raw.iter()
                .enumerate()
                .map(|(i, cell)| {
                    let key = headers
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("col_{}", i));
                    (key, cell.clone())
                })
                .collect()
        })
        .collect();
    Table {
        headers,
        rows,
        raw_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_from_xml(xml: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    const NS: &str = "xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"";

    #[test]
    fn invalid_zip_is_an_archive_error() {
        let err = parse_docx(b"not a zip").unwrap_err();
        assert!(matches!(err, DocxError::Archive(_)));
    }

    #[test]
    fn missing_document_xml_is_an_archive_error() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = parse_docx(&buf).unwrap_err();
        assert!(matches!(err, DocxError::Archive(_)));
    }

    #[test]
    fn extracts_paragraphs_in_order() {
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document {NS}><w:body>\
             <w:p><w:r><w:t>CONTRACT NUMBER: W911NF-25-D-0001</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Second </w:t></w:r><w:r><w:t>paragraph</w:t></w:r></w:p>\
             <w:p><w:r><w:t>   </w:t></w:r></w:p>\
             </w:body></w:document>"
        );
        let content = parse_docx(&docx_from_xml(&xml)).unwrap();
        assert_eq!(
            content.paragraphs,
            vec![
                "CONTRACT NUMBER: W911NF-25-D-0001".to_string(),
                "Second paragraph".to_string()
            ]
        );
    }

    #[test]
    fn extracts_table_headers_and_rows() {
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document {NS}><w:body>\
             <w:p><w:r><w:t>Intro</w:t></w:r></w:p>\
             <w:tbl>\
             <w:tr><w:tc><w:p><w:r><w:t>CLIN</w:t></w:r></w:p></w:tc>\
                   <w:tc><w:p><w:r><w:t>Description</w:t></w:r></w:p></w:tc></w:tr>\
             <w:tr><w:tc><w:p><w:r><w:t>0001</w:t></w:r></w:p></w:tc>\
                   <w:tc><w:p><w:r><w:t>Program management</w:t></w:r></w:p></w:tc></w:tr>\
             </w:tbl>\
             </w:body></w:document>"
        );
        let content = parse_docx(&docx_from_xml(&xml)).unwrap();
        assert_eq!(content.tables.len(), 1);
        let table = &content.tables[0];
        assert_eq!(table.headers, vec!["CLIN", "Description"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("CLIN").unwrap(), "0001");
        assert_eq!(table.rows[0].get("Description").unwrap(), "Program management");
        // Table text does not leak into the paragraph list.
        assert_eq!(content.paragraphs, vec!["Intro".to_string()]);
        // But it does appear in the combined text.
        assert!(content.combined_text().contains("--- TABLES ---"));
        assert!(content.combined_text().contains("0001 | Program management"));
    }

    #[test]
    fn detects_heading_styles() {
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document {NS}><w:body>\
             <w:p><w:pPr><w:pStyle w:val=\"Heading1\"/></w:pPr>\
                 <w:r><w:t>STATEMENT OF WORK</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Body text.</w:t></w:r></w:p>\
             </w:body></w:document>"
        );
        let content = parse_docx(&docx_from_xml(&xml)).unwrap();
        assert_eq!(content.headings.len(), 1);
        assert_eq!(content.headings[0].level, 1);
        assert_eq!(content.headings[0].text, "STATEMENT OF WORK");
    }

    #[test]
    fn validate_rejects_near_empty_documents() {
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document {NS}><w:body>\
             <w:p><w:r><w:t>tiny</w:t></w:r></w:p></w:body></w:document>"
        );
        let err = validate_docx(&docx_from_xml(&xml), 50).unwrap_err();
        assert!(matches!(err, DocxError::TooLittleText(_)));
        assert!(err.to_string().contains("very little text"));
    }
}
