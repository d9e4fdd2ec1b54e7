//! Text extraction for uploaded documents.
//!
//! The ingestion pipeline accepts raw bytes plus the uploaded file's name;
//! this module detects the format and returns plain UTF-8 text in document
//! order. Extraction runs in-process, so failures surface as
//! `InvalidArgument` — a file we cannot read is the caller's problem, not a
//! provider outage.

use std::io::Read;

use crate::error::{Error, Result};

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pdf,
    Docx,
    Text,
}

/// Detect the upload format from the filename extension, falling back to
/// magic bytes when the extension is missing or unknown.
pub fn detect_format(name: &str, bytes: &[u8]) -> Option<Format> {
    let ext = name.rsplit('.').next().map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => return Some(Format::Pdf),
        Some("docx") => return Some(Format::Docx),
        Some("txt") | Some("md") | Some("markdown") => return Some(Format::Text),
        _ => {}
    }

    if bytes.starts_with(b"%PDF-") {
        Some(Format::Pdf)
    } else if bytes.starts_with(b"PK\x03\x04") {
        Some(Format::Docx)
    } else if std::str::from_utf8(bytes).is_ok() {
        Some(Format::Text)
    } else {
        None
    }
}

/// Extract plain text from an uploaded document.
pub fn extract_text(name: &str, bytes: &[u8]) -> Result<String> {
    let format = detect_format(name, bytes).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "unsupported document format: '{}' (expected pdf, docx, txt, or md)",
            name
        ))
    })?;

    match format {
        Format::Pdf => extract_pdf(bytes),
        Format::Docx => extract_docx(bytes),
        Format::Text => String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::InvalidArgument("text file is not valid UTF-8".to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::InvalidArgument(format!("PDF extraction failed: {}", e)))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::InvalidArgument(format!("DOCX is not a valid archive: {}", e)))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| Error::InvalidArgument("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| Error::InvalidArgument(format!("DOCX read failed: {}", e)))?;
    }
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(Error::InvalidArgument(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_paragraph_text(&doc_xml)
}

/// Walk the WordprocessingML body collecting `w:t` runs, inserting paragraph
/// breaks at `w:p` boundaries so downstream chunking sees natural breakpoints.
fn extract_paragraph_text(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
                in_text_run = false;
            }
            Ok(quick_xml::events::Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"t" => in_text_run = false,
                    b"p" => {
                        if !out.is_empty() && !out.ends_with("\n\n") {
                            out.push_str("\n\n");
                        }
                    }
                    _ => {}
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidArgument(format!(
                    "DOCX XML parse failed: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(detect_format("spec.PDF", b""), Some(Format::Pdf));
        assert_eq!(detect_format("spec.docx", b""), Some(Format::Docx));
        assert_eq!(detect_format("notes.md", b""), Some(Format::Text));
    }

    #[test]
    fn test_detect_by_magic_bytes() {
        assert_eq!(detect_format("upload", b"%PDF-1.7 ..."), Some(Format::Pdf));
        assert_eq!(
            detect_format("upload", b"PK\x03\x04rest-of-zip"),
            Some(Format::Docx)
        );
        assert_eq!(detect_format("upload", b"plain words"), Some(Format::Text));
    }

    #[test]
    fn test_unknown_binary_rejected() {
        let err = extract_text("blob", &[0xff, 0xfe, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_pdf_rejected() {
        let err = extract_text("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_docx_rejected() {
        let err = extract_text("broken.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_plain_text_passthrough() {
        let text = extract_text("notes.txt", "Login flow.\n\nStep two.".as_bytes()).unwrap();
        assert_eq!(text, "Login flow.\n\nStep two.");
    }

    #[test]
    fn test_docx_paragraph_breaks() {
        let xml = br#"<w:document xmlns:w="ns"><w:body>
            <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second paragraph.</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = extract_paragraph_text(xml).unwrap();
        assert_eq!(text, "First paragraph.\n\nSecond paragraph.");
    }
}
