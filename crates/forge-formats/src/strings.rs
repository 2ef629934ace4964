//! Printable-string harvesting.
//!
//! Candidate passwords are often lying around in neighboring files, so the
//! cracker feeds file contents through this module. Office and PDF documents
//! get real text extraction (raw bytes of a compressed container yield
//! nothing useful); everything else falls back to ASCII runs.

use std::io::{Cursor, Read};

use quick_xml::events::Event as XmlEvent;

/// Minimum length of a printable run to count as a string.
const MIN_STRING_LEN: usize = 4;

/// Extract candidate strings from a file's raw bytes.
///
/// `mime` and `extension` route OOXML spreadsheets/documents and PDFs to
/// their text extractors; extraction failures quietly fall back to the ASCII
/// scan (a truncated or odd file should still contribute what it can).
pub fn extract_strings(bytes: &[u8], mime: &str, extension: &str) -> Vec<String> {
    let mime = mime.to_ascii_lowercase();
    let extension = extension.to_ascii_lowercase();

    let ooxml = mime == "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        || mime == "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        || extension == "xlsx"
        || extension == "docx";
    if ooxml {
        if let Some(lines) = ooxml_text(bytes) {
            return lines;
        }
    }

    let pdf = mime == "application/pdf" || mime == "application/x-pdf" || extension == "pdf";
    if pdf {
        if let Some(lines) = pdf_text(bytes) {
            return lines;
        }
    }

    extract_ascii_strings(bytes)
}

/// Printable-ASCII runs of at least [`MIN_STRING_LEN`] characters, one string
/// per run.
pub fn extract_ascii_strings(bytes: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut run = String::new();
    for &b in bytes {
        if (0x20..=0x7E).contains(&b) {
            run.push(b as char);
        } else {
            if run.len() >= MIN_STRING_LEN {
                out.push(std::mem::take(&mut run));
            }
            run.clear();
        }
    }
    if run.len() >= MIN_STRING_LEN {
        out.push(run);
    }
    out
}

/// Text content of every XML part in an OOXML container.
fn ooxml_text(bytes: &[u8]) -> Option<Vec<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    let mut lines = Vec::new();
    for i in 0..archive.len() {
        let Ok(mut file) = archive.by_index(i) else {
            continue;
        };
        if !file.name().ends_with(".xml") {
            continue;
        }
        let mut xml = String::new();
        if file.read_to_string(&mut xml).is_err() {
            continue;
        }
        let mut reader = quick_xml::Reader::from_str(&xml);
        reader.config_mut().trim_text(true);
        loop {
            match reader.read_event() {
                Ok(XmlEvent::Text(text)) => {
                    if let Ok(text) = text.unescape() {
                        for line in text.lines() {
                            let line = line.trim();
                            if !line.is_empty() {
                                lines.push(line.to_string());
                            }
                        }
                    }
                }
                Ok(XmlEvent::Eof) | Err(_) => break,
                _ => {}
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines)
    }
}

/// Text content of every page of a PDF.
fn pdf_text(bytes: &[u8]) -> Option<Vec<String>> {
    let doc = lopdf::Document::load_mem(bytes).ok()?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let text = doc.extract_text(&pages).ok()?;
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines)
    }
}

/// Scan harvested lines for BitLocker recovery keys: eight groups of six
/// digits, single non-digit separators, each group divisible by 11.
pub fn find_recovery_keys<'a, I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter(|line| contains_recovery_key(line))
        .map(str::to_string)
        .collect()
}

fn contains_recovery_key(line: &str) -> bool {
    let bytes = line.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            if recovery_key_at(bytes, i) {
                return true;
            }
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    false
}

fn recovery_key_at(bytes: &[u8], start: usize) -> bool {
    let mut pos = start;
    for group in 0..8 {
        let run_start = pos;
        let mut value: u32 = 0;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            value = value * 10 + u32::from(bytes[pos] - b'0');
            pos += 1;
        }
        if pos - run_start != 6 || value % 11 != 0 {
            return false;
        }
        if group < 7 {
            // Exactly one non-digit separator between groups.
            if pos >= bytes.len() || bytes[pos].is_ascii_digit() {
                return false;
            }
            pos += 1;
            if pos >= bytes.len() || !bytes[pos].is_ascii_digit() {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ascii_runs_respect_minimum_length() {
        let bytes = b"ab\x00password\x01hi\x02hunter2\xFF";
        let strings = extract_ascii_strings(bytes);
        assert_eq!(strings, vec!["password".to_string(), "hunter2".to_string()]);
    }

    #[test]
    fn ascii_run_at_end_of_buffer_is_kept() {
        assert_eq!(extract_ascii_strings(b"\x00tail"), vec!["tail".to_string()]);
    }

    #[test]
    fn ooxml_text_is_extracted_from_xml_parts() {
        let mut cursor = Cursor::new(Vec::new());
        {
            use std::io::Write;
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("word/document.xml", options).unwrap();
            writer
                .write_all(
                    b"<?xml version=\"1.0\"?><w:document><w:p><w:t>swordfish</w:t></w:p>\
                      <w:p><w:t>letmein99</w:t></w:p></w:document>",
                )
                .unwrap();
            writer.start_file("word/media/blob.bin", options).unwrap();
            writer.write_all(&[0u8; 32]).unwrap();
            writer.finish().unwrap();
        }
        let strings = extract_strings(cursor.get_ref(), "", "docx");
        assert_eq!(strings, vec!["swordfish".to_string(), "letmein99".to_string()]);
    }

    #[test]
    fn broken_ooxml_falls_back_to_ascii() {
        let strings = extract_strings(b"not a zip but has words", "", "docx");
        assert_eq!(strings, vec!["not a zip but has words".to_string()]);
    }

    #[test]
    fn recovery_key_groups_must_divide_by_11() {
        let valid = "key: 111111-222222-333333-444444-555555-666666-715418-036663";
        let bad_group = "key: 111111-222222-333333-444444-555555-666666-715418-036664";
        let short_group = "111111-222222-333333-444444-555555-666666-715418-03666";
        let lines = vec![valid, bad_group, short_group, "no digits here"];
        assert_eq!(find_recovery_keys(lines), vec![valid.to_string()]);
    }

    #[test]
    fn recovery_key_needs_eight_groups() {
        let seven = "111111-222222-333333-444444-555555-666666-715418";
        assert!(find_recovery_keys(vec![seven]).is_empty());
    }
}
