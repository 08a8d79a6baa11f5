// Word document text: the paragraphs of word/document.xml joined by newlines.

use crate::error::{ReconError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

pub fn read_docx_text(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ReconError::extraction(path, format!("{}: {}", DOCUMENT_PART, e)))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    document_text(&xml)
}

// Concatenate `w:t` runs per paragraph; `w:tab` and `w:br` become a tab and
// a newline.
pub fn document_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().into_inner() {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => match e.local_name().into_inner() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(ref e) if in_text => {
                current.push_str(&e.unescape()?);
            }
            Event::End(ref e) => match e.local_name().into_inner() {
                b"t" => in_text = false,
                b"p" if in_paragraph => {
                    paragraphs.push(std::mem::take(&mut current));
                    in_paragraph = false;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs.join("\n"))
}
