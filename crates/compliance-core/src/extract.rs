//! Document text extraction
//!
//! Converts raw bytes (PDF, DOCX, plain text) into plain text plus position
//! metadata. The filename is used only for extension sniffing. Extraction
//! failures are fatal to the request and never retried.

use crate::error::{ComplianceError, Result};
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

/// Format-specific position metadata
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionMetadata {
    Pdf {
        /// Byte offset at which each page begins in the extracted text.
        page_map: BTreeMap<usize, u32>,
        total_pages: u32,
    },
    Docx {
        paragraphs: usize,
    },
    Text,
}

impl ExtractionMetadata {
    pub fn page_map(&self) -> Option<&BTreeMap<usize, u32>> {
        match self {
            ExtractionMetadata::Pdf { page_map, .. } => Some(page_map),
            _ => None,
        }
    }
}

/// Extracted text plus its metadata
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub metadata: ExtractionMetadata,
}

/// Extract plain text from a document, dispatching on the file extension.
pub fn extract(content: &[u8], filename: &str) -> Result<ExtractedDocument> {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "pdf" => extract_pdf(content),
        "docx" | "doc" => extract_docx(content),
        "txt" | "md" | "markdown" => {
            let text = String::from_utf8(content.to_vec())
                .map_err(|e| ComplianceError::ExtractionFailed(anyhow!(e)))?;
            Ok(ExtractedDocument {
                text,
                metadata: ExtractionMetadata::Text,
            })
        }
        _ => Err(ComplianceError::UnsupportedFormat { extension }),
    }
}

/// Extract PDF text page by page, prefixing each page with a `[PAGE n]`
/// marker and recording the offset at which the page begins.
fn extract_pdf(content: &[u8]) -> Result<ExtractedDocument> {
    let doc = lopdf::Document::load_mem(content)
        .map_err(|e| ComplianceError::ExtractionFailed(anyhow!(e)))?;

    let mut text = String::new();
    let mut page_map = BTreeMap::new();
    let pages = doc.get_pages();
    let total_pages = pages.len() as u32;

    for page_num in pages.keys() {
        let page_text = doc
            .extract_text(&[*page_num])
            .map_err(|e| ComplianceError::ExtractionFailed(anyhow!(e)))?;

        page_map.insert(text.len(), *page_num);
        text.push_str(&format!("\n[PAGE {}]\n", page_num));
        text.push_str(&page_text);
    }

    Ok(ExtractedDocument {
        text,
        metadata: ExtractionMetadata::Pdf {
            page_map,
            total_pages,
        },
    })
}

/// Extract DOCX paragraphs from `word/document.xml`, joining non-blank
/// paragraphs with blank lines.
fn extract_docx(content: &[u8]) -> Result<ExtractedDocument> {
    let mut archive = zip::ZipArchive::new(Cursor::new(content))
        .map_err(|e| ComplianceError::ExtractionFailed(anyhow!(e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ComplianceError::ExtractionFailed(anyhow!(e)))?
        .read_to_string(&mut xml)
        .map_err(|e| ComplianceError::ExtractionFailed(anyhow!(e)))?;

    let paragraphs =
        parse_docx_paragraphs(&xml).map_err(ComplianceError::ExtractionFailed)?;

    let text = paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(ExtractedDocument {
        text,
        metadata: ExtractionMetadata::Docx {
            paragraphs: paragraphs.len(),
        },
    })
}

/// Pull paragraph text out of WordprocessingML: text runs live in `w:t`
/// elements, paragraphs end at `w:p` close tags.
fn parse_docx_paragraphs(xml: &str) -> anyhow::Result<Vec<String>> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    let mut saw_paragraph = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:t" => in_text_run = true,
                b"w:p" => saw_paragraph = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => {
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Text(t) if in_text_run => {
                current.push_str(&t.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_paragraph {
        return Err(anyhow!("document.xml contains no paragraphs"));
    }
    Ok(paragraphs)
}
