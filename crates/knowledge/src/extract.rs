//! Document text extraction.
//!
//! Produces one [`PageSegment`] per non-empty page. PDFs are read page by page
//! with `lopdf`; text-like formats are cleaned and returned as a single page 0.
//! A readable document without any text yields an empty list, not an error.

use std::fs;
use std::path::Path;

use docqa_core::{AppError, AppResult};
use lopdf::Document;

use crate::types::PageSegment;

/// Extensions accepted for ingestion.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "markdown", "html", "htm"];

/// Document format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Markdown,
    Html,
    PlainText,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Whether `path` has an extension the extractor understands.
pub fn is_supported(path: &Path) -> bool {
    DocumentKind::from_path(path).is_some()
}

/// Extract the non-empty pages of a document, in page order.
pub fn extract_segments(path: &Path) -> AppResult<Vec<PageSegment>> {
    let kind = DocumentKind::from_path(path).ok_or_else(|| {
        AppError::Extraction(format!(
            "Unsupported file type: {:?} (supported: {})",
            path.file_name().unwrap_or_default(),
            SUPPORTED_EXTENSIONS.join(", ")
        ))
    })?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Extraction(format!("Invalid file name: {:?}", path)))?
        .to_string();
    let source_file = path.to_string_lossy().to_string();

    let pages: Vec<(u32, String)> = match kind {
        DocumentKind::Pdf => extract_pdf_pages(path)?,
        DocumentKind::Markdown => vec![(0, clean_markdown(&read_text(path)?))],
        DocumentKind::Html => vec![(0, clean_html(&read_text(path)?))],
        DocumentKind::PlainText => vec![(0, read_text(path)?)],
    };

    let segments: Vec<PageSegment> = pages
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| PageSegment {
            text,
            page,
            source_file: source_file.clone(),
            filename: filename.clone(),
        })
        .collect();

    tracing::debug!("Extracted {} non-empty pages from {:?}", segments.len(), path);
    Ok(segments)
}

/// Text of every page, keyed by zero-based page index.
fn extract_pdf_pages(path: &Path) -> AppResult<Vec<(u32, String)>> {
    let doc = Document::load(path)
        .map_err(|e| AppError::Extraction(format!("Failed to load PDF {:?}: {}", path, e)))?;

    // get_pages is keyed by 1-based page number, in order.
    let mut pages = Vec::new();
    for (position, page_number) in doc.get_pages().keys().enumerate() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push((position as u32, text)),
            Err(e) => {
                tracing::warn!("Skipping unreadable page {} of {:?}: {}", page_number, path, e);
            }
        }
    }
    Ok(pages)
}

fn read_text(path: &Path) -> AppResult<String> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::Extraction(format!("Failed to read {:?}: {}", path, e)))?;
    if bytes.contains(&0) {
        return Err(AppError::Extraction(format!("{:?} looks like a binary file", path)));
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Strip heading markers, rules and code fences.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }
        result.push_str(trimmed);
        result.push('\n');
    }

    result.trim().to_string()
}

/// Drop tags plus script and style bodies, collapse whitespace.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut skip_until: Option<&str> = None;

    for (i, ch) in text.char_indices() {
        if let Some(end_tag) = skip_until {
            if starts_with_ignore_case(&text[i..], end_tag) {
                skip_until = None;
                in_tag = true;
            }
            continue;
        }

        match ch {
            '<' => {
                in_tag = true;
                if starts_with_ignore_case(&text[i..], "<script") {
                    skip_until = Some("</script");
                } else if starts_with_ignore_case(&text[i..], "<style") {
                    skip_until = Some("</style");
                }
            }
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}
