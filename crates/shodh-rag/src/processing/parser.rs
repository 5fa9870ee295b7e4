//! Parser (C6) — interface only per SPEC_FULL.md §4.6: PDF -> per-page
//! cleaned text. Grounded on `original_source/l88_backend/ingestion/parser.py`
//! (page skip-if-empty, 1-indexed page numbers) and the teacher's dual
//! `pdf-extract`/`lopdf` extraction strategy.

use crate::error::{RagError, Result};
use crate::types::Page;
use std::collections::HashMap;
use std::path::Path;

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// `parse(filepath, filename) -> [{text, page, filename}]`, excluding
    /// empty pages and stripping boilerplate that repeats verbatim across
    /// every page (running headers/footers) or consists only of a bare page
    /// number.
    pub fn parse(&self, filepath: &Path, filename: &str) -> Result<Vec<Page>> {
        let raw_pages = extract_pages(filepath)?;
        let boilerplate = find_boilerplate_lines(&raw_pages);

        let mut pages = Vec::new();
        for (i, text) in raw_pages.into_iter().enumerate() {
            let cleaned = strip_boilerplate(&text, &boilerplate);
            if cleaned.trim().is_empty() {
                continue;
            }
            pages.push(Page {
                text: cleaned,
                page: (i + 1) as u32,
                filename: filename.to_string(),
            });
        }
        Ok(pages)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// `pdf-extract` is the primary path; `lopdf` is a fallback for files it
/// cannot open (matches the teacher's dual-path strategy). OCR fallback for
/// image-only pages is explicitly out of scope (distilled §1).
fn extract_pages(filepath: &Path) -> Result<Vec<String>> {
    match pdf_extract::extract_text_by_pages(filepath) {
        Ok(pages) => Ok(pages),
        Err(primary_err) => extract_pages_lopdf(filepath)
            .map_err(|_| RagError::Validation(format!("unreadable PDF: {primary_err}"))),
    }
}

fn extract_pages_lopdf(filepath: &Path) -> anyhow::Result<Vec<String>> {
    let parsed = super::lopdf_parser::LoPdfParser::parse(filepath)?;
    Ok(parsed.pages.into_iter().map(|p| p.text).collect())
}

/// A bare page-number line: only digits, optionally surrounded by dashes or
/// the word "page".
fn is_page_number_line(line: &str) -> bool {
    let trimmed = line.trim().to_lowercase();
    if trimmed.is_empty() {
        return false;
    }
    let stripped: String = trimmed
        .trim_start_matches("page")
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

/// Lines that recur verbatim on every page are running headers/footers.
fn find_boilerplate_lines(pages: &[String]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for page in pages {
        let unique_lines: std::collections::HashSet<&str> =
            page.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();
        for line in unique_lines {
            *counts.entry(line.to_string()).or_insert(0) += 1;
        }
    }
    if pages.len() < 3 {
        return HashMap::new();
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= pages.len())
        .collect()
}

fn strip_boilerplate(text: &str, boilerplate: &HashMap<String, usize>) -> String {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !is_page_number_line(trimmed) && !boilerplate.contains_key(trimmed)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
