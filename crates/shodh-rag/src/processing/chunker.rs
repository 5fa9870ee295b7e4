//! Chunker (C5): page -> sentence-segmented, token-bounded overlapping
//! chunks with a `chunk_idx` monotonic across the whole document.
//!
//! Grounded on `original_source/l88_backend/ingestion/chunker.py`, which
//! wraps `pysbd.Segmenter` (abbreviation-tolerant sentence segmentation) and
//! a `RecursiveCharacterTextSplitter` over `tiktoken cl100k_base` token
//! counts. Reimplemented directly in the same two stages: segment, then
//! recursively split+merge with overlap on the separator preference list
//! `["\n\n", "\n", ". ", " ", ""]`. Structuring idiom (UTF-8-safe slicing)
//! follows the teacher's original `processing/chunker.rs`.

use crate::types::{ChunkDraft, Page};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tiktoken_rs::CoreBPE;

static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "et al", "fig", "figs", "dr", "mr", "mrs", "ms", "prof", "vs", "e.g", "i.e", "inc",
        "ltd", "no", "pp", "vol", "eq", "eqs", "sec", "ch", "approx",
    ]
    .into_iter()
    .collect()
});

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

fn is_abbreviation(word: &str) -> bool {
    let trimmed: String = word
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if trimmed.is_empty() {
        return false;
    }
    ABBREVIATIONS.contains(trimmed.as_str())
        || (trimmed.chars().count() == 1 && trimmed.chars().next().unwrap().is_alphabetic())
}

/// Splits `text` into sentences, treating a fixed set of scientific
/// abbreviations ("et al.", "Fig. 3", single-letter initials) as non-boundaries.
pub fn segment_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last = 0usize;
    for m in SENTENCE_BOUNDARY.find_iter(text) {
        let before = &text[..m.start()];
        let word = before.split_whitespace().last().unwrap_or("");
        if is_abbreviation(word) {
            continue;
        }
        let end = m.end();
        let piece = text[last..end].trim();
        if !piece.is_empty() {
            sentences.push(piece.to_string());
        }
        last = end;
    }
    let rest = text[last..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    if sentences.is_empty() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            sentences.push(trimmed.to_string());
        }
    }
    sentences
}

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    bpe: CoreBPE,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            bpe: tiktoken_rs::cl100k_base().expect("cl100k_base encoding is built in"),
        }
    }

    fn token_len(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Splits `pages` into chunks. `chunk_idx` increments across the whole
    /// document, not reset per page.
    pub fn chunk_pages(&self, pages: &[Page]) -> Vec<ChunkDraft> {
        let mut out = Vec::new();
        let mut chunk_idx = 0u32;

        for page in pages {
            let sentences = segment_sentences(&page.text);
            let rejoined = sentences.join(" ");
            let atoms = self.atomize(&rejoined, SEPARATORS);
            let merged = self.merge_with_overlap(atoms);

            for text in merged {
                out.push(ChunkDraft {
                    text,
                    page: page.page,
                    filename: page.filename.clone(),
                    chunk_idx,
                });
                chunk_idx += 1;
            }
        }
        out
    }

    /// Recursively splits `text` on the first separator in `seps` that
    /// appears in it, descending into the remaining separators for any
    /// piece still over `chunk_size` tokens. The final separator `""`
    /// (character split) always terminates the recursion.
    fn atomize(&self, text: &str, seps: &[&str]) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if self.token_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }
        if seps.is_empty() {
            return self.hard_split(text);
        }
        let sep = seps[0];
        let rest = &seps[1..];

        if sep.is_empty() {
            return self.hard_split(text);
        }
        let parts: Vec<&str> = text.split(sep).collect();

        if parts.len() <= 1 {
            // separator doesn't occur in this text; try the next one
            return self.atomize(text, rest);
        }

        let mut atoms = Vec::new();
        for part in parts {
            if part.is_empty() {
                continue;
            }
            if self.token_len(part) <= self.chunk_size {
                atoms.push(part.to_string());
            } else {
                atoms.extend(self.atomize(part, rest));
            }
        }
        atoms
    }

    /// Last-resort splitter: guaranteed to terminate by cutting at UTF-8
    /// character boundaries without regard for word breaks.
    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = (start + self.chunk_size * 4).min(chars.len());
            while end > start + 1
                && self.token_len(&chars[start..end].iter().collect::<String>()) > self.chunk_size
            {
                end -= 1;
            }
            out.push(chars[start..end].iter().collect());
            start = end;
        }
        out
    }

    /// Greedily merges atomized pieces into chunks near `chunk_size` tokens,
    /// carrying trailing pieces from the previous chunk forward as overlap.
    fn merge_with_overlap(&self, atoms: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for atom in atoms {
            let atom_tokens = self.token_len(&atom);
            if current_tokens + atom_tokens > self.chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));

                let mut carry = Vec::new();
                let mut carry_tokens = 0usize;
                for a in current.iter().rev() {
                    let t = self.token_len(a);
                    if carry_tokens + t > self.chunk_overlap {
                        break;
                    }
                    carry.insert(0, a.clone());
                    carry_tokens += t;
                }
                current = carry;
                current_tokens = carry_tokens;
            }
            current.push(atom);
            current_tokens += atom_tokens;
        }
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_do_not_split_sentences() {
        let sentences = segment_sentences("See Fig. 3 for details. This is the next sentence.");
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].contains("Fig. 3"));
    }

    #[test]
    fn et_al_is_not_a_sentence_boundary() {
        let sentences =
            segment_sentences("Smith et al. showed this result. A second claim follows.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn chunk_idx_is_monotonic_across_pages() {
        let chunker = Chunker::new(50, 10);
        let long_text = "word ".repeat(400);
        let pages = vec![
            Page {
                text: long_text.clone(),
                page: 1,
                filename: "a.pdf".into(),
            },
            Page {
                text: long_text,
                page: 2,
                filename: "a.pdf".into(),
            },
        ];
        let chunks = chunker.chunk_pages(&pages);
        assert!(chunks.len() > 2);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_idx, i as u32);
        }
        for w in chunks.windows(2) {
            assert!(w[0].page <= w[1].page);
        }
    }

    #[test]
    fn chunks_stay_within_target_token_budget() {
        let chunker = Chunker::new(380, 45);
        let page = Page {
            text: "This is a sentence. ".repeat(200),
            page: 1,
            filename: "a.pdf".into(),
        };
        let chunks = chunker.chunk_pages(&[page]);
        for c in &chunks {
            assert!(chunker.token_len(&c.text) <= 380 + 45);
        }
    }

    #[test]
    fn empty_page_text_yields_no_chunks() {
        let chunker = Chunker::new(380, 45);
        let page = Page {
            text: "".into(),
            page: 1,
            filename: "a.pdf".into(),
        };
        assert!(chunker.chunk_pages(&[page]).is_empty());
    }
}
