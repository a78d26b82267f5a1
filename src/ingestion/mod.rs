//! Document ingestion: turn a document on disk into page-tagged text chunks.

pub mod splitter;

pub use splitter::TextSplitter;

use crate::config::ChunkingConfig;
use crate::error::{Result, SessionError};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Page break marker in extracted text (the `pdftotext` convention).
pub const PAGE_BREAK: char = '\x0c';

/// One chunk of document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// 1-based page the chunk was taken from.
    pub page_number: u32,
}

/// Produces ordered chunks for a document. Chunking policy is up to the
/// implementation.
pub trait IngestionPipeline: Send + Sync {
    fn process(&self, path: &Path) -> Result<Vec<Chunk>>;
}

/// Normalize extracted page text: rejoin hyphenated line breaks, flatten
/// newlines and collapse whitespace.
pub fn preprocess(text: &str) -> String {
    static HYPHEN_BREAK: OnceLock<Regex> = OnceLock::new();
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();

    let hyphen = HYPHEN_BREAK.get_or_init(|| Regex::new(r"-\n").expect("valid regex"));
    let newlines = NEWLINES.get_or_init(|| Regex::new(r"\n+").expect("valid regex"));
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

    let text = hyphen.replace_all(text, "");
    let text = newlines.replace_all(&text, " ");
    let text = whitespace.replace_all(&text, " ");
    text.trim().to_string()
}

/// Pipeline over already-extracted document text.
///
/// Pages are separated by form feeds; each non-empty page is preprocessed and
/// split independently so no chunk spans two pages.
#[derive(Debug, Clone)]
pub struct TextPipeline {
    splitter: TextSplitter,
}

impl TextPipeline {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(TextSplitter::new(
            config.chunk_size,
            config.chunk_overlap,
            config.separators.clone(),
        ))
    }

    /// Chunk in-memory text.
    pub fn chunk_text(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (i, page) in text.split(PAGE_BREAK).enumerate() {
            let cleaned = preprocess(page);
            if cleaned.is_empty() {
                continue;
            }
            let page_number = (i + 1) as u32;
            chunks.extend(
                self.splitter
                    .split(&cleaned)
                    .into_iter()
                    .map(|text| Chunk { text, page_number }),
            );
        }
        chunks
    }
}

impl IngestionPipeline for TextPipeline {
    fn process(&self, path: &Path) -> Result<Vec<Chunk>> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|_| {
            SessionError::Ingestion(format!(
                "{} is not UTF-8 text; extract the document text first",
                path.display()
            ))
        })?;
        let chunks = self.chunk_text(&text);
        debug!(path = %path.display(), chunks = chunks.len(), "document chunked");
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pipeline() -> TextPipeline {
        TextPipeline::from_config(&ChunkingConfig::default())
    }

    #[test]
    fn test_preprocess() {
        assert_eq!(
            preprocess("  Occu-\npancy is\n\n limited   to four\tpersons.\n"),
            "Occupancy is limited to four persons."
        );
        assert_eq!(preprocess("\n\n  \n"), "");
    }

    #[test]
    fn test_pages_numbered_from_one() {
        let text = "First page text.\x0c\x0cThird page text.";
        let chunks = pipeline().chunk_text(text);
        assert_eq!(
            chunks,
            vec![
                Chunk {
                    text: "First page text.".into(),
                    page_number: 1
                },
                Chunk {
                    text: "Third page text.".into(),
                    page_number: 3
                },
            ]
        );
    }

    #[test]
    fn test_process_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lease.txt");
        std::fs::write(&path, "Rent is due monthly.\x0cDeposit is refundable.").unwrap();

        let chunks = pipeline().process(&path).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].page_number, 2);
    }

    #[test]
    fn test_binary_input_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, [0x25, 0x50, 0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(
            pipeline().process(&path),
            Err(SessionError::Ingestion(_))
        ));
    }
}
