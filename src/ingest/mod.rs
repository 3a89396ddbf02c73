//! Document ingestion: PDF text extraction, size limits, chunking
//!
//! The Ingestor turns raw document bytes into an ordered set of chunk
//! drafts. Limits are enforced before any state is mutated, so an oversized
//! document never leaves partial entries behind. A page with no extractable
//! text (e.g. a scanned image) is flagged and skipped; it does not abort the
//! rest of the document.

mod chunker;

pub use chunker::{chunk_text, reconstruct, ChunkSpan};

use crate::config::IngestConfig;
use crate::error::{DocqaError, Result};

/// Extracted text of one page
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// 1-based page number
    pub page: u32,
    pub text: String,
    /// False when the page yielded no extractable text
    pub extracted: bool,
}

/// Extraction result for a whole document
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub page_count: usize,
    pub pages: Vec<ExtractedPage>,
}

impl ExtractedDocument {
    /// Pages that yielded no text
    pub fn skipped_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|p| !p.extracted)
            .map(|p| p.page)
            .collect()
    }
}

/// A chunk ready for registration, before it has a database id
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    /// Document-wide order
    pub seq: i64,
    /// 1-based page number the chunk came from
    pub page: u32,
    /// Character offset within the page's extracted text
    pub start_offset: i64,
    pub text: String,
}

/// Document ingestor
pub struct Ingestor {
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Extract per-page text from PDF bytes, enforcing size and page limits.
    ///
    /// Limits are checked before extraction so oversized documents are
    /// rejected outright rather than partially processed.
    pub fn extract(&self, name: &str, bytes: &[u8]) -> Result<ExtractedDocument> {
        let max_bytes = self.config.max_file_size_bytes();
        if bytes.len() as u64 > max_bytes {
            return Err(DocqaError::SizeLimitExceeded {
                bytes: bytes.len() as u64,
                max_bytes,
            });
        }

        let doc = lopdf::Document::load_mem(bytes).map_err(|e| DocqaError::Extraction {
            name: name.to_string(),
            message: format!("not a readable PDF: {}", e),
        })?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let page_count = page_numbers.len();

        if page_count > self.config.max_pages {
            return Err(DocqaError::PageLimitExceeded {
                pages: page_count,
                max_pages: self.config.max_pages,
            });
        }
        if page_count == 0 {
            return Err(DocqaError::Extraction {
                name: name.to_string(),
                message: "document has no pages".to_string(),
            });
        }

        let mut pages = Vec::with_capacity(page_count);
        for page in page_numbers {
            match doc.extract_text(&[page]) {
                Ok(text) if !text.trim().is_empty() => {
                    pages.push(ExtractedPage {
                        page,
                        text,
                        extracted: true,
                    });
                }
                Ok(_) => {
                    tracing::warn!(document = name, page, "page yielded no extractable text");
                    pages.push(ExtractedPage {
                        page,
                        text: String::new(),
                        extracted: false,
                    });
                }
                Err(e) => {
                    tracing::warn!(document = name, page, error = %e, "page extraction failed");
                    pages.push(ExtractedPage {
                        page,
                        text: String::new(),
                        extracted: false,
                    });
                }
            }
        }

        if pages.iter().all(|p| !p.extracted) {
            return Err(DocqaError::Extraction {
                name: name.to_string(),
                message: "no page yielded extractable text".to_string(),
            });
        }

        Ok(ExtractedDocument { page_count, pages })
    }

    /// Split an extracted document into ordered chunk drafts.
    ///
    /// Chunks never span pages; within a page they overlap by the configured
    /// amount so context survives chunk boundaries.
    pub fn chunk(&self, doc: &ExtractedDocument) -> Vec<ChunkDraft> {
        let mut drafts = Vec::new();
        let mut seq = 0i64;

        for page in &doc.pages {
            if !page.extracted {
                continue;
            }
            for span in chunk_text(&page.text, self.config.chunk_size, self.config.chunk_overlap)
            {
                drafts.push(ChunkDraft {
                    seq,
                    page: page.page,
                    start_offset: span.start as i64,
                    text: span.text,
                });
                seq += 1;
            }
        }

        drafts
    }
}
