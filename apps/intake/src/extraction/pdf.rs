use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lopdf::Document;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::extraction::{DocumentParser, ExtractionError, ParsedDocument};

/// Default parser. Pages are read with `lopdf`. When `lopdf` cannot extract a
/// page, `pdf-extract` renders the whole document once, page by page, and the
/// page is served from that instead.
pub struct PdfParser;

#[async_trait]
impl DocumentParser for PdfParser {
    async fn open(&self, bytes: Bytes) -> Result<Box<dyn ParsedDocument>, ExtractionError> {
        tokio::task::spawn_blocking(move || load(bytes))
            .await
            .map_err(|e| ExtractionError::Worker(e.to_string()))?
    }
}

fn load(bytes: Bytes) -> Result<Box<dyn ParsedDocument>, ExtractionError> {
    let mut doc =
        Document::load_mem(&bytes).map_err(|e| ExtractionError::Load(e.to_string()))?;
    unlock(&mut doc)?;

    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    debug!(pages = pages.len(), "PDF loaded");
    Ok(Box::new(PagedPdf {
        doc: Arc::new(doc),
        pages,
        bytes,
        fallback: Arc::new(OnceCell::new()),
    }))
}

/// Print-restricted PDFs are encrypted with an empty user password; those
/// open like any other. Anything needing a real password is rejected.
fn unlock(doc: &mut Document) -> Result<(), ExtractionError> {
    if !doc.is_encrypted() {
        return Ok(());
    }
    doc.decrypt("").map_err(|e| {
        debug!("empty-password decrypt failed: {e}");
        ExtractionError::Encrypted
    })
}

struct PagedPdf {
    doc: Arc<Document>,
    /// Page numbers as reported by the page tree, in order.
    pages: Vec<u32>,
    bytes: Bytes,
    /// Per-page text from `pdf-extract`, rendered on first lopdf failure.
    fallback: Arc<OnceCell<Vec<String>>>,
}

impl PagedPdf {
    async fn fallback_text(&self, page: u32) -> Result<String, ExtractionError> {
        let bytes = self.bytes.clone();
        let pages = self
            .fallback
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || {
                    pdf_extract::extract_text_from_mem_by_pages(&bytes)
                        .map_err(|e| e.to_string())
                })
                .await
                .map_err(|e| e.to_string())?
            })
            .await
            .map_err(|reason| ExtractionError::Page { page, reason })?;

        page.checked_sub(1)
            .and_then(|i| pages.get(i as usize))
            .cloned()
            .ok_or_else(|| ExtractionError::Page {
                page,
                reason: "page out of range".to_string(),
            })
    }
}

#[async_trait]
impl ParsedDocument for PagedPdf {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    async fn page_text(&self, page: u32) -> Result<String, ExtractionError> {
        let page_number = page
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .copied()
            .ok_or_else(|| ExtractionError::Page {
                page,
                reason: "page out of range".to_string(),
            })?;

        let doc = Arc::clone(&self.doc);
        let extracted = tokio::task::spawn_blocking(move || doc.extract_text(&[page_number]))
            .await
            .map_err(|e| ExtractionError::Worker(e.to_string()))?;

        match extracted {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(page, "lopdf could not extract page ({e}), trying pdf-extract");
                self.fallback_text(page).await
            }
        }
    }
}
